//! Package bundling records.
//!
//! A PBR is the per-(package, role) workspace of one bundling run: which
//! environments the pair is present in, the resources it has contributed
//! so far, and the source files that fed it. PBRs are stored in a flat
//! vector and addressed by index, so the ordering passes stay
//! allocation-light.

use std::collections::BTreeSet;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use skiff_pack::{Package, PackageId, PerEnv, Resource, Role};

/// Index of a PBR within its [`PbrSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PbrId(usize);

impl PbrId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The per-(package, role) bundling workspace.
#[derive(Debug)]
pub struct Pbr {
    pub package: Arc<Package>,
    pub role: Role,
    /// Which environments this record participates in.
    pub presence: PerEnv<bool>,
    /// Accumulated resources, per environment, in emission order.
    pub resources: PerEnv<Vec<Resource>>,
    /// Relative source paths that influenced this record.
    pub deps: BTreeSet<String>,
}

impl Pbr {
    fn new(package: Arc<Package>, role: Role) -> Self {
        Self {
            package,
            role,
            presence: PerEnv::default(),
            resources: PerEnv::default(),
            deps: BTreeSet::new(),
        }
    }
}

/// All PBRs of one bundling run, keyed by `(role, package id)`, in
/// creation order.
#[derive(Debug, Default)]
pub struct PbrSet {
    pbrs: Vec<Pbr>,
    index: FxHashMap<(Role, PackageId), PbrId>,
    /// Named packages seen so far; dependency edges resolve through this.
    by_name: FxHashMap<String, Arc<Package>>,
}

impl PbrSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pbrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pbrs.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = PbrId> {
        (0..self.pbrs.len()).map(PbrId)
    }

    pub fn get(&self, id: PbrId) -> &Pbr {
        &self.pbrs[id.0]
    }

    pub fn get_mut(&mut self, id: PbrId) -> &mut Pbr {
        &mut self.pbrs[id.0]
    }

    /// Fetch or lazily create the record for `(role, package)`.
    pub fn get_or_insert(&mut self, role: Role, package: &Arc<Package>) -> PbrId {
        if let Some(&id) = self.index.get(&(role, package.id())) {
            return id;
        }
        let id = PbrId(self.pbrs.len());
        self.index.insert((role, package.id()), id);
        if let Some(name) = package.name() {
            self.by_name
                .entry(name.to_string())
                .or_insert_with(|| Arc::clone(package));
        }
        self.pbrs.push(Pbr::new(Arc::clone(package), role));
        id
    }

    /// The record of `(role, package id)`, if it exists.
    pub fn lookup(&self, role: Role, package: PackageId) -> Option<PbrId> {
        self.index.get(&(role, package)).copied()
    }

    /// A named package that participates in this bundle.
    pub fn package_by_name(&self, name: &str) -> Option<&Arc<Package>> {
        self.by_name.get(name)
    }

    /// The use-role record of a named package, if it participates.
    pub fn use_record_by_name(&self, name: &str) -> Option<PbrId> {
        let package = self.by_name.get(name)?;
        self.lookup(Role::Use, package.id())
    }
}
