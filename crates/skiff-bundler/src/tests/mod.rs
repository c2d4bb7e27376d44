//! Internal pipeline tests: resolution, ordering, linking, aggregation.


use std::sync::Arc;

use skiff_pack::{Env, Package, PackageBuilder, PackageId, Role, StaticLoader};

use crate::pbr::PbrSet;
use crate::resolve;

/// A package named `name` with sequential id, rooted nowhere in
/// particular; tests that touch the filesystem live in `tests/`.
pub(crate) fn named(id: u32, name: &str) -> PackageBuilder {
    Package::builder(PackageId::new(id), Some(name), format!("/src/{name}"))
}

pub(crate) fn app(id: u32) -> PackageBuilder {
    Package::builder(PackageId::new(id), None, "/src/app")
}

/// Builder that declares the same `uses` list for both environments.
pub(crate) fn uses_both(builder: PackageBuilder, role: Role, names: &[&str]) -> PackageBuilder {
    let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
    builder
        .uses(role, Env::Client, names.clone())
        .uses(role, Env::Server, names)
}

/// Resolve an app plus named packages into a PBR set, with the app in
/// use role and `test_roots` in test role.
pub(crate) fn resolved(
    app: Arc<Package>,
    packages: Vec<Arc<Package>>,
    test_roots: &[&str],
) -> crate::error::Result<PbrSet> {
    let loader = StaticLoader::new(Arc::clone(&app), packages.iter().map(Arc::clone));
    let mut roots = vec![(app, Role::Use)];
    for name in test_roots {
        let package = packages
            .iter()
            .find(|p| p.name() == Some(*name))
            .expect("test root must be among the packages")
            .clone();
        roots.push((package, Role::Test));
    }
    let mut pbrs = PbrSet::new();
    resolve::resolve(&mut pbrs, &loader, &roots)?;
    Ok(pbrs)
}
