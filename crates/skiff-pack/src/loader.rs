//! Package loading: descriptors, the warehouse, and the application
//! scanner.
//!
//! A package directory carries a `skiff.json` descriptor naming its
//! sources, dependencies, and exports. The application is the unnamed
//! package: its sources are discovered by scanning the project tree.
//!
//! Loaded packages are memoised per loader; the bundler flushes the cache
//! once at the start of every run.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::fsutil;
use crate::ignore::IgnorePatterns;
use crate::package::{Package, PackageId};
use crate::release::ReleaseManifest;
use crate::role::{Env, Role};

/// Name of the package descriptor file.
pub const DESCRIPTOR_FILE: &str = "skiff.json";

/// Top-level application directories that are never source trees.
const APP_SKIP_DIRS: &[&str] = &["packages", "public", "private", "node_modules"];

/// Source extensions every package understands out of the box.
const DEFAULT_EXTENSIONS: &[&str] = &["js", "css"];

/// Resolves package names to loaded packages.
pub trait PackageLoader {
    /// Load a package by name; `None` when the name does not resolve.
    fn get(&self, name: &str) -> Result<Option<Arc<Package>>>;

    /// Load the unnamed application package rooted at `app_dir`.
    fn get_for_app(&self, app_dir: &Path, ignores: &IgnorePatterns) -> Result<Arc<Package>>;

    /// Drop all memoised packages.
    fn flush(&self);
}

/// A list of strings that may be declared per environment or once for
/// both.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EnvList {
    Both(Vec<String>),
    Split {
        #[serde(default)]
        client: Vec<String>,
        #[serde(default)]
        server: Vec<String>,
    },
}

impl EnvList {
    fn for_env(&self, env: Env) -> Vec<String> {
        match self {
            EnvList::Both(list) => list.clone(),
            EnvList::Split { client, server } => match env {
                Env::Client => client.clone(),
                Env::Server => server.clone(),
            },
        }
    }
}

fn env_list(list: &Option<EnvList>, env: Env) -> Vec<String> {
    list.as_ref().map(|l| l.for_env(env)).unwrap_or_default()
}

/// The `skiff.json` schema for a named package.
#[derive(Debug, Deserialize)]
struct PackageDescriptor {
    name: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    uses: Option<EnvList>,
    #[serde(default)]
    test_uses: Option<EnvList>,
    #[serde(default)]
    sources: Option<EnvList>,
    #[serde(default)]
    test_sources: Option<EnvList>,
    #[serde(default)]
    exports: Option<EnvList>,
    #[serde(default)]
    test_exports: Option<EnvList>,
    #[serde(default)]
    unordered: Vec<String>,
    #[serde(default)]
    native_dependencies: BTreeMap<String, String>,
}

/// The optional `skiff.json` schema at the application root. Only the
/// dependency list is meaningful there; sources come from the scan.
#[derive(Debug, Default, Deserialize)]
struct AppDescriptor {
    #[serde(default)]
    uses: Option<EnvList>,
}

/// Loads packages from the application's `packages/` directory and an
/// optional warehouse of released package versions.
pub struct Warehouse {
    app_dir: PathBuf,
    warehouse_dir: Option<PathBuf>,
    release_manifest: ReleaseManifest,
    cache: RefCell<FxHashMap<String, Option<Arc<Package>>>>,
    app: RefCell<Option<Arc<Package>>>,
    next_id: Cell<u32>,
}

impl Warehouse {
    pub fn new(
        app_dir: impl Into<PathBuf>,
        warehouse_dir: Option<PathBuf>,
        release_manifest: ReleaseManifest,
    ) -> Self {
        Self {
            app_dir: app_dir.into(),
            warehouse_dir,
            release_manifest,
            cache: RefCell::new(FxHashMap::default()),
            app: RefCell::new(None),
            next_id: Cell::new(0),
        }
    }

    fn fresh_id(&self) -> PackageId {
        let raw = self.next_id.get();
        self.next_id.set(raw + 1);
        PackageId::new(raw)
    }

    /// Where a package of this name lives, if anywhere: the application's
    /// own `packages/` directory wins over the warehouse.
    fn package_dir(&self, name: &str) -> Option<PathBuf> {
        let local = self.app_dir.join("packages").join(name);
        if local.join(DESCRIPTOR_FILE).is_file() {
            return Some(local);
        }
        let warehouse = self.warehouse_dir.as_ref()?;
        let version = self.release_manifest.version_of(name)?;
        let dir = warehouse.join(name).join(version);
        dir.join(DESCRIPTOR_FILE).is_file().then_some(dir)
    }

    fn load_package(&self, name: &str, dir: &Path) -> Result<Arc<Package>> {
        let descriptor_path = dir.join(DESCRIPTOR_FILE);
        let bytes = fs::read(&descriptor_path).map_err(|e| Error::io(&descriptor_path, e))?;
        let descriptor: PackageDescriptor =
            serde_json::from_slice(&bytes).map_err(|e| Error::Descriptor {
                path: descriptor_path.clone(),
                message: e.to_string(),
            })?;
        if descriptor.name != name {
            return Err(Error::Descriptor {
                path: descriptor_path,
                message: format!(
                    "descriptor names package '{}' but was loaded as '{name}'",
                    descriptor.name
                ),
            });
        }

        debug!(
            package = name,
            summary = descriptor.summary.as_deref().unwrap_or(""),
            dir = %dir.display(),
            "loaded package"
        );

        let mut builder = Package::builder(self.fresh_id(), Some(name), dir).default_handlers();
        for env in Env::ALL {
            // A package's tests always use the package itself.
            let mut test_uses = env_list(&descriptor.test_uses, env);
            if !test_uses.iter().any(|n| n == name) {
                test_uses.insert(0, name.to_string());
            }
            builder = builder
                .uses(Role::Use, env, env_list(&descriptor.uses, env))
                .uses(Role::Test, env, test_uses)
                .sources(Role::Use, env, env_list(&descriptor.sources, env))
                .sources(Role::Test, env, env_list(&descriptor.test_sources, env))
                .exports(Role::Use, env, env_list(&descriptor.exports, env))
                .exports(Role::Test, env, env_list(&descriptor.test_exports, env));
        }
        let package = builder
            .unordered(descriptor.unordered)
            .native_dependencies(descriptor.native_dependencies)
            .build();
        Ok(Arc::new(package))
    }

    /// The dependency list of an application without a root descriptor:
    /// every local package, in name order.
    fn local_package_names(&self) -> Result<Vec<String>> {
        let packages_dir = self.app_dir.join("packages");
        if !packages_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        let entries = fs::read_dir(&packages_dir).map_err(|e| Error::io(&packages_dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&packages_dir, e))?;
            if entry.path().join(DESCRIPTOR_FILE).is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn load_app(&self, app_dir: &Path, ignores: &IgnorePatterns) -> Result<Arc<Package>> {
        let descriptor_path = app_dir.join(DESCRIPTOR_FILE);
        let descriptor: AppDescriptor = if descriptor_path.is_file() {
            let bytes = fs::read(&descriptor_path).map_err(|e| Error::io(&descriptor_path, e))?;
            serde_json::from_slice(&bytes).map_err(|e| Error::Descriptor {
                path: descriptor_path.clone(),
                message: e.to_string(),
            })?
        } else {
            AppDescriptor::default()
        };

        let all = fsutil::scan_sources(app_dir, ignores, DEFAULT_EXTENSIONS, APP_SKIP_DIRS)?;
        let (client, server): (Vec<String>, Vec<String>) = all
            .into_iter()
            .partition(|rel| rel.starts_with("client/"));

        let mut builder = Package::builder(self.fresh_id(), None, app_dir).default_handlers();
        for env in Env::ALL {
            let uses = match &descriptor.uses {
                Some(list) => list.for_env(env),
                None => self.local_package_names()?,
            };
            builder = builder.uses(Role::Use, env, uses);
        }
        let package = builder
            .sources(Role::Use, Env::Client, client)
            .sources(Role::Use, Env::Server, server)
            .build();
        Ok(Arc::new(package))
    }
}

impl PackageLoader for Warehouse {
    fn get(&self, name: &str) -> Result<Option<Arc<Package>>> {
        if let Some(cached) = self.cache.borrow().get(name) {
            return Ok(cached.clone());
        }
        let loaded = match self.package_dir(name) {
            Some(dir) => Some(self.load_package(name, &dir)?),
            None => None,
        };
        self.cache
            .borrow_mut()
            .insert(name.to_string(), loaded.clone());
        Ok(loaded)
    }

    fn get_for_app(&self, app_dir: &Path, ignores: &IgnorePatterns) -> Result<Arc<Package>> {
        if let Some(app) = self.app.borrow().as_ref() {
            return Ok(Arc::clone(app));
        }
        let app = self.load_app(app_dir, ignores)?;
        *self.app.borrow_mut() = Some(Arc::clone(&app));
        Ok(app)
    }

    fn flush(&self) {
        self.cache.borrow_mut().clear();
        *self.app.borrow_mut() = None;
    }
}

/// A loader over a fixed set of prebuilt packages. Useful for tests and
/// for embedding the bundler without a package tree on disk.
pub struct StaticLoader {
    app: Arc<Package>,
    packages: FxHashMap<String, Arc<Package>>,
}

impl StaticLoader {
    pub fn new(app: Arc<Package>, packages: impl IntoIterator<Item = Arc<Package>>) -> Self {
        let packages = packages
            .into_iter()
            .filter_map(|p| p.name().map(|n| (n.to_string(), Arc::clone(&p))))
            .collect();
        Self { app, packages }
    }
}

impl PackageLoader for StaticLoader {
    fn get(&self, name: &str) -> Result<Option<Arc<Package>>> {
        Ok(self.packages.get(name).cloned())
    }

    fn get_for_app(&self, _app_dir: &Path, _ignores: &IgnorePatterns) -> Result<Arc<Package>> {
        Ok(Arc::clone(&self.app))
    }

    fn flush(&self) {}
}
