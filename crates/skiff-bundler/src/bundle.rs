//! The bundle: accumulated state of one run, and the orchestrator that
//! drives the pipeline.
//!
//! Stages run strictly in sequence, each reading the fully-populated
//! outputs of the previous ones: resolve, order, native-module prep,
//! compile, link, aggregate, optionally minify, write. Any failure is
//! caught at the `bundle()` boundary and returned as a list of
//! human-readable messages; an empty list means success.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use tracing::info;

use skiff_pack::{IgnorePatterns, PackageLoader, PerEnv, Release, Role};

use crate::error::{BundleError, Result};
use crate::link::{ExportsRegistry, Linker, ModuleLinker};
use crate::manifest::ManifestEntry;
use crate::minify::{CssMinifier, JsMinifier, LightningCssMinifier, StripJsMinifier};
use crate::pbr::{PbrId, PbrSet};
use crate::write::{NodeModulesMode, Platform};
use crate::{aggregate, compile, link, minify, order, resolve, write};

/// The bundle-wide file tables, keyed by serve path, in aggregation
/// order.
#[derive(Default)]
pub(crate) struct Files {
    pub client: IndexMap<String, Vec<u8>>,
    pub client_cacheable: IndexMap<String, Vec<u8>>,
    pub server: IndexMap<String, Vec<u8>>,
}

/// Everything one bundling run accumulates before writing.
pub(crate) struct Bundle {
    pub app_dir: PathBuf,
    pub release: Release,
    pub pbrs: PbrSet,
    /// Load-ordered record ids; dependencies come first.
    pub order: Vec<PbrId>,
    pub exports: ExportsRegistry,
    pub files: Files,
    /// Serve paths of aggregated JavaScript, per environment, in load
    /// order.
    pub js: PerEnv<Vec<String>>,
    /// Serve paths of aggregated client stylesheets, in load order.
    pub css: Vec<String>,
    /// Serve paths of aggregated static assets, per environment.
    pub statics: PerEnv<Vec<String>>,
    pub head: Vec<Vec<u8>>,
    pub body: Vec<Vec<u8>>,
    /// Bundle-relative path to source directory of every package-managed
    /// native module tree.
    pub node_modules_dirs: BTreeMap<String, PathBuf>,
    pub manifest: Vec<ManifestEntry>,
    pub errors: Vec<String>,
}

impl Bundle {
    pub(crate) fn new(app_dir: &Path, release: Release) -> Self {
        Self {
            app_dir: app_dir.to_path_buf(),
            release,
            pbrs: PbrSet::new(),
            order: Vec::new(),
            exports: ExportsRegistry::default(),
            files: Files::default(),
            js: PerEnv::default(),
            css: Vec::new(),
            statics: PerEnv::default(),
            head: Vec::new(),
            body: Vec::new(),
            node_modules_dirs: BTreeMap::new(),
            manifest: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Options of one bundling run.
///
/// `release` and `node_modules_mode` are the knobs every caller must
/// think about; the collaborator slots default to the built-in linker
/// and minifiers.
pub struct BundleOptions {
    pub release: Release,
    pub node_modules_mode: NodeModulesMode,
    /// Packages whose tests join the bundle, in test role.
    pub test_packages: Vec<String>,
    /// Whether client assets are minified; when off they are served
    /// under cache-bust URLs instead.
    pub minify: bool,
    pub platform: Platform,
    pub ignores: IgnorePatterns,
    pub linker: Box<dyn Linker>,
    pub js_minifier: Box<dyn JsMinifier>,
    pub css_minifier: Box<dyn CssMinifier>,
}

impl Default for BundleOptions {
    fn default() -> Self {
        Self {
            release: Release::None,
            node_modules_mode: NodeModulesMode::Skip,
            test_packages: Vec::new(),
            minify: true,
            platform: Platform::default(),
            ignores: IgnorePatterns::standard(),
            linker: Box::new(ModuleLinker),
            js_minifier: Box::new(StripJsMinifier),
            css_minifier: Box::new(LightningCssMinifier),
        }
    }
}

/// Bundle the application at `app_dir` into `output_path`.
///
/// Returns the list of errors; an empty list means the bundle was
/// written. On failure the output path may hold a stale or partial
/// bundle whose `dependencies.json` still tells a watcher when to retry.
pub fn bundle(
    app_dir: &Path,
    output_path: &Path,
    loader: &dyn PackageLoader,
    options: &BundleOptions,
) -> Vec<String> {
    info!(
        app = %app_dir.display(),
        output = %output_path.display(),
        release = %options.release,
        "bundling application"
    );
    match try_bundle(app_dir, output_path, loader, options) {
        Ok(errors) => errors,
        Err(e) => vec![format!("Exception while bundling application:\n{}", e.render())],
    }
}

fn try_bundle(
    app_dir: &Path,
    output_path: &Path,
    loader: &dyn PackageLoader,
    options: &BundleOptions,
) -> Result<Vec<String>> {
    loader.flush();
    let mut bundle = Bundle::new(app_dir, options.release.clone());

    let app = loader.get_for_app(app_dir, &options.ignores)?;
    let mut roots = vec![(Arc::clone(&app), Role::Use)];
    for name in &options.test_packages {
        let package = loader
            .get(name)?
            .ok_or_else(|| BundleError::Resolution { name: name.clone() })?;
        roots.push((package, Role::Test));
    }

    resolve::resolve(&mut bundle.pbrs, loader, &roots)?;
    bundle.order = order::load_order(&bundle.pbrs)?;
    prep_native_modules(&mut bundle)?;
    compile::compile(&mut bundle.pbrs, &bundle.order)?;
    link::link(
        &mut bundle.pbrs,
        &bundle.order,
        &mut bundle.exports,
        options.linker.as_ref(),
    )?;
    aggregate::aggregate(&mut bundle)?;
    if options.minify {
        minify::minify_client(
            &mut bundle,
            options.js_minifier.as_ref(),
            options.css_minifier.as_ref(),
        )?;
    }
    write::write_bundle(&mut bundle, output_path, options)?;

    Ok(std::mem::take(&mut bundle.errors))
}

/// Validate and register every package-managed native module tree.
fn prep_native_modules(bundle: &mut Bundle) -> Result<()> {
    let mut seen = FxHashSet::default();
    for id in bundle.pbrs.ids() {
        let package = Arc::clone(&bundle.pbrs.get(id).package);
        let Some(name) = package.name() else {
            continue;
        };
        if !seen.insert(package.id()) {
            continue;
        }
        let Some(source) = package.native_modules_source() else {
            continue;
        };
        package.install_native_modules()?;
        bundle
            .node_modules_dirs
            .insert(format!("app/packages/{name}/node_modules"), source);
    }
    Ok(())
}
