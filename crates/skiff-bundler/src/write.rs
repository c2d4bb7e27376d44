//! The writer: materialise the bundle tree on disk.
//!
//! Everything is assembled in a `.build.<name>` sibling of the output
//! directory; only the final step removes the previous output and
//! renames the build area into place, so a failed write never leaves a
//! half-written bundle at the output path.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;
use tracing::{debug, info, warn};

use skiff_pack::{fsutil, Env};

use crate::bundle::{Bundle, BundleOptions};
use crate::error::{BundleError, Result};
use crate::fingerprint::{cache_bust_url, sha1_hex};
use crate::html;
use crate::manifest::{AppJson, DependenciesJson, ManifestEntry, ManifestKind, ManifestWhere};

/// How the platform's prebuilt native modules reach the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeModulesMode {
    /// Leave them out; the launcher provides its own.
    Skip,
    /// Copy the module tree into the bundle.
    Copy,
    /// Symlink the module tree into the bundle.
    Symlink,
}

impl NodeModulesMode {
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        match s {
            "skip" => Ok(Self::Skip),
            "copy" => Ok(Self::Copy),
            "symlink" => Ok(Self::Symlink),
            other => Err(format!(
                "invalid node modules mode: '{other}'. Expected: skip, copy, symlink"
            )),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Copy => "copy",
            Self::Symlink => "symlink",
        }
    }
}

impl std::fmt::Display for NodeModulesMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the pieces the bundler does not build itself live on this
/// machine: the server runtime, the prebuilt native modules, and the
/// bundle version marker.
#[derive(Debug, Clone, Default)]
pub struct Platform {
    /// Copied into `server/`; when absent an empty runtime directory is
    /// created and nothing is recorded under `dependencies.core`.
    pub runtime_dir: Option<PathBuf>,
    /// The prebuilt module root used by copy/symlink modes.
    pub native_modules_dir: Option<PathBuf>,
    /// Copied to `server/.bundle_version.txt` when present.
    pub version_marker: Option<PathBuf>,
}

const MAIN_JS: &[u8] = b"require(\"./server/server.js\");\n";

const README: &str = "\
This directory is a bundled skiff application.

Start it with:

  node main.js

The server reads its configuration (port, database, root URL) from the
environment. The static/ and static_cacheable/ directories hold the
client assets described by app.json; everything under static_cacheable/
is content-addressed and may be served with a far-future expiry.
";

pub(crate) fn write_bundle(
    bundle: &mut Bundle,
    output_path: &Path,
    options: &BundleOptions,
) -> Result<()> {
    let output_path = normalize_output(output_path)?;
    let name = output_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            BundleError::io(
                &output_path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "output path has no name"),
            )
        })?;
    let build_path = output_path
        .parent()
        .unwrap_or_else(|| Path::new("/"))
        .join(format!(".build.{name}"));

    fsutil::remove_tree(&build_path)?;
    fs::create_dir_all(&build_path).map_err(|e| BundleError::io(&build_path, e))?;
    debug!(build = %build_path.display(), "assembling bundle tree");

    let core = write_server_runtime(&build_path, options)?;
    write_public_assets(bundle, &build_path, options)?;

    // Client JS and CSS that skipped minification become cacheable
    // under their own names, busted by a content hash query.
    let js_names = bundle.js[Env::Client].clone();
    for name in &js_names {
        move_to_cacheable(bundle, name, ManifestKind::Js);
    }
    let css_names = bundle.css.clone();
    for name in &css_names {
        move_to_cacheable(bundle, name, ManifestKind::Css);
    }

    // Whatever is left on the client table is served as-is.
    for (name, contents) in &bundle.files.client {
        let rel = name.trim_start_matches('/');
        fsutil::write_file(
            &build_path.join("static").join(fsutil::path_from_slash(rel)),
            contents,
        )?;
        bundle.manifest.push(ManifestEntry::plain(
            format!("static/{rel}"),
            ManifestKind::Static,
            name.clone(),
            contents.len() as u64,
            sha1_hex(contents),
        ));
    }

    for (name, contents) in &bundle.files.client_cacheable {
        let rel = name.trim_start_matches('/');
        fsutil::write_file(
            &build_path
                .join("static_cacheable")
                .join(fsutil::path_from_slash(rel)),
            contents,
        )?;
    }

    let mut load = Vec::new();
    for (name, contents) in &bundle.files.server {
        let rel = name.trim_start_matches('/');
        fsutil::write_file(
            &build_path.join("app").join(fsutil::path_from_slash(rel)),
            contents,
        )?;
        load.push(format!("app/{rel}"));
    }

    write_native_module_trees(bundle, &build_path, options)?;
    write_app_html(bundle, &build_path)?;

    fsutil::write_file(&build_path.join("main.js"), MAIN_JS)?;
    fsutil::write_file(&build_path.join("README"), README.as_bytes())?;

    let app_json = AppJson {
        manifest: bundle.manifest.clone(),
        load,
        release: bundle.release.name().map(str::to_string),
    };
    write_json(&build_path.join("app.json"), &app_json)?;
    write_json(
        &build_path.join("dependencies.json"),
        &dependencies_json(bundle, options, core),
    )?;

    // The swap: the previous output survives intact until this point.
    fsutil::remove_tree(&output_path)?;
    fs::rename(&build_path, &output_path).map_err(|e| BundleError::io(&output_path, e))?;
    info!(output = %output_path.display(), "bundle written");
    Ok(())
}

fn write_server_runtime(build_path: &Path, options: &BundleOptions) -> Result<Vec<String>> {
    let server_dir = build_path.join("server");
    let mut core = Vec::new();
    match &options.platform.runtime_dir {
        Some(runtime) => {
            fsutil::copy_tree(runtime, &server_dir, &options.ignores)?;
            core.push(runtime.display().to_string());
        }
        None => {
            fs::create_dir_all(&server_dir).map_err(|e| BundleError::io(&server_dir, e))?;
        }
    }

    if let Some(modules) = &options.platform.native_modules_dir {
        let target = server_dir.join("node_modules");
        match options.node_modules_mode {
            NodeModulesMode::Symlink => fsutil::symlink_dir(modules, &target)?,
            NodeModulesMode::Copy => {
                fsutil::copy_tree(modules, &target, &options.ignores)?;
            }
            NodeModulesMode::Skip => {}
        }
    }

    if let Some(marker) = &options.platform.version_marker {
        let target = server_dir.join(".bundle_version.txt");
        fs::copy(marker, &target).map_err(|e| BundleError::io(&target, e))?;
    }

    Ok(core)
}

fn write_public_assets(
    bundle: &mut Bundle,
    build_path: &Path,
    options: &BundleOptions,
) -> Result<()> {
    let public = bundle.app_dir.join("public");
    if !public.is_dir() {
        return Ok(());
    }
    let static_dir = build_path.join("static");
    let copied = fsutil::copy_tree(&public, &static_dir, &options.ignores)?;
    for rel in copied {
        let path = static_dir.join(fsutil::path_from_slash(&rel));
        let contents = fs::read(&path).map_err(|e| BundleError::io(&path, e))?;
        bundle.manifest.push(ManifestEntry::plain(
            format!("static/{rel}"),
            ManifestKind::Static,
            format!("/{rel}"),
            contents.len() as u64,
            sha1_hex(&contents),
        ));
    }
    Ok(())
}

fn move_to_cacheable(bundle: &mut Bundle, name: &str, kind: ManifestKind) {
    let Some(contents) = bundle.files.client.shift_remove(name) else {
        return;
    };
    let hash = sha1_hex(&contents);
    bundle.manifest.push(ManifestEntry::cacheable(
        format!("static_cacheable{name}"),
        kind,
        cache_bust_url(name, &hash),
        contents.len() as u64,
        hash,
    ));
    bundle
        .files
        .client_cacheable
        .insert(name.to_string(), contents);
}

fn write_native_module_trees(
    bundle: &Bundle,
    build_path: &Path,
    options: &BundleOptions,
) -> Result<()> {
    for (bundle_rel, source) in &bundle.node_modules_dirs {
        let target = build_path.join(fsutil::path_from_slash(bundle_rel));
        let parent_exists = target.parent().map(Path::is_dir).unwrap_or(false);
        if !parent_exists {
            warn!(
                path = bundle_rel.as_str(),
                "skipping native modules: parent directory absent from bundle"
            );
            continue;
        }
        match options.node_modules_mode {
            NodeModulesMode::Symlink => fsutil::symlink_dir(source, &target)?,
            NodeModulesMode::Copy | NodeModulesMode::Skip => {
                fsutil::copy_tree(source, &target, &options.ignores)?;
            }
        }
    }
    Ok(())
}

fn write_app_html(bundle: &mut Bundle, build_path: &Path) -> Result<()> {
    let scripts = manifest_urls(bundle, ManifestKind::Js);
    let stylesheets = manifest_urls(bundle, ManifestKind::Css);
    let head_extra = join_fragments(&bundle.head);
    let body_extra = join_fragments(&bundle.body);

    let html = html::render_shell(&scripts, &stylesheets, &head_extra, &body_extra)?;
    fsutil::write_file(&build_path.join("app.html"), html.as_bytes())?;
    bundle.manifest.push(ManifestEntry::internal(
        "app.html".to_string(),
        sha1_hex(html.as_bytes()),
    ));
    Ok(())
}

fn manifest_urls(bundle: &Bundle, kind: ManifestKind) -> Vec<String> {
    bundle
        .manifest
        .iter()
        .filter(|entry| entry.location == ManifestWhere::Client && entry.kind == Some(kind))
        .filter_map(|entry| entry.url.clone())
        .collect()
}

fn join_fragments(fragments: &[Vec<u8>]) -> String {
    let mut joined = String::new();
    for fragment in fragments {
        joined.push_str(&String::from_utf8_lossy(fragment));
        if !joined.ends_with('\n') {
            joined.push('\n');
        }
    }
    joined
}

fn dependencies_json(
    bundle: &Bundle,
    options: &BundleOptions,
    core: Vec<String>,
) -> DependenciesJson {
    let mut app = BTreeSet::new();
    let mut packages: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut extensions = Vec::new();
    for id in bundle.pbrs.ids() {
        let pbr = bundle.pbrs.get(id);
        match pbr.package.name() {
            None => {
                app.extend(pbr.deps.iter().cloned());
                extensions = pbr
                    .package
                    .registered_extensions()
                    .into_iter()
                    .collect();
            }
            Some(name) => {
                packages
                    .entry(name.to_string())
                    .or_default()
                    .extend(pbr.deps.iter().cloned());
            }
        }
    }
    DependenciesJson {
        core,
        app: app.into_iter().collect(),
        packages: packages
            .into_iter()
            .map(|(name, deps)| (name, deps.into_iter().collect()))
            .collect(),
        extensions,
        exclude: options.ignores.sources(),
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut data = serde_json::to_vec_pretty(value).expect("manifest types serialise");
    data.push(b'\n');
    fsutil::write_file(path, &data)?;
    Ok(())
}

fn normalize_output(path: &Path) -> Result<PathBuf> {
    let cleaned = path.clean();
    if cleaned.is_absolute() {
        Ok(cleaned)
    } else {
        let cwd = std::env::current_dir().map_err(|e| BundleError::io(path, e))?;
        Ok(cwd.join(cleaned).clean())
    }
}
