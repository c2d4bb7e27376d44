//! The linker driver and the transport-code linker contract.
//!
//! For every record and environment, the driver gathers the symbols
//! importable from upstream packages, hands the record's JavaScript
//! resources to the linker as a group, and persists the computed exports
//! in the bundle's registry so downstream records can import them.
//!
//! The linker itself is a pure, deterministic collaborator. The built-in
//! [`ModuleLinker`] wraps package files in a shared function scope and
//! wires imports and exports through the global `Package` table; anything
//! smarter (symbol analysis, dead-code elimination) can be slotted in
//! behind the [`Linker`] trait without touching the driver.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use rustc_hash::FxHashMap;
use tracing::debug;

use skiff_pack::{Env, Package, PackageId, Resource, ResourceKind, Role};

use crate::error::{BundleError, Result};
use crate::pbr::{PbrId, PbrSet};

/// Serve path of the stub that binds imported symbols into the
/// application's global namespace.
pub const IMPORT_STUB_SERVE_PATH: &str = "/packages/global-imports.js";

/// One JavaScript file handed to the linker.
#[derive(Debug, Clone)]
pub struct LinkInput {
    pub source: String,
    pub serve_path: String,
}

/// Everything the linker needs for one (record, environment) pair.
#[derive(Debug)]
pub struct LinkRequest<'a> {
    /// JavaScript resources of the record, in emission order.
    pub inputs: Vec<LinkInput>,
    /// True for the application: files stay unwrapped and symbols live in
    /// the global namespace.
    pub use_global_namespace: bool,
    /// Where the combined package file serves; `None` for the
    /// application.
    pub combined_serve_path: Option<String>,
    /// Where the global import stub serves when one is produced.
    pub import_stub_serve_path: &'a str,
    /// Importable symbols: symbol name to supplying package name.
    pub imports: BTreeMap<String, String>,
    /// The package name; `None` for the application.
    pub name: Option<&'a str>,
    /// Declared exports the linker must keep alive.
    pub force_exports: &'a [String],
}

/// A file produced by the linker.
#[derive(Debug, Clone)]
pub struct LinkedFile {
    pub source: String,
    pub serve_path: String,
}

/// The linker's result: output files plus the symbols the package
/// actually exports.
#[derive(Debug, Clone)]
pub struct LinkOutput {
    pub files: Vec<LinkedFile>,
    pub exports: Vec<String>,
}

/// The transport-code linker contract. Must be pure and deterministic.
pub trait Linker {
    fn link(&self, request: LinkRequest<'_>) -> std::result::Result<LinkOutput, String>;
}

/// Computed exports, keyed by `(package, role, environment)`.
///
/// The registry is owned by the bundle and written through by the driver,
/// which keeps packages read-only after load.
#[derive(Default)]
pub struct ExportsRegistry {
    computed: FxHashMap<(PackageId, Role, Env), Vec<String>>,
}

impl ExportsRegistry {
    pub fn record(&mut self, package: PackageId, role: Role, env: Env, exports: Vec<String>) {
        self.computed.insert((package, role, env), exports);
    }

    /// The exports of a package as downstream records observe them:
    /// computed if linking already ran, declared otherwise.
    pub fn exports_of<'a>(&'a self, package: &'a Package, role: Role, env: Env) -> &'a [String] {
        match self.computed.get(&(package.id(), role, env)) {
            Some(computed) => computed,
            None => package.exports(role, env),
        }
    }
}

/// Link every present (record, environment) pair, in load order.
pub(crate) fn link(
    pbrs: &mut PbrSet,
    order: &[PbrId],
    registry: &mut ExportsRegistry,
    linker: &dyn Linker,
) -> Result<()> {
    for &id in order {
        for env in Env::ALL {
            if !pbrs.get(id).presence[env] {
                continue;
            }
            link_record(pbrs, id, env, registry, linker)?;
        }
    }
    Ok(())
}

fn link_record(
    pbrs: &mut PbrSet,
    id: PbrId,
    env: Env,
    registry: &mut ExportsRegistry,
    linker: &dyn Linker,
) -> Result<()> {
    let (package, role) = {
        let pbr = pbrs.get(id);
        (std::sync::Arc::clone(&pbr.package), pbr.role)
    };

    // Importable symbols come from the production-role exports of every
    // ordered upstream package; a later `uses` entry wins a collision.
    let mut imports = BTreeMap::new();
    for name in package.uses(role, env) {
        if package.is_unordered(name) {
            continue;
        }
        let Some(upstream) = pbrs.package_by_name(name) else {
            continue;
        };
        for symbol in registry.exports_of(upstream, Role::Use, env) {
            imports.insert(symbol.clone(), name.clone());
        }
    }

    let pbr = pbrs.get_mut(id);
    let mut inputs = Vec::new();
    let mut retained = Vec::new();
    for resource in std::mem::take(&mut pbr.resources[env]) {
        if resource.kind == ResourceKind::Js {
            let serve_path = resource.serve_path().to_string();
            let source = String::from_utf8(resource.data).map_err(|_| BundleError::Link {
                package: package.display_name().to_string(),
                message: format!("js resource '{serve_path}' is not UTF-8"),
            })?;
            inputs.push(LinkInput { source, serve_path });
        } else {
            retained.push(resource);
        }
    }
    pbr.resources[env] = retained;

    let combined_serve_path = package.name().map(|name| match role {
        Role::Use => format!("/packages/{name}.js"),
        Role::Test => format!("/package-tests/{name}.js"),
    });

    debug!(
        package = package.display_name(),
        %role,
        %env,
        inputs = inputs.len(),
        imports = imports.len(),
        "linking"
    );

    let output = linker
        .link(LinkRequest {
            inputs,
            use_global_namespace: package.is_app(),
            combined_serve_path,
            import_stub_serve_path: IMPORT_STUB_SERVE_PATH,
            imports,
            name: package.name(),
            force_exports: package.exports(role, env),
        })
        .map_err(|message| BundleError::Link {
            package: package.display_name().to_string(),
            message,
        })?;

    registry.record(package.id(), role, env, output.exports);
    let pbr = pbrs.get_mut(id);
    for file in output.files {
        pbr.resources[env].push(Resource::new(
            ResourceKind::Js,
            file.source.into_bytes(),
            file.serve_path,
        ));
    }
    Ok(())
}

/// The built-in linker: deterministic scope wrapping over the global
/// `Package` table.
///
/// Named packages become one combined file: every input shares a single
/// function scope, imported symbols are bound as scope-local variables,
/// and the declared exports are published on `Package["<name>"]`.
/// Application files pass through unwrapped, preceded by a stub that
/// binds imports into the global namespace. Computed exports are the
/// declared set; this linker does no symbol analysis of its own.
pub struct ModuleLinker;

impl Linker for ModuleLinker {
    fn link(&self, request: LinkRequest<'_>) -> std::result::Result<LinkOutput, String> {
        if request.use_global_namespace {
            return link_app(request);
        }
        link_package(request)
    }
}

fn link_app(request: LinkRequest<'_>) -> std::result::Result<LinkOutput, String> {
    let mut files = Vec::new();
    if !request.imports.is_empty() {
        let mut stub = String::from("// Symbols imported into the app's global namespace.\n");
        for (symbol, supplier) in &request.imports {
            let _ = writeln!(stub, "{symbol} = Package[\"{supplier}\"][\"{symbol}\"];");
        }
        files.push(LinkedFile {
            source: stub,
            serve_path: request.import_stub_serve_path.to_string(),
        });
    }
    files.extend(request.inputs.into_iter().map(|input| LinkedFile {
        source: input.source,
        serve_path: input.serve_path,
    }));
    Ok(LinkOutput {
        files,
        exports: request.force_exports.to_vec(),
    })
}

fn link_package(request: LinkRequest<'_>) -> std::result::Result<LinkOutput, String> {
    let name = request
        .name
        .ok_or("combined linking requires a package name")?;
    let serve_path = request
        .combined_serve_path
        .ok_or("combined linking requires a combined serve path")?;

    if request.inputs.is_empty() && request.force_exports.is_empty() {
        return Ok(LinkOutput {
            files: Vec::new(),
            exports: Vec::new(),
        });
    }

    let mut out = String::new();
    out.push_str("if (typeof Package === \"undefined\") Package = {};\n");
    out.push_str("(function () {\n\n");
    for (symbol, supplier) in &request.imports {
        let _ = writeln!(out, "var {symbol} = Package[\"{supplier}\"][\"{symbol}\"];");
    }
    if !request.imports.is_empty() {
        out.push('\n');
    }
    for input in &request.inputs {
        let _ = writeln!(out, "// {}", input.serve_path);
        out.push_str(&input.source);
        if !input.source.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
    }
    let _ = writeln!(out, "Package[\"{name}\"] = {{");
    for symbol in request.force_exports {
        let _ = writeln!(out, "  \"{symbol}\": {symbol},");
    }
    out.push_str("};\n\n})();\n");

    Ok(LinkOutput {
        files: vec![LinkedFile {
            source: out,
            serve_path,
        }],
        exports: request.force_exports.to_vec(),
    })
}
