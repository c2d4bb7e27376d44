//! Source compilation: every declared source file of every present
//! (record, environment) pair is routed through its extension handler, or
//! becomes a static resource when no handler claims the extension.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use skiff_pack::{
    fsutil, EmitOptions, EmitSink, Env, HandlerInput, Package, PerEnv, Resource, ResourceKind,
};

use crate::error::{BundleError, Result};
use crate::pbr::{PbrId, PbrSet};

/// Collects handler emissions into a record's resource lists.
struct ResourceSink<'a> {
    package: &'a Package,
    resources: &'a mut PerEnv<Vec<Resource>>,
}

impl EmitSink for ResourceSink<'_> {
    fn emit(&mut self, options: EmitOptions) -> skiff_pack::Result<()> {
        let data = self.package.read_emit_data(&options)?;
        for &env in &options.envs {
            let resource = if options.kind.is_html_fragment() {
                Resource::fragment(options.kind, data.clone())
            } else {
                let serve_path = options
                    .serve_path
                    .clone()
                    .expect("validated emissions carry a serve path");
                Resource::new(options.kind, data.clone(), serve_path)
            };
            self.resources[env].push(resource);
        }
        Ok(())
    }
}

/// Run every present record's sources through the handler table.
pub(crate) fn compile(pbrs: &mut PbrSet, order: &[PbrId]) -> Result<()> {
    for &id in order {
        let (package, role) = {
            let pbr = pbrs.get(id);
            (Arc::clone(&pbr.package), pbr.role)
        };
        for env in Env::ALL {
            if !pbrs.get(id).presence[env] {
                continue;
            }
            for rel in package.sources(role, env) {
                compile_source(pbrs, id, &package, role, env, rel)?;
            }
        }
    }
    Ok(())
}

fn compile_source(
    pbrs: &mut PbrSet,
    id: PbrId,
    package: &Arc<Package>,
    role: skiff_pack::Role,
    env: Env,
    rel: &str,
) -> Result<()> {
    let ext = extension_of(rel);
    let source_path = package.source_root().join(fsutil::path_from_slash(rel));
    let serve_path = package.serve_path_for(rel);

    if let Some(handler) = package.source_handler(role, env, &ext) {
        let handler = Arc::clone(handler);
        debug!(package = package.display_name(), source = rel, %env, ext = %ext, "compiling source");
        let pbr = pbrs.get_mut(id);
        let mut sink = ResourceSink {
            package,
            resources: &mut pbr.resources,
        };
        handler
            .handle(
                &mut sink,
                &HandlerInput {
                    source_path: &source_path,
                    serve_path: &serve_path,
                    env,
                },
            )
            .map_err(|e| BundleError::Handler {
                package: package.display_name().to_string(),
                source_path: rel.to_string(),
                source: e,
            })?;
    } else {
        // No handler claims this extension: serve the bytes verbatim.
        let data = fs::read(&source_path).map_err(|e| BundleError::io(&source_path, e))?;
        pbrs.get_mut(id).resources[env].push(Resource::new(ResourceKind::Static, data, serve_path));
    }
    pbrs.get_mut(id).deps.insert(rel.to_string());
    Ok(())
}

fn extension_of(rel: &str) -> String {
    Path::new(rel)
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default()
}
