//! Aggregation: merge per-record resources into the bundle-wide file
//! tables and ordered load lists.
//!
//! Records are walked in load order, so the aggregated lists define the
//! final script and stylesheet order. A serve path may be claimed only
//! once per environment. Server-side stylesheets are discarded for
//! compatibility with existing packages.

use tracing::debug;

use skiff_pack::{Env, ResourceKind};

use crate::bundle::Bundle;
use crate::error::{BundleError, Result};

pub(crate) fn aggregate(bundle: &mut Bundle) -> Result<()> {
    for position in 0..bundle.order.len() {
        let id = bundle.order[position];
        for env in Env::ALL {
            if !bundle.pbrs.get(id).presence[env] {
                continue;
            }
            let resources = bundle.pbrs.get_mut(id).resources[env].drain(..).collect::<Vec<_>>();
            let package = bundle.pbrs.get(id).package.display_name().to_string();
            for resource in resources {
                place(bundle, &package, env, resource)?;
            }
        }
    }
    debug!(
        js_client = bundle.js[Env::Client].len(),
        js_server = bundle.js[Env::Server].len(),
        css = bundle.css.len(),
        static_client = bundle.statics[Env::Client].len(),
        static_server = bundle.statics[Env::Server].len(),
        head = bundle.head.len(),
        body = bundle.body.len(),
        "aggregated resources"
    );
    Ok(())
}

fn place(
    bundle: &mut Bundle,
    package: &str,
    env: Env,
    resource: skiff_pack::Resource,
) -> Result<()> {
    match resource.kind {
        ResourceKind::Js => {
            let serve_path = resource.serve_path().to_string();
            insert_file(bundle, env, &serve_path, resource.data)?;
            bundle.js[env].push(serve_path);
        }
        ResourceKind::Css => {
            if env == Env::Server {
                // Packages are allowed to emit server stylesheets; there
                // is nothing to apply them to, so they are dropped.
                debug!(package, path = resource.serve_path(), "dropping server-side css");
                return Ok(());
            }
            let serve_path = resource.serve_path().to_string();
            insert_file(bundle, env, &serve_path, resource.data)?;
            bundle.css.push(serve_path);
        }
        ResourceKind::Static => {
            let serve_path = resource.serve_path().to_string();
            insert_file(bundle, env, &serve_path, resource.data)?;
            bundle.statics[env].push(serve_path);
        }
        ResourceKind::Head | ResourceKind::Body => {
            if env != Env::Client {
                return Err(BundleError::FragmentOnServer {
                    kind: resource.kind.to_string(),
                    package: package.to_string(),
                });
            }
            let target = if resource.kind == ResourceKind::Head {
                &mut bundle.head
            } else {
                &mut bundle.body
            };
            target.push(resource.data);
        }
    }
    Ok(())
}

fn insert_file(bundle: &mut Bundle, env: Env, serve_path: &str, data: Vec<u8>) -> Result<()> {
    let table = match env {
        Env::Client => &mut bundle.files.client,
        Env::Server => &mut bundle.files.server,
    };
    if table.contains_key(serve_path) {
        return Err(BundleError::PathConflict {
            serve_path: serve_path.to_string(),
            env,
        });
    }
    table.insert(serve_path.to_string(), data);
    Ok(())
}
