//! Dependency resolution: the transitive closure of packages per
//! role and environment.
//!
//! Roots are the application (use role) and any requested test packages
//! (test role), each in both environments. Dependencies of a test-role
//! record are always use-role: tests may import production code of other
//! packages but never their tests.
//!
//! Unordered edges are followed here; they only affect ordering, not
//! reachability.

use std::sync::Arc;

use tracing::debug;

use skiff_pack::{Env, Package, PackageLoader, Role};

use crate::error::{BundleError, Result};
use crate::pbr::PbrSet;

/// Populate the PBR set from the given root packages.
pub(crate) fn resolve(
    pbrs: &mut PbrSet,
    loader: &dyn PackageLoader,
    roots: &[(Arc<Package>, Role)],
) -> Result<()> {
    for (package, role) in roots {
        for env in Env::ALL {
            visit(pbrs, loader, package, *role, env)?;
        }
    }
    debug!(records = pbrs.len(), "resolved package closure");
    Ok(())
}

fn visit(
    pbrs: &mut PbrSet,
    loader: &dyn PackageLoader,
    package: &Arc<Package>,
    role: Role,
    env: Env,
) -> Result<()> {
    let id = pbrs.get_or_insert(role, package);
    if pbrs.get(id).presence[env] {
        return Ok(());
    }
    pbrs.get_mut(id).presence[env] = true;

    for name in package.uses(role, env) {
        let used = loader
            .get(name)?
            .ok_or_else(|| BundleError::Resolution { name: name.clone() })?;
        visit(pbrs, loader, &used, Role::Use, env)?;
    }
    Ok(())
}
