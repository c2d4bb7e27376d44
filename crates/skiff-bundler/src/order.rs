//! Load ordering: a topological sort of the PBR set.
//!
//! For every edge where X's package uses Y (in any environment of X's
//! role) and Y is not marked unordered by X, Y precedes X in the result.
//! Dependencies always point at use-role records, which keeps the
//! relation acyclic even when a test imports the package it tests. Ties
//! are broken by record creation order.

use tracing::debug;

use skiff_pack::Env;

use crate::error::{BundleError, Result};
use crate::pbr::{PbrId, PbrSet};

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

struct Frame {
    id: PbrId,
    deps: Vec<PbrId>,
    cursor: usize,
}

/// The ordered dependencies of one record: use-role records of every
/// non-unordered `uses` edge, both environments, in declaration order.
fn edges(pbrs: &PbrSet, id: PbrId) -> Vec<PbrId> {
    let pbr = pbrs.get(id);
    let mut deps = Vec::new();
    for env in Env::ALL {
        for name in pbr.package.uses(pbr.role, env) {
            if pbr.package.is_unordered(name) {
                continue;
            }
            // A name that never joined the bundle (declared for an
            // environment this record is absent from) orders nothing.
            if let Some(dep) = pbrs.use_record_by_name(name) {
                if !deps.contains(&dep) {
                    deps.push(dep);
                }
            }
        }
    }
    deps
}

/// Emit every record once, dependencies first. Iterative depth-first
/// post-order; a record met again while still on the stack is a cycle.
pub(crate) fn load_order(pbrs: &PbrSet) -> Result<Vec<PbrId>> {
    let mut mark = vec![Mark::Unvisited; pbrs.len()];
    let mut order = Vec::with_capacity(pbrs.len());

    for root in pbrs.ids() {
        if mark[root.index()] != Mark::Unvisited {
            continue;
        }
        mark[root.index()] = Mark::OnStack;
        let mut stack = vec![Frame {
            id: root,
            deps: edges(pbrs, root),
            cursor: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            if frame.cursor < frame.deps.len() {
                let next = frame.deps[frame.cursor];
                frame.cursor += 1;
                let from = frame.id;
                match mark[next.index()] {
                    Mark::Unvisited => {
                        mark[next.index()] = Mark::OnStack;
                        stack.push(Frame {
                            id: next,
                            deps: edges(pbrs, next),
                            cursor: 0,
                        });
                    }
                    Mark::OnStack => {
                        return Err(BundleError::Cycle {
                            a: pbrs.get(from).package.display_name().to_string(),
                            b: pbrs.get(next).package.display_name().to_string(),
                        });
                    }
                    Mark::Done => {}
                }
            } else {
                let done = stack.pop().expect("frame inspected above");
                mark[done.id.index()] = Mark::Done;
                order.push(done.id);
            }
        }
    }

    debug!(records = order.len(), "computed load order");
    Ok(order)
}
