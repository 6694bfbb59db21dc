//! Branch merging and pruning.

use tracing::trace;

use crate::branch::Branch;

/// Insert `branch` into `into`, summing amplitudes with any structurally
/// equal entry already present. Call this when a primitive may
/// produce branches equal to ones already emitted this pass.
pub fn insert_merging(into: &mut Vec<Branch>, branch: Branch) {
    for existing in into.iter_mut() {
        if existing.structurally_eq(&branch) {
            existing.amp += branch.amp;
            return;
        }
    }
    into.push(branch);
}

/// Merge every branch in `incoming` into `into` by structural equality.
pub fn merge_all(into: &mut Vec<Branch>, incoming: Vec<Branch>) {
    for branch in incoming {
        insert_merging(into, branch);
    }
}

/// Drop branches with `|amp| < threshold` and renormalize what remains.
pub fn prune(branches: &mut Vec<Branch>, threshold: f64) {
    let before = branches.len();
    branches.retain(|b| b.amp.norm() > threshold);
    if branches.len() != before {
        trace!(dropped = before - branches.len(), "pruned near-zero branches");
    }

    let norm: f64 = branches.iter().map(|b| b.amp.norm_sqr()).sum::<f64>().sqrt();
    if norm > 0.0 {
        for b in branches.iter_mut() {
            b.amp /= norm;
        }
    }
}
