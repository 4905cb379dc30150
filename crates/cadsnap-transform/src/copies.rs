//! Evenly stepped copies of a transform.

use cadsnap_core::TransformAction;

use crate::delta::{compute_delta, Delta};

/// Deltas for `copy_count` copies plus the original.
///
/// With `n` copies the action is split into `n + 1` equal steps; step `k` is
/// evaluated at fraction `k / (n + 1)`. The last entry is the full delta and
/// applies to the original target, the others to its duplicates.
pub fn copy_deltas(action: &TransformAction) -> Vec<Delta> {
    let steps = action.copy_count.saturating_add(1);
    (1..=steps).map(|k| compute_delta(&action.at_step(k, steps))).collect()
}
