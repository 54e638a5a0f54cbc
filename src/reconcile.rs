//! Ghost-reference repair: dropping references to cards that were deleted
//! from the catalog after users already held copies of them.
//!
//! This runs opportunistically outside the accept-trade transaction; it does
//! not prevent the inconsistency, it cleans it up after the fact.

use std::collections::HashSet;

use serde::Serialize;

use crate::inventory::OwnedCopy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Owned copies dropped because their card id left the catalog.
    pub removed: usize,
    /// Owned copies that survived the pass.
    pub kept: usize,
}

/// Split a collection into surviving copies and a report, keeping only copies
/// whose card id is still in the valid set.
pub fn filter_collection(
    copies: Vec<OwnedCopy>,
    valid_ids: &HashSet<&str>,
) -> (Vec<OwnedCopy>, ReconcileReport) {
    let total = copies.len();
    let kept: Vec<OwnedCopy> = copies
        .into_iter()
        .filter(|copy| valid_ids.contains(copy.card_id.as_str()))
        .collect();
    let report = ReconcileReport {
        removed: total - kept.len(),
        kept: kept.len(),
    };
    (kept, report)
}

/// Drop every card-id reference that is no longer in the valid set. Used for
/// favorite lists and for-trade marking sets.
pub fn filter_references(ids: &mut Vec<String>, valid_ids: &HashSet<&str>) {
    ids.retain(|id| valid_ids.contains(id.as_str()));
}
