//! Drop-target selection for drag gestures.
//!
//! Given the set of nodes a dragged node currently intersects, pick the one
//! that should become its parent — or `None` to drop it at top level. The
//! function is pure and deterministic: the drag-preview UI calls it every
//! pointer frame and must get a stable answer for identical geometry.

use crate::graph::GraphSnapshot;
use crate::id::NodeId;
use crate::model::Node;
use std::cmp::Ordering;

/// Select the best new parent for `dragged` among `candidates`.
///
/// Candidates that are the dragged node itself or one of its descendants
/// are excluded first (that exclusion is what keeps the parent chain
/// acyclic). Of the rest, only nodes that currently have children — or the
/// dragged node's current parent — qualify; an arbitrary leaf never becomes
/// a parent by accident. Sibling candidates outrank the current parent,
/// and the remainder are ranked by bounding-box overlap, then center
/// distance, then id recency.
///
/// Returns `None` when the node should become top-level.
pub fn select_parent(
    dragged: &Node,
    candidates: &[NodeId],
    snap: &GraphSnapshot,
) -> Option<NodeId> {
    let valid: Vec<NodeId> = candidates
        .iter()
        .copied()
        .filter(|c| *c != dragged.id && snap.contains_node(*c))
        .filter(|c| !snap.is_ancestor(dragged.id, *c))
        .filter(|c| snap.is_parent(*c) || Some(*c) == dragged.parent)
        .collect();

    if valid.is_empty() {
        return None;
    }

    let siblings: Vec<NodeId> = valid
        .iter()
        .copied()
        .filter(|c| snap.node(*c).is_some_and(|n| n.parent == dragged.parent))
        .collect();

    let pool = if !siblings.is_empty() {
        siblings
    } else if dragged.parent.is_some_and(|p| valid.contains(&p)) {
        return dragged.parent;
    } else {
        valid
    };

    rank(dragged, &pool, snap)
}

fn rank(dragged: &Node, pool: &[NodeId], snap: &GraphSnapshot) -> Option<NodeId> {
    let dragged_rect = dragged.rect();
    let dragged_center = dragged_rect.center();

    pool.iter()
        .copied()
        .filter_map(|c| {
            let rect = snap.node(c)?.rect();
            Some((
                c,
                dragged_rect.overlap_area(&rect),
                dragged_center.distance_to(rect.center()),
            ))
        })
        .min_by(|(a_id, a_overlap, a_dist), (b_id, b_overlap, b_dist)| {
            // Larger overlap first; center distance only breaks 0-overlap
            // ties; then the larger numeric suffix ("more recent") wins.
            b_overlap
                .total_cmp(a_overlap)
                .then_with(|| {
                    if *a_overlap == 0.0 && *b_overlap == 0.0 {
                        a_dist.total_cmp(b_dist)
                    } else {
                        Ordering::Equal
                    }
                })
                .then_with(|| {
                    let a_n = a_id.numeric_suffix().unwrap_or(0);
                    let b_n = b_id.numeric_suffix().unwrap_or(0);
                    b_n.cmp(&a_n)
                })
                .then_with(|| a_id.cmp(b_id))
        })
        .map(|(id, _, _)| id)
}
