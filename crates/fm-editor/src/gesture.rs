//! Drag gesture handling with an ephemeral working copy.
//!
//! Pointer-move frames never touch the canonical store: the dragged node's
//! position and provisional parent live in a `DragGesture` buffer until
//! drag-stop, which commits them in exactly one transaction. Cancelling
//! discards the buffer and opens no transaction, so a 60fps drag costs
//! neither undo entries nor store-wide re-renders.
//!
//! While a parented node has not broken free (see
//! `fm_core::resistance`), its working position is clamped to the parent's
//! bounds — the cursor keeps moving, the node stops at the border, and the
//! growing cursor-to-center distance is what eventually breaks it loose.

use crate::session::EditorSession;
use fm_core::graph::{NodePatch, ParentAssignment};
use fm_core::id::NodeId;
use fm_core::model::{DEFAULT_NODE_SIZE, Extent, Node, Position, Rect, Size};
use fm_core::reparent::select_parent;
use log::{debug, warn};
use std::time::Instant;

/// Ephemeral, uncommitted state of one drag gesture.
#[derive(Debug)]
pub struct DragGesture {
    node: NodeId,
    /// The node as it was in the store when the gesture began.
    origin: Node,
    /// Buffered position (canvas-absolute top-left).
    position: Position,
    /// Parent resolved so far; `None` means "keep the original parent".
    pending_parent: Option<ParentAssignment>,
    broke_free: bool,
    moved: bool,
}

/// Per-frame feedback for optimistic drop-target highlighting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragPreview {
    pub position: Position,
    /// Provisional parent (`None` = would become top-level).
    pub parent: Option<NodeId>,
    pub broke_free: bool,
}

impl EditorSession {
    /// Begin dragging `node`. Replaces any gesture left dangling.
    pub fn drag_start(&mut self, node: NodeId) -> bool {
        if self.drag.is_some() {
            warn!("drag_start: previous gesture still active; cancelling it");
            self.drag_cancel();
        }
        let Some(origin) = self.store.snap().node(node).cloned() else {
            warn!("drag_start: unknown node {node}; ignoring");
            return false;
        };
        self.drag = Some(DragGesture {
            node,
            position: origin.position,
            // Top-level nodes are free from the first frame.
            broke_free: origin.parent.is_none(),
            pending_parent: None,
            moved: false,
            origin,
        });
        true
    }

    /// Advance the gesture by one pointer frame.
    ///
    /// `intersecting` is the candidate set computed by the renderer's hit
    /// test; `now` is passed explicitly so the resistance gate is
    /// deterministic under test.
    pub fn drag_move(
        &mut self,
        mouse: Position,
        intersecting: &[NodeId],
        now: Instant,
    ) -> Option<DragPreview> {
        let Some(mut gesture) = self.drag.take() else {
            warn!("drag_move without an active gesture; ignoring");
            return None;
        };
        gesture.moved = true;

        let size = gesture.origin.size.unwrap_or(DEFAULT_NODE_SIZE);
        let desired = Position::new(mouse.x - size.width / 2.0, mouse.y - size.height / 2.0);

        if !gesture.broke_free {
            let parent = gesture
                .origin
                .parent
                .and_then(|p| self.store.snap().node(p).cloned());
            match parent {
                Some(parent_node) => {
                    let clamped = clamp_to_rect(desired, size, &parent_node.rect());
                    let mut probe = gesture.origin.clone();
                    probe.position = clamped;
                    if self
                        .resistance
                        .should_break_free(&probe, mouse, Some(&parent_node), now)
                    {
                        debug!("{} broke free of {}", gesture.node, parent_node.id);
                        gesture.broke_free = true;
                    } else {
                        gesture.position = clamped;
                        let preview = DragPreview {
                            position: clamped,
                            parent: gesture.origin.parent,
                            broke_free: false,
                        };
                        self.drag = Some(gesture);
                        return Some(preview);
                    }
                }
                // Parent vanished mid-gesture (e.g. concurrent dissolve).
                None => gesture.broke_free = true,
            }
        }

        gesture.position = desired;
        let mut probe = gesture.origin.clone();
        probe.position = desired;
        let selected = select_parent(&probe, intersecting, self.store.snap());
        gesture.pending_parent = Some(match selected {
            Some(parent) => ParentAssignment::Node(parent),
            None => ParentAssignment::Root,
        });

        let preview = DragPreview {
            position: desired,
            parent: selected,
            broke_free: true,
        };
        self.drag = Some(gesture);
        Some(preview)
    }

    /// Finish the gesture: commit the working copy as one transaction.
    /// Returns `true` if anything was committed.
    pub fn drag_stop(&mut self) -> bool {
        let Some(gesture) = self.drag.take() else {
            return false;
        };
        self.resistance.end_gesture(gesture.node);
        if !gesture.moved {
            return false;
        }

        let mut patch = NodePatch::new().position(gesture.position);
        if let Some(assignment) = gesture.pending_parent {
            let extent = match assignment {
                ParentAssignment::Node(_) => Extent::Parent,
                ParentAssignment::Root => Extent::Free,
            };
            patch = patch.parent(assignment).extent(extent);
        }

        self.history.begin(&self.store, "move node");
        let applied = self.store.update_node(gesture.node, patch);
        // Pulling the last sibling out of a container leaves it with one
        // child; dissolve such containers in the same undo step.
        if applied && gesture.pending_parent.is_some() {
            self.sweep_degenerate_containers();
        }
        self.history.end(&self.store);
        applied
    }

    /// Abort the gesture: the working copy is discarded, the store is left
    /// untouched, and no transaction is opened.
    pub fn drag_cancel(&mut self) {
        if let Some(gesture) = self.drag.take() {
            self.resistance.end_gesture(gesture.node);
        }
    }

    /// Id of the node currently being dragged, if any.
    pub fn dragging(&self) -> Option<NodeId> {
        self.drag.as_ref().map(|g| g.node)
    }
}

/// Clamp a node's top-left so its box stays inside `bounds`.
fn clamp_to_rect(desired: Position, size: Size, bounds: &Rect) -> Position {
    let max_x = bounds.x + (bounds.width - size.width).max(0.0);
    let max_y = bounds.y + (bounds.height - size.height).max(0.0);
    Position::new(
        desired.x.clamp(bounds.x, max_x),
        desired.y.clamp(bounds.y, max_y),
    )
}
