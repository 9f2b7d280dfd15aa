//! Drag-resistance filter.
//!
//! A child node clamped to its parent's extent should not pop out because
//! of a twitchy pointer. Breaking free requires both holding the drag for
//! `MIN_DRAG_TIME` *and* pulling the cursor more than
//! `RESISTANCE_THRESHOLD` away from the node's visual center.

use crate::id::NodeId;
use crate::model::{Node, Position};
use log::debug;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Temporal hysteresis: drags shorter than this never detach a node.
pub const MIN_DRAG_TIME: Duration = Duration::from_millis(500);

/// Cursor distance from the node center required to break free, in px.
pub const RESISTANCE_THRESHOLD: f32 = 100.0;

/// Per-gesture drag timers. One instance lives on the editor session;
/// `reset` gives tests a clean slate.
///
/// Callers pass `now` explicitly so the gate is deterministic under test.
#[derive(Debug, Default)]
pub struct DragResistance {
    started: HashMap<NodeId, Instant>,
}

impl DragResistance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `node` may leave `parent`'s extent at this frame.
    ///
    /// Root nodes (no parent) are always free. The first call of a gesture
    /// records its start time; the entry stays until `end_gesture`.
    pub fn should_break_free(
        &mut self,
        node: &Node,
        mouse: Position,
        parent: Option<&Node>,
        now: Instant,
    ) -> bool {
        if parent.is_none() {
            return true;
        }
        let started = *self.started.entry(node.id).or_insert(now);
        let elapsed = now.duration_since(started);
        if elapsed < MIN_DRAG_TIME {
            return false;
        }
        let distance = mouse.distance_to(node.rect().center());
        let free = distance > RESISTANCE_THRESHOLD;
        if free {
            debug!(
                "{} breaks free after {elapsed:?} at {distance:.1}px",
                node.id
            );
        }
        free
    }

    /// Forget the gesture timer for `node`. Called on drag-stop and
    /// drag-cancel alike.
    pub fn end_gesture(&mut self, node: NodeId) {
        self.started.remove(&node);
    }

    /// Drop all timers (test isolation / session teardown).
    pub fn reset(&mut self) {
        self.started.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeKind, Size};

    fn nodes() -> (Node, Node) {
        let parent = Node::new(
            NodeId::intern("parent"),
            NodeKind::Text,
            Position::new(0.0, 0.0),
        )
        .with_size(Size::new(600.0, 400.0));
        let child = Node::new(
            NodeId::intern("child"),
            NodeKind::Text,
            Position::new(100.0, 100.0),
        )
        .with_size(Size::new(100.0, 50.0)); // center at (150, 125)
        (parent, child)
    }

    #[test]
    fn root_nodes_always_free() {
        let (_, child) = nodes();
        let mut filter = DragResistance::new();
        assert!(filter.should_break_free(&child, Position::new(0.0, 0.0), None, Instant::now()));
    }

    #[test]
    fn time_gate_holds_regardless_of_distance() {
        let (parent, child) = nodes();
        let mut filter = DragResistance::new();
        let t0 = Instant::now();
        // Far away, but the gesture just started.
        let far = Position::new(5000.0, 5000.0);
        assert!(!filter.should_break_free(&child, far, Some(&parent), t0));
        assert!(!filter.should_break_free(
            &child,
            far,
            Some(&parent),
            t0 + Duration::from_millis(499)
        ));
    }

    #[test]
    fn breaks_free_only_with_time_and_distance() {
        let (parent, child) = nodes();
        let mut filter = DragResistance::new();
        let t0 = Instant::now();
        filter.should_break_free(&child, Position::new(150.0, 125.0), Some(&parent), t0);

        let later = t0 + Duration::from_millis(600);
        // Elapsed, but cursor within 100px of the child center.
        assert!(!filter.should_break_free(&child, Position::new(200.0, 125.0), Some(&parent), later));
        // Elapsed and 200px out.
        assert!(filter.should_break_free(&child, Position::new(350.0, 125.0), Some(&parent), later));
    }

    #[test]
    fn end_gesture_restarts_the_clock() {
        let (parent, child) = nodes();
        let mut filter = DragResistance::new();
        let t0 = Instant::now();
        let far = Position::new(400.0, 125.0);
        filter.should_break_free(&child, far, Some(&parent), t0);
        assert!(filter.should_break_free(&child, far, Some(&parent), t0 + Duration::from_secs(1)));

        filter.end_gesture(child.id);
        // New gesture: the hysteresis window applies again.
        let t1 = t0 + Duration::from_secs(5);
        assert!(!filter.should_break_free(&child, far, Some(&parent), t1));
    }
}
