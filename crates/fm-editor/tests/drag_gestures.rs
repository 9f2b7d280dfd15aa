//! Drag gesture lifecycle: buffered moves, the resistance gate, reparent
//! previews, and the single commit on drag-stop.

use std::time::{Duration, Instant};

use fm_core::{
    Extent, Handle, Node, NodeId, NodeKind, NodePatch, ParentAssignment, Position, Size,
};
use fm_editor::EditorSession;
use pretty_assertions::assert_eq;

fn topic(session: &mut EditorSession, name: &str, x: f32, y: f32) -> NodeId {
    let id = NodeId::intern(name);
    session
        .store_mut()
        .add_node(Node::new(id, NodeKind::Text, Position::new(x, y)));
    id
}

/// Parent `p` (600×400 at origin) holding child `c` (100×50) clamped to it.
fn clamped_pair(session: &mut EditorSession) -> (NodeId, NodeId) {
    let p = NodeId::intern("p");
    session.store_mut().add_node(
        Node::new(p, NodeKind::Text, Position::new(0.0, 0.0)).with_size(Size::new(600.0, 400.0)),
    );
    let c = NodeId::intern("c");
    session.store_mut().add_node(
        Node::new(c, NodeKind::Text, Position::new(100.0, 100.0))
            .with_size(Size::new(100.0, 50.0)),
    );
    session.store_mut().update_node(
        c,
        NodePatch::new()
            .parent(ParentAssignment::Node(p))
            .extent(Extent::Parent),
    );
    (p, c)
}

#[test]
fn drag_commits_one_transaction_on_stop() {
    let mut session = EditorSession::new();
    let a = topic(&mut session, "a", 0.0, 0.0);
    let t0 = Instant::now();

    assert!(session.drag_start(a));
    // Root node: free from the first frame, follows the cursor center.
    let preview = session.drag_move(Position::new(500.0, 300.0), &[], t0).unwrap();
    assert!(preview.broke_free);
    assert_eq!(preview.position, Position::new(425.0, 280.0));
    assert_eq!(preview.parent, None);

    // The store has not moved yet.
    assert_eq!(session.snap().node(a).unwrap().position, Position::new(0.0, 0.0));

    assert!(session.drag_stop());
    assert_eq!(
        session.snap().node(a).unwrap().position,
        Position::new(425.0, 280.0)
    );

    assert_eq!(session.undo().as_deref(), Some("move node"));
    assert_eq!(session.snap().node(a).unwrap().position, Position::new(0.0, 0.0));
    assert!(!session.can_undo(), "the whole drag was one entry");
}

#[test]
fn drag_cancel_discards_the_working_copy() {
    let mut session = EditorSession::new();
    let a = topic(&mut session, "a", 0.0, 0.0);
    let t0 = Instant::now();

    session.drag_start(a);
    session.drag_move(Position::new(900.0, 900.0), &[], t0);
    session.drag_cancel();

    assert_eq!(session.dragging(), None);
    assert_eq!(session.snap().node(a).unwrap().position, Position::new(0.0, 0.0));
    assert!(!session.can_undo());
}

#[test]
fn drag_stop_without_movement_commits_nothing() {
    let mut session = EditorSession::new();
    let a = topic(&mut session, "a", 0.0, 0.0);

    session.drag_start(a);
    assert!(!session.drag_stop());
    assert!(!session.can_undo());
}

#[test]
fn clamped_child_resists_until_time_and_distance() {
    let mut session = EditorSession::new();
    let (p, c) = clamped_pair(&mut session);
    let t0 = Instant::now();
    let far = Position::new(5000.0, 5000.0);

    session.drag_start(c);

    // Frame 1: cursor far outside, gesture just started. The node pins to
    // the parent's border instead of following.
    let preview = session.drag_move(far, &[], t0).unwrap();
    assert!(!preview.broke_free);
    assert_eq!(preview.position, Position::new(500.0, 350.0));
    assert_eq!(preview.parent, Some(p));

    // Frame 2: still inside the hysteresis window.
    let preview = session
        .drag_move(far, &[], t0 + Duration::from_millis(499))
        .unwrap();
    assert!(!preview.broke_free);

    // Frame 3: time elapsed and the cursor is well past the threshold.
    let preview = session
        .drag_move(far, &[], t0 + Duration::from_millis(600))
        .unwrap();
    assert!(preview.broke_free);
    assert_eq!(preview.position, Position::new(4950.0, 4975.0));
    assert_eq!(preview.parent, None, "nothing to land on out there");

    assert!(session.drag_stop());
    let node = session.snap().node(c).unwrap();
    assert_eq!(node.parent, None);
    assert_eq!(node.extent, Extent::Free);
    assert_eq!(node.position, Position::new(4950.0, 4975.0));
}

#[test]
fn elapsed_time_alone_does_not_break_free() {
    let mut session = EditorSession::new();
    let (p, c) = clamped_pair(&mut session);
    let t0 = Instant::now();

    session.drag_start(c);
    session.drag_move(Position::new(5000.0, 5000.0), &[], t0);

    // Long hold, but the cursor came back within 100px of the node center.
    let preview = session
        .drag_move(Position::new(560.0, 380.0), &[], t0 + Duration::from_secs(2))
        .unwrap();
    assert!(!preview.broke_free);
    assert_eq!(preview.parent, Some(p));

    session.drag_stop();
    assert_eq!(session.snap().node(c).unwrap().parent, Some(p));
}

#[test]
fn free_drag_previews_and_commits_a_reparent() {
    let mut session = EditorSession::new();
    let a = topic(&mut session, "a", 0.0, 0.0);
    let t = NodeId::intern("t");
    session.store_mut().add_node(
        Node::new(t, NodeKind::Shape, Position::new(400.0, 0.0))
            .with_size(Size::new(300.0, 200.0)),
    );
    // A drop target must already be a parent to accept children.
    let k = topic(&mut session, "k", 420.0, 20.0);
    session
        .store_mut()
        .update_node(k, NodePatch::new().parent(ParentAssignment::Node(t)));

    let t0 = Instant::now();
    session.drag_start(a);
    let preview = session.drag_move(Position::new(500.0, 100.0), &[t], t0).unwrap();
    assert_eq!(preview.parent, Some(t), "overlapping a valid parent");

    assert!(session.drag_stop());
    let node = session.snap().node(a).unwrap();
    assert_eq!(node.parent, Some(t));
    assert_eq!(node.extent, Extent::Parent);

    session.undo();
    assert_eq!(session.snap().node(a).unwrap().parent, None);
}

#[test]
fn dragging_out_dissolves_the_stranded_container() {
    let mut session = EditorSession::new();
    let a = topic(&mut session, "a", 0.0, 0.0);
    let b = topic(&mut session, "b", 400.0, 0.0);
    session
        .connect(a, b, Some(Handle::Right), Some(Handle::Left))
        .unwrap();
    let container = session.snap().container_ancestor(a).map(|n| n.id).unwrap();

    // Drag a out past both resistance gates.
    let t0 = Instant::now();
    let far = Position::new(5000.0, 5000.0);
    session.drag_start(a);
    session.drag_move(far, &[], t0);
    let preview = session
        .drag_move(far, &[], t0 + Duration::from_millis(600))
        .unwrap();
    assert!(preview.broke_free);

    assert!(session.drag_stop());
    assert!(
        !session.snap().contains_node(container),
        "a one-child container never survives a committed move"
    );
    assert_eq!(session.snap().node(a).unwrap().parent, None);
    assert_eq!(
        session.snap().node(b).unwrap().parent,
        None,
        "the stranded member is hoisted out"
    );

    // Reparent and dissolution are one undo step.
    assert_eq!(session.undo().as_deref(), Some("move node"));
    assert_eq!(session.snap().node(a).unwrap().parent, Some(container));
    assert_eq!(session.snap().node(b).unwrap().parent, Some(container));
}

#[test]
fn undo_during_drag_cancels_the_gesture_first() {
    let mut session = EditorSession::new();
    let a = session
        .create_node(NodeKind::Text, Position::new(0.0, 0.0))
        .unwrap();

    session.drag_start(a);
    session.drag_move(Position::new(300.0, 300.0), &[], Instant::now());

    assert_eq!(session.undo().as_deref(), Some("create node"));
    assert_eq!(session.dragging(), None);
    assert!(!session.snap().contains_node(a));
}
