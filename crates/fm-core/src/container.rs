//! Container consistency engine.
//!
//! Horizontal connections (handles drawn from `{left, right, none}`) express
//! sibling relationships, and every horizontally-connected group must live
//! under one shared `invisiblenode` container with `layout_direction = LR`.
//! The functions here decide when a connection change must create, extend,
//! merge, or dissolve such a container.
//!
//! All of them are pure: they read a snapshot and return a plan. The editor
//! applies plans inside a transaction, in the fixed order
//! *insert container → reparent children → remove dissolved containers*,
//! so the store never sees a parent reference to a container that does not
//! exist yet.

use crate::graph::{GraphSnapshot, ParentAssignment};
use crate::id::NodeId;
use crate::model::{Edge, Node, Position, Size};
use log::debug;
use smallvec::SmallVec;
use std::collections::HashSet;

/// Margin between a new container's border and its children's bounding box.
pub const CONTAINER_PADDING: f32 = 50.0;

/// A connection is horizontal unless either end uses a `top`/`bottom`
/// handle. An absent handle counts as horizontal-compatible.
pub fn is_horizontal(edge: &Edge) -> bool {
    !edge.source_handle.is_some_and(|h| h.is_vertical())
        && !edge.target_handle.is_some_and(|h| h.is_vertical())
}

/// One parent reassignment requested by a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reparent {
    pub node: NodeId,
    pub parent: ParentAssignment,
}

/// Result of `on_edge_created`: what must change for the new connection to
/// satisfy the shared-container invariant.
#[derive(Debug, Clone, Default)]
pub struct ConnectPlan {
    /// A container to insert before any reparenting happens.
    pub new_container: Option<Node>,
    pub reparent: SmallVec<[Reparent; 4]>,
    /// Containers emptied by a merge; removed last.
    pub remove_containers: SmallVec<[NodeId; 2]>,
}

impl ConnectPlan {
    pub fn is_empty(&self) -> bool {
        self.new_container.is_none() && self.reparent.is_empty() && self.remove_containers.is_empty()
    }
}

/// Result of `on_edge_removed` / the degenerate sweep: containers to
/// dissolve and the one-level-up reparents for their children.
#[derive(Debug, Clone, Default)]
pub struct DissolvePlan {
    pub reparent: SmallVec<[Reparent; 4]>,
    pub remove_containers: SmallVec<[NodeId; 2]>,
}

impl DissolvePlan {
    pub fn is_empty(&self) -> bool {
        self.remove_containers.is_empty()
    }
}

/// Decide the container consequences of a newly created edge.
///
/// Four-way split on the endpoints' nearest container ancestors:
/// neither → create one over both; exactly one → pull the loose endpoint
/// in; same → already consistent; different → merge, the **source** side
/// survives (fixed tie-break, asserted by downstream behavior).
pub fn on_edge_created(edge: &Edge, snap: &GraphSnapshot) -> ConnectPlan {
    let mut plan = ConnectPlan::default();
    if !is_horizontal(edge) {
        return plan;
    }
    let (Some(source), Some(target)) = (snap.node(edge.source), snap.node(edge.target)) else {
        debug!("edge {} has a dangling endpoint; no container action", edge.id);
        return plan;
    };
    if source.id == target.id {
        return plan;
    }

    let source_container = snap.container_ancestor(source.id).map(|n| n.id);
    let target_container = snap.container_ancestor(target.id).map(|n| n.id);

    match (source_container, target_container) {
        (None, None) => {
            let container = new_container_over(source, target);
            debug!(
                "creating container {} over {} and {}",
                container.id, source.id, target.id
            );
            plan.reparent.push(Reparent {
                node: source.id,
                parent: ParentAssignment::Node(container.id),
            });
            plan.reparent.push(Reparent {
                node: target.id,
                parent: ParentAssignment::Node(container.id),
            });
            plan.new_container = Some(container);
        }
        (Some(container), None) => {
            debug!("extending container {container} with {}", target.id);
            plan.reparent.push(Reparent {
                node: target.id,
                parent: ParentAssignment::Node(container),
            });
        }
        (None, Some(container)) => {
            debug!("extending container {container} with {}", source.id);
            plan.reparent.push(Reparent {
                node: source.id,
                parent: ParentAssignment::Node(container),
            });
        }
        (Some(survivor), Some(absorbed)) => {
            if survivor == absorbed {
                return plan; // already share a container
            }
            debug!("merging container {absorbed} into {survivor}");
            for child in snap.child_ids(absorbed) {
                plan.reparent.push(Reparent {
                    node: child,
                    parent: ParentAssignment::Node(survivor),
                });
            }
            plan.remove_containers.push(absorbed);
        }
    }
    plan
}

/// Decide whether removing `edge` leaves its container without any
/// remaining horizontal connection among its members; if so, dissolve it.
pub fn on_edge_removed(edge: &Edge, snap: &GraphSnapshot) -> DissolvePlan {
    let mut plan = DissolvePlan::default();
    if !is_horizontal(edge) {
        return plan;
    }
    let Some(container) = snap.container_ancestor(edge.source) else {
        return plan;
    };

    // The container stays as long as any other horizontal edge connects two
    // of its members (children plus the removed edge's endpoints).
    let mut members: HashSet<NodeId> = snap.child_ids(container.id).collect();
    members.insert(edge.source);
    members.insert(edge.target);

    let still_needed = snap.edges().iter().any(|e| {
        e.id != edge.id
            && is_horizontal(e)
            && members.contains(&e.source)
            && members.contains(&e.target)
    });
    if still_needed {
        return plan;
    }

    debug!("dissolving container {} (last horizontal edge removed)", container.id);
    dissolve_into(&mut plan, container, snap);
    plan
}

/// Sweep for containers left with fewer than two children — a container
/// has no meaning in that state and is dissolved, its remaining child (if
/// any) hoisted one level up. Run after node deletions.
pub fn degenerate_containers(snap: &GraphSnapshot) -> DissolvePlan {
    let mut plan = DissolvePlan::default();
    for node in snap.nodes() {
        if node.is_container() && snap.child_count(node.id) < 2 {
            debug!(
                "dissolving degenerate container {} ({} child(ren))",
                node.id,
                snap.child_count(node.id)
            );
            dissolve_into(&mut plan, node, snap);
        }
    }
    plan
}

fn dissolve_into(plan: &mut DissolvePlan, container: &Node, snap: &GraphSnapshot) {
    let hoist_target = match container.parent {
        Some(parent) => ParentAssignment::Node(parent),
        None => ParentAssignment::Root,
    };
    for child in snap.child_ids(container.id) {
        plan.reparent.push(Reparent {
            node: child,
            parent: hoist_target,
        });
    }
    plan.remove_containers.push(container.id);
}

fn new_container_over(a: &Node, b: &Node) -> Node {
    let bbox = a.rect().union(&b.rect());
    Node::container(
        NodeId::with_prefix("container"),
        Position::new(bbox.x - CONTAINER_PADDING, bbox.y - CONTAINER_PADDING),
        Size::new(
            bbox.width + 2.0 * CONTAINER_PADDING,
            bbox.height + 2.0 * CONTAINER_PADDING,
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphStore;
    use crate::model::{Handle, NodeKind};
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> NodeId {
        NodeId::intern(s)
    }

    fn horizontal_edge(eid: &str, source: &str, target: &str) -> Edge {
        Edge::new(id(eid), id(source), id(target))
            .with_handles(Some(Handle::Right), Some(Handle::Left))
    }

    #[test]
    fn classification() {
        let base = Edge::new(id("e"), id("a"), id("b"));
        assert!(is_horizontal(&base), "absent handles default to horizontal");
        assert!(is_horizontal(
            &base.clone().with_handles(Some(Handle::Right), Some(Handle::Left))
        ));
        assert!(is_horizontal(&base.clone().with_handles(Some(Handle::Left), None)));
        assert!(!is_horizontal(
            &base.clone().with_handles(Some(Handle::Top), Some(Handle::Bottom))
        ));
        assert!(!is_horizontal(&base.clone().with_handles(None, Some(Handle::Top))));
    }

    #[test]
    fn vertical_edge_is_noop() {
        let mut store = GraphStore::new();
        store.add_node(Node::new(id("a"), NodeKind::Text, Position::new(0.0, 0.0)));
        store.add_node(Node::new(id("b"), NodeKind::Text, Position::new(0.0, 200.0)));
        let edge = Edge::new(id("e"), id("a"), id("b"))
            .with_handles(Some(Handle::Bottom), Some(Handle::Top));
        assert!(on_edge_created(&edge, store.snap()).is_empty());
        assert!(on_edge_removed(&edge, store.snap()).is_empty());
    }

    #[test]
    fn dangling_endpoint_is_noop() {
        let mut store = GraphStore::new();
        store.add_node(Node::new(id("a"), NodeKind::Text, Position::new(0.0, 0.0)));
        let edge = horizontal_edge("e", "a", "ghost");
        assert!(on_edge_created(&edge, store.snap()).is_empty());
    }

    #[test]
    fn new_container_covers_endpoints_with_padding() {
        let a = Node::new(id("a"), NodeKind::Text, Position::new(100.0, 200.0));
        let b = Node::new(id("b"), NodeKind::Text, Position::new(400.0, 300.0));
        let container = new_container_over(&a, &b);

        assert_eq!(container.kind, NodeKind::Container);
        assert!(container.data.is_container);
        assert_eq!(container.position, Position::new(50.0, 150.0));
        // bbox spans 100..550 x 200..340 with default node size 150x40
        let size = container.size.unwrap();
        assert_eq!(size.width, 450.0 + 100.0);
        assert_eq!(size.height, 140.0 + 100.0);
    }

    #[test]
    fn same_container_is_noop() {
        let mut store = GraphStore::new();
        store.add_node(Node::container(id("c"), Position::new(0.0, 0.0), Size::new(500.0, 300.0)));
        let mut a = Node::new(id("a"), NodeKind::Text, Position::new(60.0, 60.0));
        a.parent = Some(id("c"));
        let mut b = Node::new(id("b"), NodeKind::Text, Position::new(260.0, 60.0));
        b.parent = Some(id("c"));
        store.add_node(a);
        store.add_node(b);

        let plan = on_edge_created(&horizontal_edge("e", "a", "b"), store.snap());
        assert!(plan.is_empty());
    }

    #[test]
    fn degenerate_sweep_hoists_last_child() {
        let mut store = GraphStore::new();
        store.add_node(Node::container(id("outer"), Position::new(0.0, 0.0), Size::new(900.0, 600.0)));
        let mut inner = Node::container(id("inner"), Position::new(50.0, 50.0), Size::new(400.0, 300.0));
        inner.parent = Some(id("outer"));
        store.add_node(inner);
        let mut lone = Node::new(id("lone"), NodeKind::Text, Position::new(100.0, 100.0));
        lone.parent = Some(id("inner"));
        store.add_node(lone);
        let mut peer = Node::new(id("peer"), NodeKind::Text, Position::new(500.0, 100.0));
        peer.parent = Some(id("outer"));
        store.add_node(peer);

        let plan = degenerate_containers(store.snap());
        // inner has one child → dissolved, its child hoisted into outer.
        // outer has two children (inner + peer) → kept.
        assert_eq!(plan.remove_containers.as_slice(), &[id("inner")]);
        assert_eq!(
            plan.reparent.as_slice(),
            &[Reparent {
                node: id("lone"),
                parent: ParentAssignment::Node(id("outer")),
            }]
        );
    }
}
