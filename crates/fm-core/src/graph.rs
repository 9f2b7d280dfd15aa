//! Canonical graph store with derived indices.
//!
//! `GraphStore` owns the node/edge collections plus the derived O(1)
//! indices (id → node arena, parent → children, source → outgoing edges).
//! Every mutator maintains the structural invariants before returning:
//!
//! - a set `parent` always resolves to an existing node,
//! - `parent_index` is the exact inverse of all `parent` assignments,
//! - no node is its own ancestor.
//!
//! Mutators are total: invalid input is logged and ignored, never panicked
//! on, so a bad event from the UI layer can not take down the session.
//! Collections are `Arc`-wrapped and copy-on-write, so taking a snapshot
//! is a handful of pointer bumps — that is what makes snapshot-based undo
//! and cheap re-render equality checks affordable.

use crate::id::{EdgeId, NodeId};
use crate::model::{Edge, Extent, GraphDoc, Node, NodeData, Position, Size};
use log::{debug, warn};
use smallvec::SmallVec;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

// ─── Snapshot ────────────────────────────────────────────────────────────

/// An immutable view of the graph at one revision.
///
/// Cloning is cheap (Arc bumps). Two snapshots with equal `revision` came
/// from the same committed state.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    nodes: Arc<HashMap<NodeId, Node>>,
    /// Insertion order, for deterministic iteration and serialization.
    order: Arc<Vec<NodeId>>,
    edges: Arc<Vec<Edge>>,
    /// parent id → ids of its children. Entries are dropped when the last
    /// child leaves, so key presence means "currently has children".
    parent_index: Arc<HashMap<NodeId, BTreeSet<NodeId>>>,
    /// source id → outgoing edge ids.
    edge_source: Arc<HashMap<NodeId, SmallVec<[EdgeId; 4]>>>,
    revision: u64,
}

impl GraphSnapshot {
    fn empty() -> Self {
        Self {
            nodes: Arc::new(HashMap::new()),
            order: Arc::new(Vec::new()),
            edges: Arc::new(Vec::new()),
            parent_index: Arc::new(HashMap::new()),
            edge_source: Arc::new(HashMap::new()),
            revision: 0,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Outgoing edges of `source`.
    pub fn edges_from(&self, source: NodeId) -> impl Iterator<Item = &Edge> {
        self.edge_source
            .get(&source)
            .into_iter()
            .flatten()
            .filter_map(|id| self.edge(*id))
    }

    /// Ids of the direct children of `id`, in stable order.
    pub fn child_ids(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.parent_index.get(&id).into_iter().flatten().copied()
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &Node> {
        self.child_ids(id).filter_map(|c| self.nodes.get(&c))
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.parent_index.get(&id).map_or(0, BTreeSet::len)
    }

    /// `true` if `id` currently has at least one child.
    pub fn is_parent(&self, id: NodeId) -> bool {
        self.parent_index.contains_key(&id)
    }

    /// Other children of `id`'s parent. Empty for top-level nodes.
    pub fn siblings(&self, id: NodeId) -> Vec<NodeId> {
        let Some(parent) = self.nodes.get(&id).and_then(|n| n.parent) else {
            return Vec::new();
        };
        self.child_ids(parent).filter(|c| *c != id).collect()
    }

    /// Nearest ancestor of container kind, walking the parent chain with a
    /// visited-set guard so a corrupted chain can never loop forever.
    pub fn container_ancestor(&self, id: NodeId) -> Option<&Node> {
        let mut seen = HashSet::new();
        let mut current = self.nodes.get(&id)?.parent;
        while let Some(pid) = current {
            if !seen.insert(pid) {
                warn!("parent chain of {id} revisits {pid}; aborting ancestor walk");
                return None;
            }
            let parent = self.nodes.get(&pid)?;
            if parent.is_container() {
                return Some(parent);
            }
            current = parent.parent;
        }
        None
    }

    /// `true` if `ancestor` appears on `descendant`'s parent chain.
    pub fn is_ancestor(&self, ancestor: NodeId, descendant: NodeId) -> bool {
        if ancestor == descendant {
            return false;
        }
        let mut seen = HashSet::new();
        let mut current = self.nodes.get(&descendant).and_then(|n| n.parent);
        while let Some(pid) = current {
            if pid == ancestor {
                return true;
            }
            if !seen.insert(pid) {
                return false;
            }
            current = self.nodes.get(&pid).and_then(|n| n.parent);
        }
        false
    }

    /// Extract the canonical arrays for persistence. Indices are never
    /// serialized; `rebuild_graph_indices` restores them on load.
    pub fn to_doc(&self) -> GraphDoc {
        GraphDoc {
            nodes: self.nodes().cloned().collect(),
            edges: self.edges.as_ref().clone(),
        }
    }
}

// ─── Update descriptors ──────────────────────────────────────────────────

/// Target of a parent change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentAssignment {
    /// Detach: the node becomes top-level.
    Root,
    Node(NodeId),
}

/// A partial node update; unset fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct NodePatch {
    pub position: Option<Position>,
    pub size: Option<Size>,
    pub extent: Option<Extent>,
    pub parent: Option<ParentAssignment>,
    pub data: Option<NodeData>,
}

impl NodePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    pub fn extent(mut self, extent: Extent) -> Self {
        self.extent = Some(extent);
        self
    }

    pub fn parent(mut self, parent: ParentAssignment) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn data(mut self, data: NodeData) -> Self {
        self.data = Some(data);
        self
    }
}

/// One entry of a batched `update_nodes` call.
#[derive(Debug, Clone)]
pub struct NodeUpdate {
    pub id: NodeId,
    pub patch: NodePatch,
}

impl NodeUpdate {
    pub fn new(id: NodeId, patch: NodePatch) -> Self {
        Self { id, patch }
    }

    /// Shorthand for the reparenting updates the consistency engine emits.
    pub fn reparent(id: NodeId, parent: ParentAssignment) -> Self {
        let extent = match parent {
            ParentAssignment::Root => Extent::Free,
            ParentAssignment::Node(_) => Extent::Parent,
        };
        Self::new(id, NodePatch::new().parent(parent).extent(extent))
    }
}

// ─── Store ───────────────────────────────────────────────────────────────

/// The mutable owner of the current graph snapshot.
#[derive(Debug, Clone)]
pub struct GraphStore {
    snap: GraphSnapshot,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    pub fn new() -> Self {
        Self {
            snap: GraphSnapshot::empty(),
        }
    }

    /// Borrow the current snapshot for reads.
    pub fn snap(&self) -> &GraphSnapshot {
        &self.snap
    }

    /// Take an owned snapshot (cheap; Arc clones only).
    pub fn snapshot(&self) -> GraphSnapshot {
        self.snap.clone()
    }

    pub fn revision(&self) -> u64 {
        self.snap.revision
    }

    /// Re-install a previously taken snapshot. Used by undo/redo.
    pub fn restore(&mut self, snapshot: GraphSnapshot) {
        self.snap = snapshot;
    }

    fn commit(&mut self) {
        self.snap.revision += 1;
    }

    // ─── Load path ───────────────────────────────────────────────────────

    /// Rebuild a store (arena + all derived indices) from the flat persisted
    /// arrays. Entries that would violate the structural invariants are
    /// dropped or repaired with a diagnostic instead of failing the load:
    /// duplicate node ids keep the first occurrence, dangling parents are
    /// detached, parent cycles are broken at the walk origin, and edges
    /// with unknown endpoints or duplicate ids are skipped.
    pub fn rebuild_graph_indices(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let mut store = Self::new();
        {
            let snap = &mut store.snap;
            let arena = Arc::make_mut(&mut snap.nodes);
            let order = Arc::make_mut(&mut snap.order);
            for node in nodes {
                if arena.contains_key(&node.id) {
                    warn!("duplicate node id {} on load; keeping first", node.id);
                    continue;
                }
                order.push(node.id);
                arena.insert(node.id, node);
            }

            // Detach dangling parents first so cycle walks see a clean arena.
            let dangling: Vec<NodeId> = arena
                .values()
                .filter(|n| n.parent.is_some_and(|p| !arena.contains_key(&p)))
                .map(|n| n.id)
                .collect();
            for id in dangling {
                warn!("node {id} references a missing parent on load; detaching");
                if let Some(node) = arena.get_mut(&id) {
                    node.parent = None;
                    node.extent = Extent::Free;
                }
            }

            // Break parent cycles at the node whose walk returns to itself.
            let ids: Vec<NodeId> = order.clone();
            for id in ids {
                let mut seen = HashSet::from([id]);
                let mut current = arena.get(&id).and_then(|n| n.parent);
                while let Some(pid) = current {
                    if !seen.insert(pid) {
                        warn!("parent cycle through {id} on load; detaching");
                        if let Some(node) = arena.get_mut(&id) {
                            node.parent = None;
                            node.extent = Extent::Free;
                        }
                        break;
                    }
                    current = arena.get(&pid).and_then(|n| n.parent);
                }
            }

            let parent_index = Arc::make_mut(&mut snap.parent_index);
            for node in arena.values() {
                if let Some(parent) = node.parent {
                    parent_index.entry(parent).or_default().insert(node.id);
                }
            }

            let edge_list = Arc::make_mut(&mut snap.edges);
            let edge_source = Arc::make_mut(&mut snap.edge_source);
            let mut edge_ids = HashSet::new();
            for edge in edges {
                if !arena.contains_key(&edge.source) || !arena.contains_key(&edge.target) {
                    warn!("edge {} has a dangling endpoint on load; skipping", edge.id);
                    continue;
                }
                if !edge_ids.insert(edge.id) {
                    warn!("duplicate edge id {} on load; skipping", edge.id);
                    continue;
                }
                edge_source.entry(edge.source).or_default().push(edge.id);
                edge_list.push(edge);
            }
        }
        store.commit();
        store
    }

    pub fn from_doc(doc: GraphDoc) -> Self {
        Self::rebuild_graph_indices(doc.nodes, doc.edges)
    }

    // ─── Node mutators ───────────────────────────────────────────────────

    /// Insert a node. Rejects duplicate ids and unresolvable parents.
    pub fn add_node(&mut self, node: Node) -> bool {
        if self.snap.nodes.contains_key(&node.id) {
            warn!("add_node: id {} already exists; ignoring", node.id);
            return false;
        }
        if let Some(parent) = node.parent {
            if parent == node.id || !self.snap.nodes.contains_key(&parent) {
                warn!("add_node: {} has invalid parent {parent}; ignoring", node.id);
                return false;
            }
        }
        let id = node.id;
        let parent = node.parent;
        Arc::make_mut(&mut self.snap.order).push(id);
        Arc::make_mut(&mut self.snap.nodes).insert(id, node);
        if let Some(parent) = parent {
            Arc::make_mut(&mut self.snap.parent_index)
                .entry(parent)
                .or_default()
                .insert(id);
        }
        self.commit();
        true
    }

    /// Apply a partial update to one node. Parent changes are validated
    /// against the cycle invariant before anything is touched.
    pub fn update_node(&mut self, id: NodeId, patch: NodePatch) -> bool {
        if self.apply_patch(id, &patch) {
            self.commit();
            true
        } else {
            false
        }
    }

    /// Apply a batch of partial updates as one revision step. Invalid
    /// entries are skipped individually; returns the number applied.
    pub fn update_nodes(&mut self, updates: &[NodeUpdate]) -> usize {
        let mut applied = 0;
        for update in updates {
            if self.apply_patch(update.id, &update.patch) {
                applied += 1;
            }
        }
        if applied > 0 {
            self.commit();
        }
        applied
    }

    fn apply_patch(&mut self, id: NodeId, patch: &NodePatch) -> bool {
        let Some(old_parent) = self.snap.nodes.get(&id).map(|n| n.parent) else {
            warn!("update_node: unknown node {id}; ignoring");
            return false;
        };

        let new_parent = match patch.parent {
            None => old_parent,
            Some(ParentAssignment::Root) => None,
            Some(ParentAssignment::Node(parent)) => {
                if parent == id {
                    warn!("update_node: {id} can not be its own parent; ignoring");
                    return false;
                }
                if !self.snap.nodes.contains_key(&parent) {
                    warn!("update_node: {id} references missing parent {parent}; ignoring");
                    return false;
                }
                // Reparenting under one's own descendant would close a cycle.
                if self.snap.is_ancestor(id, parent) {
                    warn!("update_node: parenting {id} under descendant {parent}; ignoring");
                    return false;
                }
                Some(parent)
            }
        };

        {
            let arena = Arc::make_mut(&mut self.snap.nodes);
            let Some(node) = arena.get_mut(&id) else {
                return false;
            };
            if let Some(position) = patch.position {
                node.position = position;
            }
            if let Some(size) = patch.size {
                node.size = Some(size);
            }
            if let Some(extent) = patch.extent {
                node.extent = extent;
            }
            if let Some(data) = &patch.data {
                node.data = data.clone();
            }
            node.parent = new_parent;
        }

        if new_parent != old_parent {
            let parent_index = Arc::make_mut(&mut self.snap.parent_index);
            if let Some(old) = old_parent {
                unlink_child(parent_index, old, id);
            }
            if let Some(new) = new_parent {
                parent_index.entry(new).or_default().insert(id);
            }
        }
        true
    }

    /// Remove a batch of nodes. Children that are not themselves removed
    /// are hoisted to the nearest surviving ancestor (or detached to root),
    /// and every edge touching a removed node is dropped with it.
    pub fn remove_nodes(&mut self, ids: &[NodeId]) -> usize {
        let removing: HashSet<NodeId> = ids
            .iter()
            .copied()
            .filter(|id| {
                let known = self.snap.nodes.contains_key(id);
                if !known {
                    warn!("remove_nodes: unknown node {id}; skipping");
                }
                known
            })
            .collect();
        if removing.is_empty() {
            return 0;
        }

        // Hoist targets must be resolved against the pre-removal arena.
        let mut hoists: Vec<(NodeId, Option<NodeId>)> = Vec::new();
        for id in &removing {
            for child in self.snap.child_ids(*id) {
                if removing.contains(&child) {
                    continue;
                }
                let mut target = self.snap.nodes.get(id).and_then(|n| n.parent);
                while let Some(t) = target {
                    if !removing.contains(&t) {
                        break;
                    }
                    target = self.snap.nodes.get(&t).and_then(|n| n.parent);
                }
                hoists.push((child, target));
            }
        }

        {
            let arena = Arc::make_mut(&mut self.snap.nodes);
            let parent_index = Arc::make_mut(&mut self.snap.parent_index);

            for (child, target) in hoists {
                if let Some(node) = arena.get_mut(&child) {
                    if let Some(old) = node.parent {
                        unlink_child(parent_index, old, child);
                    }
                    node.parent = target;
                    if let Some(t) = target {
                        parent_index.entry(t).or_default().insert(child);
                    } else {
                        node.extent = Extent::Free;
                    }
                }
            }

            for id in &removing {
                if let Some(node) = arena.remove(id) {
                    if let Some(parent) = node.parent {
                        unlink_child(parent_index, parent, *id);
                    }
                }
                parent_index.remove(id);
            }
            Arc::make_mut(&mut self.snap.order).retain(|id| !removing.contains(id));
        }

        let cascade: Vec<EdgeId> = self
            .snap
            .edges
            .iter()
            .filter(|e| removing.contains(&e.source) || removing.contains(&e.target))
            .map(|e| e.id)
            .collect();
        if !cascade.is_empty() {
            debug!("remove_nodes: cascading {} edge(s)", cascade.len());
            self.drop_edges(&cascade);
        }

        self.commit();
        removing.len()
    }

    // ─── Edge mutators ───────────────────────────────────────────────────

    /// Insert an edge. Rejects dangling endpoints, duplicate ids, and
    /// duplicate connections (same endpoints through the same handles).
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        if !self.snap.nodes.contains_key(&edge.source)
            || !self.snap.nodes.contains_key(&edge.target)
        {
            warn!("add_edge: {} has a dangling endpoint; ignoring", edge.id);
            return false;
        }
        if self.snap.edge(edge.id).is_some() {
            warn!("add_edge: id {} already exists; ignoring", edge.id);
            return false;
        }
        if self.snap.edges.iter().any(|e| e.same_connection(&edge)) {
            debug!(
                "add_edge: {} duplicates an existing connection {}→{}; ignoring",
                edge.id, edge.source, edge.target
            );
            return false;
        }
        Arc::make_mut(&mut self.snap.edge_source)
            .entry(edge.source)
            .or_default()
            .push(edge.id);
        Arc::make_mut(&mut self.snap.edges).push(edge);
        self.commit();
        true
    }

    /// Remove a batch of edges by id. Unknown ids are skipped.
    pub fn remove_edges(&mut self, ids: &[EdgeId]) -> usize {
        let removed = self.drop_edges(ids);
        if removed > 0 {
            self.commit();
        }
        removed
    }

    fn drop_edges(&mut self, ids: &[EdgeId]) -> usize {
        let targets: HashSet<EdgeId> = ids.iter().copied().collect();
        let before = self.snap.edges.len();
        let edges = Arc::make_mut(&mut self.snap.edges);
        let edge_source = Arc::make_mut(&mut self.snap.edge_source);
        edges.retain(|e| {
            if targets.contains(&e.id) {
                if let Some(list) = edge_source.get_mut(&e.source) {
                    list.retain(|id| *id != e.id);
                    if list.is_empty() {
                        edge_source.remove(&e.source);
                    }
                }
                false
            } else {
                true
            }
        });
        before - self.snap.edges.len()
    }
}

fn unlink_child(parent_index: &mut HashMap<NodeId, BTreeSet<NodeId>>, parent: NodeId, child: NodeId) {
    if let Some(children) = parent_index.get_mut(&parent) {
        children.remove(&child);
        if children.is_empty() {
            parent_index.remove(&parent);
        }
    }
}
