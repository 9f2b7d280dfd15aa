//! Editor session: the event surface the UI layer talks to.
//!
//! One `EditorSession` lives for the lifetime of an open document. Every
//! UI event (connect, drag-to-create, edge removal, delete) is translated
//! into store mutations and committed inside exactly one transaction, with
//! the container consistency plans applied in the fixed order
//! *insert container → add edge → reparent → remove dissolved containers*.

use crate::gesture::DragGesture;
use crate::history::History;
use fm_core::container::{self, ConnectPlan, DissolvePlan};
use fm_core::graph::{GraphSnapshot, GraphStore, NodeUpdate};
use fm_core::id::{EdgeId, NodeId};
use fm_core::model::{Edge, GraphDoc, Handle, NodeKind, Position};
use fm_core::registry::TemplateRegistry;
use fm_core::resistance::DragResistance;
use log::{debug, warn};

/// Undo depth kept per session.
const MAX_UNDO_DEPTH: usize = 100;

/// Long-lived editor state: canonical store, history, drag machinery.
pub struct EditorSession {
    pub(crate) store: GraphStore,
    pub(crate) history: History,
    pub(crate) resistance: DragResistance,
    registry: TemplateRegistry,
    pub(crate) drag: Option<DragGesture>,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSession {
    pub fn new() -> Self {
        Self {
            store: GraphStore::new(),
            history: History::new(MAX_UNDO_DEPTH),
            resistance: DragResistance::new(),
            registry: TemplateRegistry::with_defaults(),
            drag: None,
        }
    }

    /// Open a persisted document. Indices are rebuilt from the flat arrays.
    pub fn from_doc(doc: GraphDoc) -> Self {
        let mut session = Self::new();
        session.store = GraphStore::from_doc(doc);
        session
    }

    /// Current graph snapshot (what the renderer reads).
    pub fn snap(&self) -> &GraphSnapshot {
        self.store.snap()
    }

    /// Direct store access for collaborators outside the event surface —
    /// the auto-layout engine writes its computed positions through here.
    pub fn store_mut(&mut self) -> &mut GraphStore {
        &mut self.store
    }

    pub fn registry_mut(&mut self) -> &mut TemplateRegistry {
        &mut self.registry
    }

    // ─── Node creation ───────────────────────────────────────────────────

    /// Spawn a node of `kind` at `position` (toolbar / double-click).
    pub fn create_node(&mut self, kind: NodeKind, position: Position) -> Option<NodeId> {
        let Some(template) = self.registry.resolve(kind) else {
            warn!("create_node: no template registered for {kind:?}");
            return None;
        };
        let node = template.instantiate(position);
        let id = node.id;
        self.history.begin(&self.store, "create node");
        let added = self.store.add_node(node);
        self.history.end(&self.store);
        added.then_some(id)
    }

    // ─── Connections ─────────────────────────────────────────────────────

    /// Connect two existing nodes. Returns the new edge's id, or `None`
    /// when the connection is invalid or already present.
    pub fn connect(
        &mut self,
        source: NodeId,
        target: NodeId,
        source_handle: Option<Handle>,
        target_handle: Option<Handle>,
    ) -> Option<EdgeId> {
        if source == target {
            debug!("connect: self-connection on {source}; ignoring");
            return None;
        }
        if !self.store.snap().contains_node(source) || !self.store.snap().contains_node(target) {
            warn!("connect: unknown endpoint {source}→{target}; ignoring");
            return None;
        }
        let edge = Edge::new(NodeId::with_prefix("edge"), source, target)
            .with_handles(source_handle, target_handle);
        if self.store.snap().edges().iter().any(|e| e.same_connection(&edge)) {
            debug!("connect: {source}→{target} already connected; ignoring");
            return None;
        }

        let edge_id = edge.id;
        let plan = container::on_edge_created(&edge, self.store.snap());
        self.history.begin(&self.store, "connect");
        let added = apply_connect_plan(&mut self.store, edge, plan);
        self.history.end(&self.store);
        added.then_some(edge_id)
    }

    /// Connect gesture released over empty canvas: spawn a node of `kind`
    /// there and connect to it. One undo step for both.
    pub fn connect_end(
        &mut self,
        source: NodeId,
        source_handle: Option<Handle>,
        kind: NodeKind,
        position: Position,
    ) -> Option<NodeId> {
        if !self.store.snap().contains_node(source) {
            warn!("connect_end: unknown source {source}; ignoring");
            return None;
        }
        self.history.begin(&self.store, "create connected node");
        let created = self.create_node(kind, position);
        if let Some(node) = created {
            self.connect(source, node, source_handle, source_handle.map(|h| h.opposite()));
        }
        self.history.end(&self.store);
        created
    }

    /// Remove edges and dissolve any container left without a horizontal
    /// connection among its members.
    pub fn remove_edges(&mut self, ids: &[EdgeId]) {
        self.history.begin(&self.store, "remove edge");
        for edge_id in ids {
            let Some(edge) = self.store.snap().edge(*edge_id).cloned() else {
                warn!("remove_edges: unknown edge {edge_id}; skipping");
                continue;
            };
            let plan = container::on_edge_removed(&edge, self.store.snap());
            self.store.remove_edges(&[edge.id]);
            apply_dissolve_plan(&mut self.store, plan);
        }
        self.history.end(&self.store);
    }

    // ─── Deletion ────────────────────────────────────────────────────────

    /// Delete nodes (edges cascade), then sweep containers left degenerate.
    pub fn delete_nodes(&mut self, ids: &[NodeId]) {
        self.history.begin(&self.store, "delete");
        self.store.remove_nodes(ids);
        self.sweep_degenerate_containers();
        self.history.end(&self.store);
    }

    /// Dissolve every container left with fewer than two children. Runs
    /// inside the caller's open transaction, after deletions and after
    /// drag reparents that pull a member out of its container.
    ///
    /// Dissolving one container can strand another (nested chains), so
    /// sweep until a fixed point; each pass removes at least one node.
    pub(crate) fn sweep_degenerate_containers(&mut self) {
        loop {
            let plan = container::degenerate_containers(self.store.snap());
            if plan.is_empty() {
                break;
            }
            apply_dissolve_plan(&mut self.store, plan);
        }
    }

    // ─── History passthroughs ────────────────────────────────────────────

    pub fn undo(&mut self) -> Option<String> {
        if self.drag.is_some() {
            self.drag_cancel();
        }
        self.history.undo(&mut self.store)
    }

    pub fn redo(&mut self) -> Option<String> {
        if self.drag.is_some() {
            self.drag_cancel();
        }
        self.history.redo(&mut self.store)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Drop all transient per-session state (drag, timers). The store and
    /// history survive; used on document switch and in tests.
    pub fn teardown_transient(&mut self) {
        self.drag = None;
        self.resistance.reset();
    }
}

/// Apply a connect plan in invariant-safe order.
fn apply_connect_plan(store: &mut GraphStore, edge: Edge, plan: ConnectPlan) -> bool {
    if let Some(container) = plan.new_container {
        store.add_node(container);
    }
    let added = store.add_edge(edge);
    let updates: Vec<NodeUpdate> = plan
        .reparent
        .iter()
        .map(|r| NodeUpdate::reparent(r.node, r.parent))
        .collect();
    store.update_nodes(&updates);
    if !plan.remove_containers.is_empty() {
        store.remove_nodes(&plan.remove_containers);
    }
    added
}

/// Apply a dissolve plan: children first, container removal last.
fn apply_dissolve_plan(store: &mut GraphStore, plan: DissolvePlan) {
    let updates: Vec<NodeUpdate> = plan
        .reparent
        .iter()
        .map(|r| NodeUpdate::reparent(r.node, r.parent))
        .collect();
    store.update_nodes(&updates);
    if !plan.remove_containers.is_empty() {
        store.remove_nodes(&plan.remove_containers);
    }
}
