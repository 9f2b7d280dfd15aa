//! Core data model for FlowMap documents.
//!
//! The document is a flat pair of `{nodes, edges}` arrays. Hierarchy is
//! expressed through `Node::parent` — a weak back-reference resolved through
//! the store's indices, never an owning pointer. Synthetic container nodes
//! (`NodeKind::Container`) group horizontally-connected nodes; they are
//! created and dissolved by the consistency engine, never by the user.

use crate::id::{EdgeId, NodeId};
use serde::{Deserialize, Serialize};

// ─── Geometry ────────────────────────────────────────────────────────────

/// Canvas-absolute position of a node's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Fallback dimensions for nodes that have not been measured yet.
pub const DEFAULT_NODE_SIZE: Size = Size {
    width: 150.0,
    height: 40.0,
};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }

    pub fn center(&self) -> Position {
        Position::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Area of the AABB intersection with `other`, 0.0 when disjoint.
    pub fn overlap_area(&self, other: &Rect) -> f32 {
        let w = (self.x + self.width).min(other.x + other.width) - self.x.max(other.x);
        let h = (self.y + self.height).min(other.y + other.height) - self.y.max(other.y);
        if w > 0.0 && h > 0.0 { w * h } else { 0.0 }
    }

    /// Smallest rect covering both operands.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            width: (self.x + self.width).max(other.x + other.width) - x,
            height: (self.y + self.height).max(other.y + other.height) - y,
        }
    }
}

// ─── Connection handles ──────────────────────────────────────────────────

/// Which side of a node an edge attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handle {
    Left,
    Right,
    Top,
    Bottom,
}

impl Handle {
    /// `true` for `top`/`bottom` — the handles that express plain hierarchy
    /// rather than horizontal sibling grouping.
    pub fn is_vertical(&self) -> bool {
        matches!(self, Handle::Top | Handle::Bottom)
    }

    /// The facing handle on the other node of a connection.
    pub fn opposite(&self) -> Handle {
        match self {
            Handle::Left => Handle::Right,
            Handle::Right => Handle::Left,
            Handle::Top => Handle::Bottom,
            Handle::Bottom => Handle::Top,
        }
    }
}

// ─── Nodes ───────────────────────────────────────────────────────────────

/// Node type tag. `Container` is the synthetic `invisiblenode` variant —
/// never created by direct user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "textnode")]
    Text,
    #[serde(rename = "shapenode")]
    Shape,
    #[serde(rename = "invisiblenode")]
    Container,
}

/// Child-arrangement direction managed on container nodes.
/// `LR` is currently the only direction the consistency engine manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutDirection {
    LR,
    TB,
}

/// Whether a node is clamped to its parent's bounding extent while dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extent {
    /// Free-floating: may be dragged anywhere on the canvas.
    #[default]
    Free,
    /// Confined to the parent node's bounds until resistance breaks.
    Parent,
}

/// Opaque per-node payload. The consistency engine only reads
/// `is_container` and `layout_direction`; the rest rides along for the UI.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default)]
    pub is_container: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_direction: Option<LayoutDirection>,
    #[serde(default)]
    pub collapsed: bool,
}

/// A graph vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub position: Position,
    /// Measured dimensions; `None` falls back to `DEFAULT_NODE_SIZE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    /// Weak back-reference to the parent node. Resolved through the store's
    /// indices — never an embedded object reference.
    #[serde(default, rename = "parentId", skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub extent: Extent,
    #[serde(default)]
    pub data: NodeData,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind, position: Position) -> Self {
        Self {
            id,
            kind,
            position,
            size: None,
            parent: None,
            extent: Extent::Free,
            data: NodeData::default(),
        }
    }

    /// Build a synthetic container node over the given bounds.
    pub fn container(id: NodeId, position: Position, size: Size) -> Self {
        Self {
            id,
            kind: NodeKind::Container,
            position,
            size: Some(size),
            parent: None,
            extent: Extent::Free,
            data: NodeData {
                is_container: true,
                layout_direction: Some(LayoutDirection::LR),
                ..NodeData::default()
            },
        }
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.data.label = label.to_string();
        self
    }

    pub fn is_container(&self) -> bool {
        self.kind == NodeKind::Container
    }

    /// Effective bounding box, using the default size when unmeasured.
    pub fn rect(&self) -> Rect {
        let size = self.size.unwrap_or(DEFAULT_NODE_SIZE);
        Rect {
            x: self.position.x,
            y: self.position.y,
            width: size.width,
            height: size.height,
        }
    }
}

// ─── Edges ───────────────────────────────────────────────────────────────

/// A directed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<Handle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<Handle>,
}

impl Edge {
    pub fn new(id: EdgeId, source: NodeId, target: NodeId) -> Self {
        Self {
            id,
            source,
            target,
            source_handle: None,
            target_handle: None,
        }
    }

    pub fn with_handles(mut self, source: Option<Handle>, target: Option<Handle>) -> Self {
        self.source_handle = source;
        self.target_handle = target;
        self
    }

    /// Two edges are duplicates when they connect the same endpoints
    /// through the same handles, regardless of ID.
    pub fn same_connection(&self, other: &Edge) -> bool {
        self.source == other.source
            && self.target == other.target
            && self.source_handle == other.source_handle
            && self.target_handle == other.target_handle
    }
}

// ─── Persistence document ────────────────────────────────────────────────

/// The JSON-serializable persisted state: the canonical arrays only.
/// Derived indices are rebuilt on load via `GraphStore::rebuild_graph_indices`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDoc {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphDoc {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rect_overlap_area() {
        let a = Rect {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
        };
        let b = Rect {
            x: 50.0,
            y: 50.0,
            width: 100.0,
            height: 100.0,
        };
        assert_eq!(a.overlap_area(&b), 2500.0);

        let far = Rect {
            x: 500.0,
            y: 500.0,
            width: 10.0,
            height: 10.0,
        };
        assert_eq!(a.overlap_area(&far), 0.0);
    }

    #[test]
    fn rect_union_covers_both() {
        let a = Rect {
            x: 10.0,
            y: 20.0,
            width: 30.0,
            height: 30.0,
        };
        let b = Rect {
            x: 100.0,
            y: 0.0,
            width: 50.0,
            height: 10.0,
        };
        let u = a.union(&b);
        assert_eq!(u.x, 10.0);
        assert_eq!(u.y, 0.0);
        assert_eq!(u.width, 140.0);
        assert_eq!(u.height, 50.0);
    }

    #[test]
    fn node_json_wire_tags() {
        let node = Node::container(
            NodeId::intern("container_0"),
            Position::new(1.0, 2.0),
            Size::new(300.0, 200.0),
        );
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains("\"type\":\"invisiblenode\""));
        assert!(json.contains("\"isContainer\":true"));
        assert!(json.contains("\"layoutDirection\":\"LR\""));

        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn edge_json_handles() {
        let edge = Edge::new(
            NodeId::intern("e1"),
            NodeId::intern("a"),
            NodeId::intern("b"),
        )
        .with_handles(Some(Handle::Right), Some(Handle::Left));
        let json = serde_json::to_string(&edge).unwrap();
        assert!(json.contains("\"sourceHandle\":\"right\""));
        assert!(json.contains("\"targetHandle\":\"left\""));
    }

    #[test]
    fn doc_roundtrip() {
        let doc = GraphDoc {
            nodes: vec![
                Node::new(
                    NodeId::intern("a"),
                    NodeKind::Text,
                    Position::new(0.0, 0.0),
                )
                .with_label("root topic"),
            ],
            edges: vec![],
        };
        let json = doc.to_json().unwrap();
        let back = GraphDoc::from_json(&json).unwrap();
        assert_eq!(back.nodes, doc.nodes);
    }
}
