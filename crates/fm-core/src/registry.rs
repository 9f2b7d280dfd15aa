//! Node-template registry.
//!
//! A plain keyed table mapping a node kind to the descriptor used when the
//! editor spawns that kind — no reflection, no global state. The
//! drag-to-create path (connect ending on empty canvas) resolves its
//! template here.

use crate::id::NodeId;
use crate::model::{DEFAULT_NODE_SIZE, Node, NodeData, NodeKind, Position, Size};
use std::collections::HashMap;

/// Descriptor for spawning one node kind.
#[derive(Debug, Clone)]
pub struct NodeTemplate {
    pub kind: NodeKind,
    pub default_size: Size,
    pub data: NodeData,
    /// Prefix for generated ids (`topic_7`, `shape_12`, ...).
    pub id_prefix: &'static str,
}

impl NodeTemplate {
    /// Instantiate a fresh node at `position` with a generated id.
    pub fn instantiate(&self, position: Position) -> Node {
        let mut node = Node::new(NodeId::with_prefix(self.id_prefix), self.kind, position);
        node.size = Some(self.default_size);
        node.data = self.data.clone();
        node
    }
}

/// Kind-keyed template table.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: HashMap<NodeKind, NodeTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-seeded with the ordinary user-creatable kinds.
    /// Containers are deliberately absent: only the consistency engine
    /// creates those.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(NodeTemplate {
            kind: NodeKind::Text,
            default_size: DEFAULT_NODE_SIZE,
            data: NodeData::default(),
            id_prefix: "topic",
        });
        registry.register(NodeTemplate {
            kind: NodeKind::Shape,
            default_size: Size::new(120.0, 120.0),
            data: NodeData::default(),
            id_prefix: "shape",
        });
        registry
    }

    /// Register (or replace) the template for a kind.
    pub fn register(&mut self, template: NodeTemplate) {
        self.templates.insert(template.kind, template);
    }

    pub fn resolve(&self, kind: NodeKind) -> Option<&NodeTemplate> {
        self.templates.get(&kind)
    }
}
