pub mod container;
pub mod graph;
pub mod id;
pub mod model;
pub mod registry;
pub mod reparent;
pub mod resistance;

pub use graph::{GraphSnapshot, GraphStore, NodePatch, NodeUpdate, ParentAssignment};
pub use id::{EdgeId, NodeId};
pub use model::*;
pub use registry::{NodeTemplate, TemplateRegistry};
pub use reparent::select_parent;
pub use resistance::{DragResistance, MIN_DRAG_TIME, RESISTANCE_THRESHOLD};
