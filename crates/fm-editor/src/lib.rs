pub mod gesture;
pub mod history;
pub mod session;

pub use gesture::{DragGesture, DragPreview};
pub use history::History;
pub use session::EditorSession;
