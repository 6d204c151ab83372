pub mod diff;
pub mod frame_path;

pub use diff::{Change, ChangeId, DiffRecord, NodePath, PropsDiff};
pub use frame_path::{FramePath, InvalidFramePath, Segment};
