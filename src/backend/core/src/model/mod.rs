//! Todo domain model: items, the task-keyed map and the merge function.

pub mod merge;
pub mod todo;

pub use merge::merge;
pub use todo::{StoreMap, TodoItem};
