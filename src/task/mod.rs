// ABOUTME: Task module - lifecycle records for background agent invocations.
// ABOUTME: Provides Task, TaskId, TaskStatus, and the owning TaskRegistry.

mod registry;
mod types;

pub use registry::TaskRegistry;
pub use types::{Task, TaskId, TaskStatus};
