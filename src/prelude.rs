// ABOUTME: Prelude module - convenient imports for common use cases.
// ABOUTME: Use `use undertow::prelude::*;` to get started quickly.

pub use crate::config::{AgentOverride, Config};
pub use crate::coordinator::{
    ConcurrencyConfig, ConcurrencyLimit, ConcurrencyLimiter, DEFAULT_CONCURRENCY, ResourceKey,
};
pub use crate::error::{Cancelled, ConfigError, StateError, UndertowError};
pub use crate::manager::{AgentRunner, BackgroundManager};
pub use crate::persona::{Persona, PersonaRegistry};
pub use crate::state::{ProjectStats, SessionState, StateStore, WorkflowState, WorkflowStatus};
pub use crate::task::{Task, TaskId, TaskRegistry, TaskStatus};
