// ABOUTME: State module - flat-file persistence for workflow and session records.
// ABOUTME: Independent of the scheduler; tracks project progress across host sessions.

mod store;
mod types;

pub use store::{STATE_DIR, STATE_FILE, StateStore, WORKFLOWS_DIR};
pub use types::{
    ActiveWorkflow, Priority, ProjectInfo, ProjectState, ProjectStats, ResumePoint,
    STATE_VERSION, SessionState, WorkflowState, WorkflowStatus, WorkflowTask,
    WorkflowTaskResult, WorkflowTaskStatus,
};
