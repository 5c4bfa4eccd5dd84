// ABOUTME: Persisted state shapes for workflows, sessions, and the project.
// ABOUTME: Serialized as camelCase JSON in the state file.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version written to new state files.
pub const STATE_VERSION: &str = "1.0.0";

/// Root document of the state file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectState {
    pub version: String,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_workflow: Option<ActiveWorkflow>,
    #[serde(default)]
    pub workflows: BTreeMap<String, WorkflowState>,
    #[serde(default)]
    pub sessions: BTreeMap<String, SessionState>,
    pub project: ProjectInfo,
}

impl ProjectState {
    /// Fresh state for a project rooted at `path`.
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            version: STATE_VERSION.to_string(),
            last_updated: now,
            active_workflow: None,
            workflows: BTreeMap::new(),
            sessions: BTreeMap::new(),
            project: ProjectInfo {
                name: name.into(),
                path: path.into(),
                created_at: now,
                last_opened_at: now,
                total_workflows: 0,
                completed_workflows: 0,
            },
        }
    }
}

/// The workflow currently being worked on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveWorkflow {
    pub workflow_id: String,
    pub current_task_id: String,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    InProgress,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub id: String,
    pub name: String,
    pub description: String,
    pub file_path: String,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tasks: BTreeMap<String, WorkflowTask>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl WorkflowState {
    /// A pending workflow with the given tasks.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        file_path: impl Into<String>,
        tasks: impl IntoIterator<Item = WorkflowTask>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            file_path: file_path.into(),
            status: WorkflowStatus::Pending,
            created_at: now,
            updated_at: now,
            completed_at: None,
            tasks: tasks
                .into_iter()
                .map(|task| (task.id.clone(), task))
                .collect(),
            metadata: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowTaskStatus {
    Pending,
    InProgress,
    Waiting,
    Completed,
    Failed,
    Cancelled,
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

/// One step of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTask {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: WorkflowTaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<WorkflowTaskResult>,
}

impl WorkflowTask {
    /// A pending, medium-priority task with no dependencies.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            status: WorkflowTaskStatus::Pending,
            priority: Priority::Medium,
            dependencies: Vec::new(),
            assigned_agent: None,
            started_at: None,
            completed_at: None,
            metadata: BTreeMap::new(),
            results: None,
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn depends_on(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTaskResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_modified: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// A host chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub id: String,
    pub agent: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub messages: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
}

impl SessionState {
    pub fn new(id: impl Into<String>, agent: impl Into<String>, model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            agent: agent.into(),
            model: model.into(),
            started_at: now,
            last_activity_at: now,
            messages: 0,
            tokens_used: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub name: String,
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub last_opened_at: DateTime<Utc>,
    pub total_workflows: usize,
    pub completed_workflows: usize,
}

/// Summary counts over the state file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectStats {
    pub total_workflows: usize,
    pub completed_workflows: usize,
    pub active_workflows: usize,
    pub total_sessions: usize,
}

/// Where to pick a workflow back up.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumePoint {
    pub workflow: WorkflowState,
    /// The active task, if the workflow is the active one.
    pub current_task: Option<WorkflowTask>,
}
