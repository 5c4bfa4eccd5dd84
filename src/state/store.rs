// ABOUTME: Flat-file store for workflow, session, and project state.
// ABOUTME: Single-writer, last-write-wins JSON document under the project directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::warn;

use super::types::{
    ActiveWorkflow, ProjectState, ProjectStats, ResumePoint, SessionState, STATE_VERSION,
    WorkflowState, WorkflowStatus, WorkflowTask,
};
use crate::error::StateError;

/// Directory under the project root holding all state.
pub const STATE_DIR: &str = ".undertow";
/// State document inside [`STATE_DIR`].
pub const STATE_FILE: &str = "state.json";
/// Workflow definitions inside [`STATE_DIR`].
pub const WORKFLOWS_DIR: &str = "workflows";

/// Reads and writes the project's state file.
///
/// Every operation re-reads the file, applies its change, and writes the
/// whole document back. There is no locking; concurrent writers race and
/// the last write wins.
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    /// Create a store for the project rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join(STATE_DIR).join(STATE_FILE)
    }

    pub fn workflows_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR).join(WORKFLOWS_DIR)
    }

    /// Read the state file. Returns `Ok(None)` if it does not exist.
    pub fn read(&self) -> Result<Option<ProjectState>, StateError> {
        let path = self.state_path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let state: ProjectState = serde_json::from_str(&contents).map_err(|e| {
            warn!(
                target: "undertow::state",
                path = %path.display(),
                error = %e,
                "unreadable state file"
            );
            e
        })?;

        if state.version != STATE_VERSION {
            warn!(
                target: "undertow::state",
                found = %state.version,
                expected = STATE_VERSION,
                "state file version mismatch"
            );
        }

        Ok(Some(state))
    }

    /// Write the state file, stamping `last_updated`.
    ///
    /// The document is written to a temporary file in the state directory
    /// and renamed over the old one, so readers never see a partial write.
    pub fn write(&self, state: &mut ProjectState) -> Result<(), StateError> {
        let dir = self.root.join(STATE_DIR);
        fs::create_dir_all(&dir)?;

        state.last_updated = Utc::now();
        let mut file = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut file, state)?;
        file.as_file().sync_all()?;
        file.persist(self.state_path()).map_err(|e| e.error)?;
        Ok(())
    }

    /// Create and persist fresh state, replacing any existing file.
    pub fn create(&self, project_name: impl Into<String>) -> Result<ProjectState, StateError> {
        let mut state = ProjectState::new(self.root.display().to_string(), project_name);
        self.write(&mut state)?;
        Ok(state)
    }

    /// Read existing state, touching `last_opened_at`, or create it.
    pub fn get_or_create(
        &self,
        project_name: impl Into<String>,
    ) -> Result<ProjectState, StateError> {
        match self.read()? {
            Some(mut state) => {
                state.project.last_opened_at = Utc::now();
                self.write(&mut state)?;
                Ok(state)
            }
            None => self.create(project_name),
        }
    }

    /// Delete the state file if present.
    pub fn clear(&self) -> Result<(), StateError> {
        match fs::remove_file(self.state_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn load(&self) -> Result<ProjectState, StateError> {
        self.read()?
            .ok_or_else(|| StateError::NotInitialized(self.state_path()))
    }

    /// Apply `change` and persist if it reports a modification.
    fn modify<F>(&self, change: F) -> Result<bool, StateError>
    where
        F: FnOnce(&mut ProjectState) -> bool,
    {
        let mut state = self.load()?;
        if !change(&mut state) {
            return Ok(false);
        }
        self.write(&mut state)?;
        Ok(true)
    }

    pub fn set_active_workflow(
        &self,
        workflow_id: impl Into<String>,
        task_id: impl Into<String>,
    ) -> Result<(), StateError> {
        let now = Utc::now();
        let active = ActiveWorkflow {
            workflow_id: workflow_id.into(),
            current_task_id: task_id.into(),
            started_at: now,
            last_activity_at: now,
        };
        self.modify(|state| {
            state.active_workflow = Some(active);
            true
        })?;
        Ok(())
    }

    /// The active workflow pointer, if one is set.
    pub fn get_active_workflow(&self) -> Result<Option<ActiveWorkflow>, StateError> {
        Ok(self.read()?.and_then(|state| state.active_workflow))
    }

    pub fn clear_active_workflow(&self) -> Result<(), StateError> {
        self.modify(|state| {
            state.active_workflow = None;
            true
        })?;
        Ok(())
    }

    /// Insert or replace a workflow.
    pub fn add_workflow(&self, workflow: WorkflowState) -> Result<(), StateError> {
        self.modify(|state| {
            state.workflows.insert(workflow.id.clone(), workflow);
            sync_project_counts(state);
            true
        })?;
        Ok(())
    }

    /// Update a workflow in place, stamping `updated_at`, and `completed_at`
    /// the first time it is marked completed.
    ///
    /// Returns false if the workflow does not exist.
    pub fn update_workflow<F>(&self, workflow_id: &str, update: F) -> Result<bool, StateError>
    where
        F: FnOnce(&mut WorkflowState),
    {
        self.modify(|state| {
            let Some(workflow) = state.workflows.get_mut(workflow_id) else {
                return false;
            };
            update(workflow);
            workflow.updated_at = Utc::now();
            if workflow.status == WorkflowStatus::Completed && workflow.completed_at.is_none() {
                workflow.completed_at = Some(workflow.updated_at);
            }
            sync_project_counts(state);
            true
        })
    }

    /// Update one task of a workflow, stamping the workflow's `updated_at`.
    pub fn update_workflow_task<F>(
        &self,
        workflow_id: &str,
        task_id: &str,
        update: F,
    ) -> Result<bool, StateError>
    where
        F: FnOnce(&mut WorkflowTask),
    {
        self.modify(|state| {
            let Some(workflow) = state.workflows.get_mut(workflow_id) else {
                return false;
            };
            let Some(task) = workflow.tasks.get_mut(task_id) else {
                return false;
            };
            update(task);
            workflow.updated_at = Utc::now();
            true
        })
    }

    pub fn get_workflow(&self, workflow_id: &str) -> Result<Option<WorkflowState>, StateError> {
        Ok(self
            .read()?
            .and_then(|mut state| state.workflows.remove(workflow_id)))
    }

    pub fn list_workflows(&self) -> Result<Vec<WorkflowState>, StateError> {
        Ok(self
            .read()?
            .map(|state| state.workflows.into_values().collect())
            .unwrap_or_default())
    }

    /// Insert or replace a session.
    pub fn add_session(&self, session: SessionState) -> Result<(), StateError> {
        self.modify(|state| {
            state.sessions.insert(session.id.clone(), session);
            true
        })?;
        Ok(())
    }

    /// Update a session in place, stamping `last_activity_at`.
    pub fn update_session<F>(&self, session_id: &str, update: F) -> Result<bool, StateError>
    where
        F: FnOnce(&mut SessionState),
    {
        self.modify(|state| {
            let Some(session) = state.sessions.get_mut(session_id) else {
                return false;
            };
            update(session);
            session.last_activity_at = Utc::now();
            true
        })
    }

    pub fn increment_session_messages(&self, session_id: &str) -> Result<bool, StateError> {
        self.update_session(session_id, |session| session.messages += 1)
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionState>, StateError> {
        Ok(self
            .read()?
            .and_then(|mut state| state.sessions.remove(session_id)))
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionState>, StateError> {
        Ok(self
            .read()?
            .map(|state| state.sessions.into_values().collect())
            .unwrap_or_default())
    }

    /// Counts over the current state; all zero if uninitialized.
    pub fn project_stats(&self) -> Result<ProjectStats, StateError> {
        let Some(state) = self.read()? else {
            return Ok(ProjectStats::default());
        };

        let count = |status: WorkflowStatus| {
            state
                .workflows
                .values()
                .filter(|w| w.status == status)
                .count()
        };

        Ok(ProjectStats {
            total_workflows: state.workflows.len(),
            completed_workflows: count(WorkflowStatus::Completed),
            active_workflows: count(WorkflowStatus::InProgress),
            total_sessions: state.sessions.len(),
        })
    }

    /// Workflow definition files (`.json` or `.md`), sorted by path.
    pub fn find_workflow_files(&self) -> Result<Vec<PathBuf>, StateError> {
        let entries = match fs::read_dir(self.workflows_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_workflow = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "json" || ext == "md");
            if is_workflow && path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// The workflow and, if it is the active one, its current task.
    pub fn resume_workflow(&self, workflow_id: &str) -> Result<Option<ResumePoint>, StateError> {
        let Some(mut state) = self.read()? else {
            return Ok(None);
        };
        let Some(workflow) = state.workflows.remove(workflow_id) else {
            return Ok(None);
        };

        let current_task = state
            .active_workflow
            .filter(|active| active.workflow_id == workflow_id)
            .and_then(|active| workflow.tasks.get(&active.current_task_id).cloned());

        Ok(Some(ResumePoint {
            workflow,
            current_task,
        }))
    }
}

fn sync_project_counts(state: &mut ProjectState) {
    state.project.total_workflows = state.workflows.len();
    state.project.completed_workflows = state
        .workflows
        .values()
        .filter(|w| w.status == WorkflowStatus::Completed)
        .count();
}
