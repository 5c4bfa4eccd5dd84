// ABOUTME: Task registry - creates and transitions background task records.
// ABOUTME: Enforces the Pending -> Running -> Completed/Failed state machine.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use super::types::{Task, TaskId, TaskStatus};

#[derive(Default)]
struct RegistryInner {
    /// Tasks in creation order. Never removed.
    tasks: Vec<Task>,
    /// Index into `tasks` by id.
    by_id: HashMap<TaskId, usize>,
}

/// Owns every [`Task`] record for the life of the process.
///
/// Callers only ever receive clones. Transitions that do not apply to the
/// task's current state are rejected with `false` and change nothing.
#[derive(Default)]
pub struct TaskRegistry {
    inner: RwLock<RegistryInner>,
}

impl TaskRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a task in `Pending` state.
    pub fn create_task(&self, agent: impl Into<String>) -> Task {
        let task = Task::new(agent);

        let mut inner = self.inner.write();
        let index = inner.tasks.len();
        inner.by_id.insert(task.id.clone(), index);
        inner.tasks.push(task.clone());

        debug!(target: "undertow::task", task_id = %task.id, agent = %task.agent, "task created");
        task
    }

    /// Move a `Pending` task to `Running`.
    ///
    /// Returns false if the task is unknown or has already started.
    pub fn start_task(&self, id: &TaskId) -> bool {
        self.transition(id, TaskStatus::Pending, |task| {
            task.status = TaskStatus::Running;
            task.started_at = Some(Utc::now());
        })
    }

    /// Move a `Running` task to `Completed` with its result.
    pub fn complete_task(&self, id: &TaskId, result: impl Into<String>) -> bool {
        let result = result.into();
        self.transition(id, TaskStatus::Running, |task| {
            task.status = TaskStatus::Completed;
            task.completed_at = Some(Utc::now());
            task.result = Some(result);
        })
    }

    /// Move a `Running` task to `Failed` with its error.
    pub fn fail_task(&self, id: &TaskId, error: impl Into<String>) -> bool {
        let error = error.into();
        self.transition(id, TaskStatus::Running, |task| {
            task.status = TaskStatus::Failed;
            task.completed_at = Some(Utc::now());
            task.error = Some(error);
        })
    }

    fn transition<F>(&self, id: &TaskId, required: TaskStatus, apply: F) -> bool
    where
        F: FnOnce(&mut Task),
    {
        let mut inner = self.inner.write();
        let RegistryInner { tasks, by_id } = &mut *inner;

        let Some(task) = by_id.get(id).and_then(|&index| tasks.get_mut(index)) else {
            debug!(target: "undertow::task", task_id = %id, "transition on unknown task");
            return false;
        };

        if task.status != required {
            debug!(
                target: "undertow::task",
                task_id = %id,
                status = %task.status,
                required = %required,
                "transition rejected"
            );
            return false;
        }

        apply(task);
        debug!(target: "undertow::task", task_id = %id, status = %task.status, "task transitioned");
        true
    }

    /// Get a snapshot of a task.
    pub fn get_task(&self, id: &TaskId) -> Option<Task> {
        let inner = self.inner.read();
        inner
            .by_id
            .get(id)
            .and_then(|&index| inner.tasks.get(index))
            .cloned()
    }

    /// All tasks in creation order.
    pub fn list_tasks(&self) -> Vec<Task> {
        self.inner.read().tasks.clone()
    }

    /// Tasks that are `Pending` or `Running`, in creation order.
    pub fn list_active_tasks(&self) -> Vec<Task> {
        self.inner
            .read()
            .tasks
            .iter()
            .filter(|task| task.status.is_active())
            .cloned()
            .collect()
    }

    /// Number of tasks ever created.
    pub fn len(&self) -> usize {
        self.inner.read().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
