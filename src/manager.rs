// ABOUTME: BackgroundManager - co-locates the concurrency limiter and task registry.
// ABOUTME: Runs agent invocations end to end: create, admit, start, finish, release.

use std::future::Future;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::Config;
use crate::coordinator::{ConcurrencyConfig, ConcurrencyLimit, ConcurrencyLimiter, ResourceKey};
use crate::error::Cancelled;
use crate::persona::Persona;
use crate::task::{Task, TaskId, TaskRegistry};

/// Error recorded on a task whose `run` future was dropped.
pub const ABANDON_DROPPED: &str = "invocation abandoned";
/// Error recorded on a task whose invocation panicked.
pub const ABANDON_PANICKED: &str = "invocation panicked";

/// Performs a single agent invocation.
///
/// Implemented by the host integration; the manager only schedules calls
/// to it and records the outcome.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Run `persona` on `prompt` and return its final output.
    async fn invoke(&self, persona: &Persona, prompt: &str) -> Result<String, anyhow::Error>;
}

/// Background task manager.
///
/// Owns one [`ConcurrencyLimiter`] and one [`TaskRegistry`]. The two are
/// independent: callers may drive them directly, pairing `acquire`/`release`
/// and task transitions themselves, or use [`run`](Self::run) and
/// [`dispatch`](Self::dispatch) which pair them automatically.
#[derive(Default)]
pub struct BackgroundManager {
    limiter: ConcurrencyLimiter,
    registry: TaskRegistry,
}

impl BackgroundManager {
    /// Create a manager with the given concurrency overrides.
    pub fn new(config: ConcurrencyConfig) -> Self {
        Self {
            limiter: ConcurrencyLimiter::new(config),
            registry: TaskRegistry::new(),
        }
    }

    /// Create a manager from the `backgroundTask` section of the plugin config.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.background_task.clone())
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn resolve_limit(&self, key: &ResourceKey) -> ConcurrencyLimit {
        self.limiter.resolve_limit(key)
    }

    pub async fn acquire(&self, key: &ResourceKey) {
        self.limiter.acquire(key).await
    }

    pub async fn acquire_with_cancel<F>(
        &self,
        key: &ResourceKey,
        cancel: F,
    ) -> Result<(), Cancelled>
    where
        F: Future<Output = ()>,
    {
        self.limiter.acquire_with_cancel(key, cancel).await
    }

    pub fn release(&self, key: &ResourceKey) {
        self.limiter.release(key)
    }

    pub fn create_task(&self, agent: impl Into<String>) -> Task {
        self.registry.create_task(agent)
    }

    pub fn start_task(&self, id: &TaskId) -> bool {
        self.registry.start_task(id)
    }

    pub fn complete_task(&self, id: &TaskId, result: impl Into<String>) -> bool {
        self.registry.complete_task(id, result)
    }

    pub fn fail_task(&self, id: &TaskId, error: impl Into<String>) -> bool {
        self.registry.fail_task(id, error)
    }

    pub fn get_task(&self, id: &TaskId) -> Option<Task> {
        self.registry.get_task(id)
    }

    pub fn list_tasks(&self) -> Vec<Task> {
        self.registry.list_tasks()
    }

    pub fn list_active_tasks(&self) -> Vec<Task> {
        self.registry.list_active_tasks()
    }

    /// Run one agent invocation under the limit for `key`.
    ///
    /// Creates a task, waits for admission, marks it running, awaits
    /// `invocation`, and records the result or error.
    ///
    /// If this future is dropped or `invocation` panics, the task is marked
    /// `Failed` and any admitted slot is released. A run abandoned while
    /// still queued never held a slot; its task is started and failed in one
    /// step, so `started_at` records the moment it was abandoned.
    ///
    /// Returns the final task snapshot.
    pub async fn run<F>(
        &self,
        agent: impl Into<String>,
        key: &ResourceKey,
        invocation: F,
    ) -> Task
    where
        F: Future<Output = Result<String, anyhow::Error>>,
    {
        let task = self.registry.create_task(agent);
        let mut guard = RunGuard {
            manager: self,
            key,
            task_id: &task.id,
            admitted: false,
        };

        self.limiter.acquire(key).await;
        guard.admitted = true;

        self.registry.start_task(&task.id);
        info!(
            target: "undertow::manager",
            task_id = %task.id,
            agent = %task.agent,
            %key,
            "background task started"
        );

        match invocation.await {
            Ok(output) => {
                self.registry.complete_task(&task.id, output);
                info!(target: "undertow::manager", task_id = %task.id, "background task completed");
            }
            Err(e) => {
                self.registry.fail_task(&task.id, e.to_string());
                info!(
                    target: "undertow::manager",
                    task_id = %task.id,
                    error = %e,
                    "background task failed"
                );
            }
        }

        drop(guard);
        self.registry.get_task(&task.id).unwrap_or(task)
    }

    /// Run `persona` on `prompt`, admitted against the persona's default model.
    pub async fn dispatch(
        &self,
        persona: &Persona,
        prompt: &str,
        runner: &dyn AgentRunner,
    ) -> Task {
        self.run(
            persona.name.clone(),
            &persona.default_model,
            runner.invoke(persona, prompt),
        )
        .await
    }
}

/// Settles the task record of a `run` and releases its slot if admitted.
struct RunGuard<'a> {
    manager: &'a BackgroundManager,
    key: &'a ResourceKey,
    task_id: &'a TaskId,
    admitted: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let registry = &self.manager.registry;
        let unsettled = registry
            .get_task(self.task_id)
            .is_some_and(|task| task.status.is_active());

        if unsettled {
            let reason = if std::thread::panicking() {
                ABANDON_PANICKED
            } else {
                ABANDON_DROPPED
            };
            // There is no Pending -> Failed edge; a queued run starts first.
            registry.start_task(self.task_id);
            registry.fail_task(self.task_id, reason);
            warn!(
                target: "undertow::manager",
                task_id = %self.task_id,
                admitted = self.admitted,
                reason,
                "background task abandoned"
            );
        }

        if self.admitted {
            self.manager.limiter.release(self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use tokio_test::{assert_pending, assert_ready, task};

    struct EchoRunner;

    #[async_trait]
    impl AgentRunner for EchoRunner {
        async fn invoke(&self, persona: &Persona, prompt: &str) -> Result<String, anyhow::Error> {
            if prompt.is_empty() {
                anyhow::bail!("empty prompt");
            }
            Ok(format!("{}: {}", persona.name, prompt))
        }
    }

    #[tokio::test]
    async fn test_manual_pairing() {
        let manager = BackgroundManager::new(ConcurrencyConfig::new().model("openai/gpt-4", 1));
        let key = ResourceKey::new("openai/gpt-4");

        let task = manager.create_task("Maelstrom");
        manager.acquire(&key).await;
        assert!(manager.start_task(&task.id));
        assert_eq!(manager.list_active_tasks().len(), 1);

        assert!(manager.complete_task(&task.id, "done"));
        manager.release(&key);

        assert_eq!(manager.limiter().active_count(&key), 0);
        assert!(manager.list_active_tasks().is_empty());
        assert_eq!(manager.list_tasks().len(), 1);
    }

    #[tokio::test]
    async fn test_run_records_success_and_releases() {
        let manager = BackgroundManager::new(ConcurrencyConfig::new().default_concurrency(1));
        let key = ResourceKey::new("anthropic/claude-opus-4-5");

        let task = manager
            .run("Kraken", &key, async { anyhow::Ok("patched".to_string()) })
            .await;

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.as_deref(), Some("patched"));
        assert!(task.started_at.is_some());
        assert_eq!(manager.limiter().active_count(&key), 0);
    }

    #[tokio::test]
    async fn test_run_records_failure_and_releases() {
        let manager = BackgroundManager::default();
        let key = ResourceKey::new("openai/gpt-5.2");

        let task = manager
            .run("Scylla (Plan Reviewer)", &key, async {
                Err::<String, _>(anyhow::anyhow!("rate limited"))
            })
            .await;

        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("rate limited"));
        assert!(task.result.is_none());
        assert_eq!(manager.limiter().active_count(&key), 0);
    }

    #[tokio::test]
    async fn test_run_waits_for_admission_while_pending() {
        let manager = BackgroundManager::new(ConcurrencyConfig::new().model("openai/gpt-4", 1));
        let key = ResourceKey::new("openai/gpt-4");

        manager.acquire(&key).await;

        let mut queued = task::spawn(manager.run("Nautilus", &key, async {
            anyhow::Ok("ok".to_string())
        }));
        assert_pending!(queued.poll());

        let active = manager.list_active_tasks();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].status, TaskStatus::Pending);

        manager.release(&key);
        let finished = assert_ready!(queued.poll());
        assert_eq!(finished.status, TaskStatus::Completed);
        assert_eq!(manager.limiter().active_count(&key), 0);
    }

    #[tokio::test]
    async fn test_dispatch_uses_persona_model() {
        let manager = BackgroundManager::new(ConcurrencyConfig::new().provider("google", 0));
        let persona = Persona::new("Siren", "Writes docs.", "google/gemini-3-flash-preview");

        let task = manager.dispatch(&persona, "document the limiter", &EchoRunner).await;
        assert_eq!(task.agent, "Siren");
        assert_eq!(task.result.as_deref(), Some("Siren: document the limiter"));
        // Unbounded provider: no per-key state was created.
        assert_eq!(manager.limiter().tracked_keys(), 0);

        let failed = manager.dispatch(&persona, "", &EchoRunner).await;
        assert_eq!(failed.error.as_deref(), Some("empty prompt"));
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = Config::from_json(r#"{"backgroundTask": {"defaultConcurrency": 2}}"#).unwrap();
        let manager = BackgroundManager::from_config(&config);
        assert_eq!(
            manager.resolve_limit(&ResourceKey::new("any/model")),
            ConcurrencyLimit::Bounded(2)
        );
    }

    #[tokio::test]
    async fn test_dropped_runs_are_failed_and_released() {
        let manager = BackgroundManager::new(ConcurrencyConfig::new().model("openai/gpt-4", 1));
        let key = ResourceKey::new("openai/gpt-4");

        let mut admitted = task::spawn(manager.run(
            "Kraken",
            &key,
            std::future::pending::<Result<String, anyhow::Error>>(),
        ));
        let mut queued = task::spawn(manager.run("Pearl", &key, async {
            anyhow::Ok("never".to_string())
        }));
        assert_pending!(admitted.poll());
        assert_pending!(queued.poll());

        let statuses: Vec<_> = manager
            .list_active_tasks()
            .into_iter()
            .map(|t| t.status)
            .collect();
        assert_eq!(statuses, vec![TaskStatus::Running, TaskStatus::Pending]);

        drop(admitted);
        drop(queued);

        assert!(manager.list_active_tasks().is_empty());
        for task in manager.list_tasks() {
            assert_eq!(task.status, TaskStatus::Failed);
            assert_eq!(task.error.as_deref(), Some(ABANDON_DROPPED));
            assert!(task.started_at.is_some());
        }
        assert_eq!(manager.limiter().active_count(&key), 0);
        assert_eq!(manager.limiter().queued_count(&key), 0);

        // The key is usable again.
        let task = manager
            .run("Nautilus", &key, async { anyhow::Ok("ok".to_string()) })
            .await;
        assert_eq!(task.status, TaskStatus::Completed);
    }

    async fn crashing_invocation() -> Result<String, anyhow::Error> {
        panic!("model client crashed")
    }

    #[tokio::test]
    async fn test_panicking_invocation_fails_task_and_releases() {
        let manager = std::sync::Arc::new(BackgroundManager::new(
            ConcurrencyConfig::new().model("openai/gpt-4", 1),
        ));
        let key = ResourceKey::new("openai/gpt-4");

        let handle = {
            let (manager, key) = (manager.clone(), key.clone());
            tokio::spawn(async move {
                manager
                    .run("Leviathan", &key, crashing_invocation())
                    .await
            })
        };
        let err = handle.await.unwrap_err();
        assert!(err.is_panic());

        let tasks = manager.list_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::Failed);
        assert_eq!(tasks[0].error.as_deref(), Some(ABANDON_PANICKED));
        assert!(manager.list_active_tasks().is_empty());
        assert_eq!(manager.limiter().active_count(&key), 0);
    }
}
