//! Orchestrator - spawns and manages per-task pipelines
//!
//! The Orchestrator is responsible for:
//! - Creating a registry task per submitted file
//! - Spawning pipeline attempts as tokio tasks
//! - Enforcing the configurable concurrency bound via semaphore
//! - Cancelling in-flight work when a task is dismissed
//! - Graceful shutdown coordination

mod retry;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use eyre::Result;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::adapters::{AnalysisService, ItemEditor, NotificationSink, UploadTransport};
use crate::config::Config;
use crate::domain::{SourceFile, TaskId};
use crate::pipeline::{self, PipelineContext, Stage, TaskOutcome};
use crate::registry::TaskRegistry;

/// One pipeline attempt currently spawned
struct Inflight {
    cancel: CancellationToken,
    handle: JoinHandle<TaskOutcome>,
}

/// Orchestrates the lifecycle of intake tasks from submission to settling
pub struct Orchestrator {
    config: Config,
    ctx: PipelineContext,
    editor: Arc<dyn ItemEditor>,
    semaphore: Arc<Semaphore>,
    inflight: Mutex<HashMap<TaskId, Inflight>>,
}

impl Orchestrator {
    /// Create a new Orchestrator over the given registry and boundary
    /// adapters
    pub fn new(
        config: Config,
        registry: TaskRegistry,
        transport: Arc<dyn UploadTransport>,
        analyzer: Arc<dyn AnalysisService>,
        notifier: Arc<dyn NotificationSink>,
        editor: Arc<dyn ItemEditor>,
    ) -> Self {
        let permits = match config.concurrency.max_concurrent_tasks {
            0 => Semaphore::MAX_PERMITS,
            n => n,
        };

        Self {
            config,
            ctx: PipelineContext {
                registry,
                transport,
                analyzer,
                notifier,
            },
            editor,
            semaphore: Arc::new(Semaphore::new(permits)),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// The registry backing this orchestrator
    pub fn registry(&self) -> &TaskRegistry {
        &self.ctx.registry
    }

    /// Submit one file for intake.
    ///
    /// Returns immediately with the new task's ID; the pipeline attempt
    /// queues behind the concurrency bound rather than blocking the
    /// caller.
    pub fn submit(&self, file: SourceFile) -> TaskId {
        let id = self.ctx.registry.add_task(file);
        info!(task_id = %id, "submit: task created");
        self.spawn_attempt(id.clone(), Stage::Upload);
        id
    }

    /// Submit a batch of files, one independent task per file
    pub fn submit_batch(&self, files: Vec<SourceFile>) -> Vec<TaskId> {
        files.into_iter().map(|file| self.submit(file)).collect()
    }

    /// Dismiss a task: cancel any in-flight work, then drop the record.
    ///
    /// Returns false when the ID was unknown.
    pub fn remove_task(&self, id: &TaskId) -> bool {
        if let Some(entry) = self.lock_inflight().remove(id) {
            debug!(task_id = %id, "remove_task: cancelling in-flight attempt");
            entry.cancel.cancel();
        }
        self.ctx.registry.remove_task(id)
    }

    /// Remove every settled (`Success`/`Error`) task
    pub fn clear_completed(&self) -> Vec<TaskId> {
        let removed = self.ctx.registry.clear_completed();
        let mut inflight = self.lock_inflight();
        for id in &removed {
            // Settled tasks have finished attempts; just drop the bookkeeping
            inflight.remove(id);
        }
        removed
    }

    /// Open the item editor for a successfully settled task.
    ///
    /// Hands over the cached catalog snapshot; no fetch happens here.
    pub async fn open_in_editor(&self, id: &TaskId) -> Result<()> {
        let task = self
            .ctx
            .registry
            .get(id)
            .ok_or_else(|| eyre::eyre!("no task with id {id}"))?;
        let item = task
            .created_item()
            .ok_or_else(|| eyre::eyre!("task {id} has no catalog entry to edit"))?;
        self.editor.open(item).await;
        Ok(())
    }

    /// Number of attempts currently spawned and not yet reaped
    pub fn running_count(&self) -> usize {
        self.lock_inflight()
            .values()
            .filter(|entry| !entry.handle.is_finished())
            .count()
    }

    /// Wait until every in-flight attempt has settled.
    ///
    /// Used by tests and teardown; ordinary consumers react to registry
    /// events instead.
    pub async fn wait_idle(&self) {
        loop {
            self.reap_finished().await;
            if self.lock_inflight().is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Cancel everything and wait, bounded by the configured timeout, for
    /// attempts to wind down. Attempts still running at the deadline are
    /// aborted.
    pub async fn shutdown(&self) {
        info!(in_flight = self.lock_inflight().len(), "orchestrator shutting down");

        // Closing the semaphore fails queued acquires, so attempts that
        // never started settle as cancelled instead of running.
        self.semaphore.close();
        for entry in self.lock_inflight().values() {
            entry.cancel.cancel();
        }

        let timeout = Duration::from_secs(self.config.concurrency.shutdown_timeout_secs);
        let deadline = tokio::time::Instant::now() + timeout;
        while !self.lock_inflight().is_empty() && tokio::time::Instant::now() < deadline {
            self.reap_finished().await;
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let leftover: Vec<(TaskId, Inflight)> = self.lock_inflight().drain().collect();
        if !leftover.is_empty() {
            warn!(count = leftover.len(), "aborting attempts still running after timeout");
            for (id, entry) in leftover {
                debug!(task_id = %id, "aborting attempt");
                entry.handle.abort();
            }
        }

        info!("orchestrator shutdown complete");
    }

    /// Spawn one pipeline attempt for `id` entering at `stage`
    pub(crate) fn spawn_attempt(&self, id: TaskId, stage: Stage) {
        let cancel = CancellationToken::new();
        let ctx = self.ctx.clone();
        let semaphore = self.semaphore.clone();
        let task_id = id.clone();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    debug!(task_id = %task_id, "executor closed before attempt started");
                    return TaskOutcome::Cancelled;
                }
            };
            pipeline::run(&ctx, &task_id, stage, task_cancel).await
        });

        // A retry replaces the settled attempt's bookkeeping; the old
        // handle has already finished (or is finishing) and detaches.
        let _ = self.lock_inflight().insert(id, Inflight { cancel, handle });
    }

    /// Remove finished attempts from the in-flight map, surfacing panics
    async fn reap_finished(&self) {
        let finished: Vec<(TaskId, Inflight)> = {
            let mut inflight = self.lock_inflight();
            let ids: Vec<TaskId> = inflight
                .iter()
                .filter(|(_, entry)| entry.handle.is_finished())
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| inflight.remove(&id).map(|entry| (id, entry)))
                .collect()
        };

        for (id, entry) in finished {
            match entry.handle.await {
                Ok(outcome) => debug!(task_id = %id, outcome = ?outcome, "attempt reaped"),
                Err(e) => error!(task_id = %id, error = %e, "attempt panicked"),
            }
        }
    }

    fn lock_inflight(&self) -> MutexGuard<'_, HashMap<TaskId, Inflight>> {
        // A panic while holding this lock only poisons bookkeeping;
        // recover rather than cascade.
        self.inflight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{
        AnalysisError, Notification, NotificationKind, ProgressSender, TransportError,
    };
    use crate::domain::{AssetRef, CatalogItem, TaskStatus};
    use async_trait::async_trait;

    struct OkTransport;

    #[async_trait]
    impl UploadTransport for OkTransport {
        async fn upload(
            &self,
            file: &SourceFile,
            progress: ProgressSender,
            _cancel: &CancellationToken,
        ) -> Result<AssetRef, TransportError> {
            let _ = progress.send(50).await;
            Ok(AssetRef::new(format!("assets/{}", file.file_name)))
        }
    }

    struct OkAnalyzer;

    #[async_trait]
    impl AnalysisService for OkAnalyzer {
        async fn analyze(&self, asset: &AssetRef, _cancel: &CancellationToken) -> Result<CatalogItem, AnalysisError> {
            Ok(CatalogItem::new("item-1", "Item", "tops", asset.as_str()))
        }
    }

    #[derive(Default)]
    struct CountingSink {
        notifications: Mutex<Vec<NotificationKind>>,
    }

    #[async_trait]
    impl NotificationSink for CountingSink {
        async fn notify(&self, notification: Notification) {
            self.notifications.lock().unwrap().push(notification.kind);
        }
    }

    #[derive(Default)]
    struct RecordingEditor {
        opened: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ItemEditor for RecordingEditor {
        async fn open(&self, item: &CatalogItem) {
            self.opened.lock().unwrap().push(item.id.clone());
        }
    }

    fn orchestrator(config: Config) -> (Orchestrator, Arc<RecordingEditor>) {
        let editor = Arc::new(RecordingEditor::default());
        let orch = Orchestrator::new(
            config,
            TaskRegistry::new(),
            Arc::new(OkTransport),
            Arc::new(OkAnalyzer),
            Arc::new(CountingSink::default()),
            editor.clone(),
        );
        (orch, editor)
    }

    fn source(name: &str) -> SourceFile {
        SourceFile::new(name, "image/jpeg", vec![0u8; 8])
    }

    #[tokio::test]
    async fn test_submit_settles_success() {
        let (orch, _) = orchestrator(Config::default());
        let id = orch.submit(source("a.jpg"));

        orch.wait_idle().await;

        let task = orch.registry().get(&id).unwrap();
        assert!(matches!(task.status, TaskStatus::Success { .. }));
        assert_eq!(task.progress, 100);
        assert_eq!(orch.running_count(), 0);
    }

    #[tokio::test]
    async fn test_bounded_concurrency_still_settles_all() {
        let mut config = Config::default();
        config.concurrency.max_concurrent_tasks = 1;
        let (orch, _) = orchestrator(config);

        let ids = orch.submit_batch(vec![source("a.jpg"), source("b.jpg"), source("c.jpg")]);
        orch.wait_idle().await;

        for id in &ids {
            let task = orch.registry().get(id).unwrap();
            assert!(matches!(task.status, TaskStatus::Success { .. }), "task {id} not settled");
        }
    }

    #[tokio::test]
    async fn test_open_in_editor_requires_success() {
        let (orch, editor) = orchestrator(Config::default());
        let ghost = TaskId::from_string("ghost");
        assert!(orch.open_in_editor(&ghost).await.is_err());

        let id = orch.submit(source("a.jpg"));
        orch.wait_idle().await;

        orch.open_in_editor(&id).await.unwrap();
        assert_eq!(editor.opened.lock().unwrap().as_slice(), &["item-1".to_string()]);
    }

    #[tokio::test]
    async fn test_shutdown_is_reentrant_safe_when_idle() {
        let (orch, _) = orchestrator(Config::default());
        orch.shutdown().await;
        // Submitting after shutdown creates the record but the attempt
        // settles as cancelled because the executor is closed.
        let id = orch.submit(source("late.jpg"));
        orch.wait_idle().await;
        assert_eq!(orch.registry().get(&id).unwrap().status, TaskStatus::Uploading);
    }
}
