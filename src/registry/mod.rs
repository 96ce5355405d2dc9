//! Task registry - the single source of truth for intake tasks
//!
//! Maps task IDs to task records. Every mutation is a single-key
//! copy-on-write replacement under one lock, so two pipelines updating
//! different IDs never conflict and updates to the same ID are serialized
//! by the registry itself, never by callers. All operations are synchronous
//! and non-blocking; state changes are broadcast so UI layers can react
//! without polling.

mod patch;

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::domain::{FailedStage, SourceFile, Task, TaskId, TaskStatus, now_ms};

pub use patch::TaskPatch;

/// Capacity of the registry's event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Broadcast when registry state changes
#[derive(Debug, Clone)]
pub enum TaskEvent {
    /// A task was created
    Created { id: TaskId },
    /// A task record was replaced
    Updated { id: TaskId },
    /// A task was removed
    Removed { id: TaskId },
    /// The active (selected) task changed
    ActiveChanged { id: Option<TaskId> },
}

#[derive(Default)]
struct RegistryState {
    tasks: HashMap<TaskId, Arc<Task>>,
    /// Insertion order, for stable listing
    order: Vec<TaskId>,
    /// At most one task is selected at a time
    active: Option<TaskId>,
}

/// Shared handle to the task registry
#[derive(Clone)]
pub struct TaskRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    state: RwLock<RegistryState>,
    event_tx: broadcast::Sender<TaskEvent>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(RegistryInner {
                state: RwLock::new(RegistryState::default()),
                event_tx,
            }),
        }
    }

    /// Subscribe to registry change events
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Create a task for a submitted file and mark it active.
    ///
    /// The new record starts in `Uploading` at progress 0.
    pub fn add_task(&self, source: SourceFile) -> TaskId {
        let task = Task::new(source);
        let id = task.id.clone();
        debug!(task_id = %id, file_name = %task.file_name, "add_task");

        if let Some(mut state) = self.write() {
            state.tasks.insert(id.clone(), Arc::new(task));
            state.order.push(id.clone());
            state.active = Some(id.clone());
        }

        self.emit(TaskEvent::Created { id: id.clone() });
        self.emit(TaskEvent::ActiveChanged { id: Some(id.clone()) });
        id
    }

    /// Get a task record by ID
    pub fn get(&self, id: &TaskId) -> Option<Arc<Task>> {
        self.inner.state.read().ok()?.tasks.get(id).cloned()
    }

    /// Merge a partial update into an existing record.
    ///
    /// Silently ignored when the ID is absent (the task may have been
    /// dismissed while its pipeline was still reporting).
    pub fn update_task(&self, id: &TaskId, patch: TaskPatch) {
        let Some(mut state) = self.write() else { return };

        let Some(current) = state.tasks.get(id) else {
            debug!(task_id = %id, "update_task: unknown id, ignoring");
            return;
        };

        let next = patch.apply(current);
        state.tasks.insert(id.clone(), Arc::new(next));
        drop(state);

        self.emit(TaskEvent::Updated { id: id.clone() });
    }

    /// Remove a task record.
    ///
    /// Clears the active selection if it pointed at the removed task.
    /// Returns false when the ID was absent.
    pub fn remove_task(&self, id: &TaskId) -> bool {
        let Some(mut state) = self.write() else { return false };

        if state.tasks.remove(id).is_none() {
            debug!(task_id = %id, "remove_task: unknown id, ignoring");
            return false;
        }
        state.order.retain(|other| other != id);

        let active_cleared = state.active.as_ref() == Some(id);
        if active_cleared {
            state.active = None;
        }
        drop(state);

        debug!(task_id = %id, "remove_task: removed");
        self.emit(TaskEvent::Removed { id: id.clone() });
        if active_cleared {
            self.emit(TaskEvent::ActiveChanged { id: None });
        }
        true
    }

    /// Select the task shown in the detail panel, or clear the selection.
    ///
    /// Selecting an unknown ID is ignored.
    pub fn set_active_task(&self, id: Option<TaskId>) {
        let Some(mut state) = self.write() else { return };

        if let Some(id) = &id
            && !state.tasks.contains_key(id)
        {
            debug!(task_id = %id, "set_active_task: unknown id, ignoring");
            return;
        }

        state.active = id.clone();
        drop(state);

        self.emit(TaskEvent::ActiveChanged { id });
    }

    /// Currently selected task, if any
    pub fn active_task(&self) -> Option<TaskId> {
        self.inner.state.read().ok()?.active.clone()
    }

    /// Remove every task in a terminal state (`Success` or `Error`).
    ///
    /// Returns the removed IDs.
    pub fn clear_completed(&self) -> Vec<TaskId> {
        let Some(mut state) = self.write() else {
            return Vec::new();
        };

        let removed: Vec<TaskId> = state
            .order
            .iter()
            .filter(|id| state.tasks.get(*id).is_some_and(|t| t.is_terminal()))
            .cloned()
            .collect();

        for id in &removed {
            state.tasks.remove(id);
        }
        state.order.retain(|id| !removed.contains(id));

        let active_cleared = state.active.as_ref().is_some_and(|id| removed.contains(id));
        if active_cleared {
            state.active = None;
        }
        drop(state);

        debug!(count = removed.len(), "clear_completed");
        for id in &removed {
            self.emit(TaskEvent::Removed { id: id.clone() });
        }
        if active_cleared {
            self.emit(TaskEvent::ActiveChanged { id: None });
        }
        removed
    }

    /// Atomically arm a retry for a failed task.
    ///
    /// No-op (returns `None`) unless the task exists, is in `Error`, is not
    /// already retrying, and has attempts left under `max_attempts`
    /// (0 = unlimited). Otherwise sets `is_retrying`, bumps `retry_count`,
    /// restores the stage recorded at failure, and returns that stage so
    /// the caller can re-enter the pipeline there. Guard-check and state
    /// reset are one critical section, so two rapid retries for the same ID
    /// arm exactly one attempt.
    pub fn begin_retry(&self, id: &TaskId, max_attempts: u32) -> Option<FailedStage> {
        let mut state = self.write()?;

        let task = state.tasks.get(id)?;
        let TaskStatus::Error { failed_stage, .. } = &task.status else {
            debug!(task_id = %id, "begin_retry: task not in error state");
            return None;
        };
        if task.is_retrying {
            debug!(task_id = %id, "begin_retry: retry already in flight, ignoring");
            return None;
        }
        if max_attempts > 0 && task.retry_count >= max_attempts {
            warn!(task_id = %id, retry_count = task.retry_count, max_attempts, "begin_retry: attempt cap reached");
            return None;
        }

        let stage = failed_stage.clone();
        let mut next = (**task).clone();
        next.retry_count += 1;
        next.is_retrying = true;
        match &stage {
            FailedStage::Upload => {
                next.status = TaskStatus::Uploading;
                next.progress = 0;
            }
            FailedStage::Analysis { asset } => {
                next.status = TaskStatus::Analyzing { asset: asset.clone() };
                next.progress = 100;
            }
        }
        next.updated_at = now_ms();
        state.tasks.insert(id.clone(), Arc::new(next));
        drop(state);

        debug!(task_id = %id, stage = ?stage, "begin_retry: armed");
        self.emit(TaskEvent::Updated { id: id.clone() });
        Some(stage)
    }

    /// All task records in creation order
    pub fn list(&self) -> Vec<Arc<Task>> {
        match self.inner.state.read() {
            Ok(state) => state.order.iter().filter_map(|id| state.tasks.get(id).cloned()).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Number of tasks in the registry
    pub fn len(&self) -> usize {
        self.inner.state.read().map(|s| s.tasks.len()).unwrap_or(0)
    }

    /// Check whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self) -> Option<RwLockWriteGuard<'_, RegistryState>> {
        match self.inner.state.write() {
            Ok(guard) => Some(guard),
            Err(_) => {
                error!("registry lock poisoned, dropping operation");
                None
            }
        }
    }

    fn emit(&self, event: TaskEvent) {
        // Nobody subscribed is fine
        let _ = self.inner.event_tx.send(event);
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}
