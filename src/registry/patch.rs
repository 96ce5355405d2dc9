//! Partial updates to task records

use crate::domain::{Task, TaskStatus, now_ms};

/// A partial update merged into an existing task record.
///
/// Applying the same patch twice yields the same record as applying it
/// once. Progress merges are clamped so the stored value never decreases
/// while the task is non-terminal; a status change owns the progress field
/// for that transition (entering `Analyzing` or `Success` forces 100).
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub progress: Option<u8>,
    pub status: Option<TaskStatus>,
    pub is_retrying: Option<bool>,
}

impl TaskPatch {
    /// Patch that only advances progress
    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }

    /// Patch that transitions status
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Also set the retry-in-flight flag
    pub fn with_retrying(mut self, is_retrying: bool) -> Self {
        self.is_retrying = Some(is_retrying);
        self
    }

    /// Build the next record from the current one (copy-on-write)
    pub(crate) fn apply(&self, task: &Task) -> Task {
        let mut next = task.clone();

        match &self.status {
            Some(status) => {
                next.status = status.clone();
                match next.status {
                    TaskStatus::Analyzing { .. } | TaskStatus::Success { .. } => next.progress = 100,
                    _ => {
                        if let Some(progress) = self.progress {
                            next.progress = progress.min(100);
                        }
                    }
                }
            }
            None => {
                // Plain progress events never move backwards and never
                // touch a settled task.
                if let Some(progress) = self.progress
                    && !next.status.is_terminal()
                {
                    next.progress = next.progress.max(progress.min(100));
                }
            }
        }

        if let Some(is_retrying) = self.is_retrying {
            next.is_retrying = is_retrying;
        }

        next.updated_at = now_ms();
        next
    }
}
