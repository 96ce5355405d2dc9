//! Notification surface boundary

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::TaskId;

/// Kind of user-visible notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Error,
}

/// A terminal-transition event for the toast surface
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub task_id: TaskId,
    pub message: String,
}

impl Notification {
    /// Build a success notification
    pub fn success(task_id: TaskId, message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            task_id,
            message: message.into(),
        }
    }

    /// Build an error notification
    pub fn error(task_id: TaskId, message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            task_id,
            message: message.into(),
        }
    }
}

/// Receives one event per terminal transition, for user-visible toasts
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_constructors() {
        let id = TaskId::from_string("t-1");
        let n = Notification::success(id.clone(), "dress.jpg added");
        assert_eq!(n.kind, NotificationKind::Success);
        assert_eq!(n.message, "dress.jpg added");

        let n = Notification::error(id, "upload failed");
        assert_eq!(n.kind, NotificationKind::Error);
    }
}
