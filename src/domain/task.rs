//! Intake task record
//!
//! A Task is one file's journey from selection to catalog entry. Status is
//! a tagged union: each variant carries exactly the fields that are valid
//! for that state, so combinations like "success with an error message"
//! cannot be represented.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::id::TaskId;
use super::item::{AssetRef, CatalogItem};

/// Current time in Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// The raw file handed over by the UI layer.
///
/// Bytes are reference-counted so the record can be cloned copy-on-write
/// without duplicating image data. The source is kept for the task's
/// lifetime so a retry of the upload stage can restart the transport
/// without asking the UI for the file again.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Display name of the file
    pub file_name: String,

    /// MIME type (e.g. "image/jpeg")
    pub content_type: String,

    /// Raw file contents
    pub data: Arc<[u8]>,
}

impl SourceFile {
    /// Create a source file from raw bytes
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data: data.into().into(),
        }
    }
}

/// Which pipeline stage a failed attempt died in.
///
/// An analysis failure keeps the uploaded asset's reference so a retry can
/// restart only the analysis call instead of re-uploading the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum FailedStage {
    Upload,
    Analysis { asset: AssetRef },
}

/// Task state machine: `Uploading -> Analyzing -> Success | Error`
///
/// `Success` and `Error` are terminal; no transition leaves them without an
/// explicit retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskStatus {
    /// Streaming the file to the upload transport
    Uploading,
    /// Upload done, waiting on the analysis service
    Analyzing { asset: AssetRef },
    /// Catalog entry created; the full snapshot is cached here
    Success { item: CatalogItem },
    /// A stage failed; the task stays visible until dismissed or retried
    Error { message: String, failed_stage: FailedStage },
}

impl TaskStatus {
    /// Check whether this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Error { .. })
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uploading => write!(f, "uploading"),
            Self::Analyzing { .. } => write!(f, "analyzing"),
            Self::Success { .. } => write!(f, "success"),
            Self::Error { .. } => write!(f, "error"),
        }
    }
}

/// One submitted file's end-to-end record
#[derive(Debug, Clone)]
pub struct Task {
    /// Unique identifier, generated at creation
    pub id: TaskId,

    /// Display name of the source file
    pub file_name: String,

    /// The raw file, retained for upload retries
    pub source: SourceFile,

    /// Progress 0-100, monotonically non-decreasing while non-terminal
    pub progress: u8,

    /// Current state in the pipeline
    pub status: TaskStatus,

    /// Number of retry attempts so far
    pub retry_count: u32,

    /// True only while a retry is currently in flight
    pub is_retrying: bool,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Task {
    /// Create a new task for a submitted file, starting in `Uploading`
    pub fn new(source: SourceFile) -> Self {
        let now = now_ms();
        Self {
            id: TaskId::generate(&source.file_name),
            file_name: source.file_name.clone(),
            source,
            progress: 0,
            status: TaskStatus::Uploading,
            retry_count: 0,
            is_retrying: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a task with a specific ID (for testing)
    pub fn with_id(id: impl Into<TaskId>, source: SourceFile) -> Self {
        let mut task = Self::new(source);
        task.id = id.into();
        task
    }

    /// Check if the task is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Error message, present only when the task failed
    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            TaskStatus::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Created catalog-item ID, present only on success
    pub fn created_item_id(&self) -> Option<&str> {
        self.created_item().map(|item| item.id.as_str())
    }

    /// Cached catalog-entry snapshot, present only on success
    pub fn created_item(&self) -> Option<&CatalogItem> {
        match &self.status {
            TaskStatus::Success { item } => Some(item),
            _ => None,
        }
    }
}
