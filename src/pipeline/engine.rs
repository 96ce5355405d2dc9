//! Per-task pipeline execution
//!
//! One attempt drives a single task through `Uploading -> Analyzing` to a
//! terminal state, patching the registry as it goes. Attempts for distinct
//! tasks share nothing but the registry; every adapter failure is caught
//! here and converted into a registry patch, so no error can escape to
//! block or poison another task.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::{
    AnalysisError, AnalysisService, Notification, NotificationSink, TransportError, UploadTransport,
};
use crate::domain::{AssetRef, CatalogItem, FailedStage, Task, TaskId, TaskStatus};
use crate::registry::{TaskPatch, TaskRegistry};

/// Capacity of the per-attempt upload progress channel
const PROGRESS_CHANNEL_CAPACITY: usize = 32;

/// Shared dependencies for pipeline attempts
#[derive(Clone)]
pub struct PipelineContext {
    pub registry: TaskRegistry,
    pub transport: Arc<dyn UploadTransport>,
    pub analyzer: Arc<dyn AnalysisService>,
    pub notifier: Arc<dyn NotificationSink>,
}

/// Where an attempt enters the state machine
#[derive(Debug, Clone)]
pub enum Stage {
    /// Fresh submission, or retry of a failed upload
    Upload,
    /// Retry of a failed analysis, against the already-uploaded asset
    Analyze(AssetRef),
}

impl From<FailedStage> for Stage {
    fn from(stage: FailedStage) -> Self {
        match stage {
            FailedStage::Upload => Self::Upload,
            FailedStage::Analysis { asset } => Self::Analyze(asset),
        }
    }
}

/// How one pipeline attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed,
    Cancelled,
}

enum AttemptError {
    Transport(TransportError),
    Analysis { error: AnalysisError, asset: AssetRef },
    Cancelled,
}

/// Run one attempt for `id`, settling the terminal result into the
/// registry and notifying the toast surface exactly once.
pub async fn run(ctx: &PipelineContext, id: &TaskId, stage: Stage, cancel: CancellationToken) -> TaskOutcome {
    debug!(task_id = %id, stage = ?stage, "pipeline attempt starting");

    let result = match stage {
        Stage::Upload => match upload(ctx, id, &cancel).await {
            Ok(asset) => analyze(ctx, id, asset, &cancel).await,
            Err(failure) => Err(failure),
        },
        Stage::Analyze(asset) => analyze(ctx, id, asset, &cancel).await,
    };

    settle(ctx, id, result).await
}

/// Upload stage: stream the file out, forwarding transport progress into
/// the registry clamped to a non-decreasing sequence.
async fn upload(ctx: &PipelineContext, id: &TaskId, cancel: &CancellationToken) -> Result<AssetRef, AttemptError> {
    // The record may already be gone if the user dismissed the task
    // between submission and this attempt getting a permit.
    let Some(task) = ctx.registry.get(id) else {
        return Err(AttemptError::Cancelled);
    };
    let file = task.source.clone();
    let mut last_progress = task.progress;

    let (progress_tx, mut progress_rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    let upload_fut = ctx.transport.upload(&file, progress_tx, cancel);
    tokio::pin!(upload_fut);

    // Biased so cancellation wins immediately and buffered progress
    // events drain before completion is observed.
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AttemptError::Cancelled),
            Some(pct) = progress_rx.recv() => {
                let pct = pct.min(100);
                if pct > last_progress {
                    last_progress = pct;
                    ctx.registry.update_task(id, TaskPatch::progress(pct));
                }
            }
            result = &mut upload_fut => {
                return match result {
                    Ok(asset) => {
                        ctx.registry
                            .update_task(id, TaskPatch::status(TaskStatus::Analyzing { asset: asset.clone() }));
                        Ok(asset)
                    }
                    Err(TransportError::Cancelled) => Err(AttemptError::Cancelled),
                    Err(error) => Err(AttemptError::Transport(error)),
                };
            }
        }
    }
}

/// Analysis stage: hand the uploaded asset to the analysis service.
async fn analyze(
    ctx: &PipelineContext,
    id: &TaskId,
    asset: AssetRef,
    cancel: &CancellationToken,
) -> Result<CatalogItem, AttemptError> {
    debug!(task_id = %id, asset = %asset, "analysis starting");

    let analyze_fut = ctx.analyzer.analyze(&asset, cancel);
    tokio::pin!(analyze_fut);

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AttemptError::Cancelled),
        result = &mut analyze_fut => match result {
            Ok(item) => Ok(item),
            Err(AnalysisError::Cancelled) => Err(AttemptError::Cancelled),
            Err(error) => Err(AttemptError::Analysis { error, asset: asset.clone() }),
        },
    }
}

/// Write the terminal state and surface it. `is_retrying` is cleared on
/// both outcomes so a settled retry can be retried again.
async fn settle(ctx: &PipelineContext, id: &TaskId, result: Result<CatalogItem, AttemptError>) -> TaskOutcome {
    let task = ctx.registry.get(id);

    match result {
        Ok(item) => {
            info!(task_id = %id, item_id = %item.id, "task settled: success");
            ctx.registry
                .update_task(id, TaskPatch::status(TaskStatus::Success { item }).with_retrying(false));
            if let Some(task) = task {
                let message = format!("{} added to your closet", task.file_name);
                ctx.notifier.notify(Notification::success(id.clone(), message)).await;
            }
            TaskOutcome::Success
        }
        Err(AttemptError::Cancelled) => {
            // Dismissed or shutting down: the record is gone (or about to
            // be), so there is no terminal transition to surface.
            debug!(task_id = %id, "pipeline attempt cancelled");
            TaskOutcome::Cancelled
        }
        Err(AttemptError::Transport(error)) => fail(ctx, id, task, error.to_string(), FailedStage::Upload).await,
        Err(AttemptError::Analysis { error, asset }) => {
            fail(ctx, id, task, error.to_string(), FailedStage::Analysis { asset }).await
        }
    }
}

async fn fail(
    ctx: &PipelineContext,
    id: &TaskId,
    task: Option<Arc<Task>>,
    message: String,
    failed_stage: FailedStage,
) -> TaskOutcome {
    warn!(task_id = %id, stage = ?failed_stage, message = %message, "task settled: error");
    ctx.registry.update_task(
        id,
        TaskPatch::status(TaskStatus::Error {
            message: message.clone(),
            failed_stage,
        })
        .with_retrying(false),
    );
    if task.is_some() {
        ctx.notifier.notify(Notification::error(id.clone(), message)).await;
    }
    TaskOutcome::Failed
}
