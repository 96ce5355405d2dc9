//! closet-intake - wardrobe photo intake orchestrator
//!
//! Manages the lifecycle of user-submitted wardrobe-item photos from
//! upload through AI analysis to a usable catalog entry. The rest of the
//! application (feeds, calendar, auth, admin) only consumes or feeds this
//! orchestrator through the boundary adapters.
//!
//! # Core Concepts
//!
//! - **One task per file**: every submitted photo gets its own registry
//!   record and its own pipeline attempt; tasks never share mutable state
//!   beyond the registry
//! - **Copy-on-write registry**: every mutation replaces a single record
//!   under one lock, so concurrent pipelines cannot conflict
//! - **Stage-aware retries**: a failed task remembers which stage died, so
//!   retrying an analysis failure never re-uploads the photo
//! - **Cancellation as a first-class signal**: dismissing a task aborts
//!   its in-flight network work, not just its row in the panel
//!
//! # Modules
//!
//! - [`domain`] - task records, status state machine, catalog payloads
//! - [`registry`] - the task registry (single source of truth)
//! - [`pipeline`] - the per-task upload/analyze state machine driver
//! - [`orchestrator`] - spawning, retry policy, cancellation, shutdown
//! - [`adapters`] - boundary traits for transport, analysis, toasts, editor
//! - [`config`] - configuration types and loading

pub mod adapters;
pub mod config;
pub mod domain;
pub mod orchestrator;
pub mod pipeline;
pub mod registry;

// Re-export commonly used types
pub use adapters::{
    AnalysisError, AnalysisService, ItemEditor, Notification, NotificationKind, NotificationSink, ProgressSender,
    TransportError, UploadTransport,
};
pub use config::{ConcurrencyConfig, Config, RetryConfig};
pub use domain::{AssetRef, CatalogItem, FailedStage, SourceFile, Task, TaskId, TaskStatus};
pub use orchestrator::Orchestrator;
pub use pipeline::{PipelineContext, Stage, TaskOutcome};
pub use registry::{TaskEvent, TaskPatch, TaskRegistry};
