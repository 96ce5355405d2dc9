//! Domain types for the intake orchestrator
//!
//! - [`TaskId`] - opaque task identifiers
//! - [`Task`] / [`TaskStatus`] - the per-file state machine record
//! - [`SourceFile`] / [`AssetRef`] / [`CatalogItem`] - the payloads that
//!   flow through upload and analysis

mod id;
mod item;
mod task;

pub use id::{TaskId, generate_id};
pub use item::{AssetRef, CatalogItem};
pub use task::{FailedStage, SourceFile, Task, TaskStatus, now_ms};
