//! Upload/analyze pipeline
//!
//! Drives one task through its state machine, reporting progress and the
//! terminal result back into the registry.

mod engine;

pub use engine::{PipelineContext, Stage, TaskOutcome, run};
