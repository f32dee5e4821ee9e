//! Pipeline lifecycle events.
//!
//! The runner emits `pipeline.started`, `step.started`, `step.completed`,
//! `step.fallback`, `step.failed` and `pipeline.completed`. Sinks are handed to
//! the pipeline explicitly; there is no process-wide sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Emitted once before the first step runs.
pub const PIPELINE_STARTED: &str = "pipeline.started";
/// Emitted after the terminal marker is reached.
pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
/// Emitted before a step runs. Carries an optional `progress` message.
pub const STEP_STARTED: &str = "step.started";
/// Emitted after a step's update has been merged.
pub const STEP_COMPLETED: &str = "step.completed";
/// Emitted when a step failure was replaced by its fallback update.
pub const STEP_FALLBACK: &str = "step.fallback";
/// Emitted when a step failure aborts the run.
pub const STEP_FAILED: &str = "step.failed";
