//! Pipeline building and execution.
//!
//! This module provides:
//! - Step specifications with per-step failure policies
//! - A pipeline builder that validates field readiness at construction
//! - The sequential runner and its per-run report

mod builder;
mod graph;
mod report;
mod spec;

pub use builder::PipelineBuilder;
pub use graph::{Pipeline, TERMINAL};
pub use report::{PipelineRun, StepOutcome, StepRecord};
pub use spec::{FailurePolicy, FallbackFn, StepSpec};
