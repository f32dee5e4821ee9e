//! Testing utilities for gatherflow pipelines.
//!
//! This module provides in-memory stand-ins for every external collaborator:
//! - Static and failing retrievers
//! - A fixed storm source
//! - A text generator that records its prompts

mod fakes;

pub use fakes::{FailingRetriever, RecordingGenerator, StaticRetriever, StaticStormSource};
