//! # Gatherflow
//!
//! Small sequential data-gathering pipelines: fetch from external services,
//! hand the results to a language model, return the text.
//!
//! Gatherflow provides:
//!
//! - **Typed pipeline state**: a fixed-schema struct per pipeline, filled in
//!   additively by [`pipeline_state!`]-generated updates
//! - **Validated step chains**: field readiness is checked when the pipeline
//!   is built, not when it runs
//! - **Per-step failure policies**: upstream failures either abort the run or
//!   are replaced by a fallback update
//! - **Collaborators**: the NHC storm feed, Wikipedia and arXiv retrieval,
//!   OpenAI chat completions and the Ollama daemon
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gatherflow::prelude::*;
//! use std::sync::Arc;
//!
//! let config = AppConfig::from_env()?;
//! let http = config.http.client()?;
//! let pipeline = hurricane::build_pipeline(
//!     Arc::new(NhcStormFeed::new(&config.sources, http.clone())),
//!     Arc::new(OpenAiChat::new(&config.openai, http)?.with_temperature(0.4)),
//!     config.locale,
//!     Arc::new(LoggingEventSink::default()),
//! )?;
//!
//! let state = pipeline
//!     .invoke([("question", FieldValue::from("Which storms are active?"))])
//!     .await?;
//! println!("{}", state.synthesis.unwrap_or_default());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod errors;
pub mod events;
pub mod hurricane;
pub mod pipeline;
pub mod providers;
pub mod research;
pub mod retrieval;
pub mod state;
pub mod steps;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{AppConfig, Locale};
    pub use crate::errors::{
        ConfigError, ContractErrorInfo, GatherflowError, PipelineValidationError, SchemaError,
        StepError, UpstreamError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::hurricane::{self, HurricaneState, NhcStormFeed, StormRecord, StormSource};
    pub use crate::pipeline::{
        FailurePolicy, Pipeline, PipelineBuilder, PipelineRun, StepOutcome, StepSpec, TERMINAL,
    };
    pub use crate::providers::{LlmResponse, OllamaClient, OpenAiChat, TextGenerator};
    pub use crate::research::{self, ResearchState};
    pub use crate::retrieval::{ArxivRetriever, Retriever, WikipediaRetriever};
    pub use crate::state::{FieldValue, PipelineState};
    pub use crate::steps::{FnStep, Step};
}
