//! Research pipeline.
//!
//! `arxiv_search -> wiki_search -> synthesis`. When either search cannot
//! reach its source the field gets a fixed notice and the run continues; a
//! blank question stops the run before any request.

mod steps;

pub use steps::{answer_prompt, SearchStep, SearchTarget, SynthesizeAnswer};

use crate::config::Locale;
use crate::errors::PipelineValidationError;
use crate::events::EventSink;
use crate::pipeline::{Pipeline, PipelineBuilder, StepSpec};
use crate::providers::TextGenerator;
use crate::retrieval::Retriever;
use std::sync::Arc;

/// Pipeline name.
pub const PIPELINE_NAME: &str = "research";

crate::pipeline_state! {
    /// State of one research run.
    pub struct ResearchState / ResearchUpdate: "research" {
        /// The caller's question.
        question: String,
        /// arXiv documents or a notice.
        arxiv_docs: Vec<String>,
        /// Wikipedia documents or a notice.
        wiki_docs: Vec<String>,
        /// Final answer.
        synthesis: String,
    }
}

/// The prompt shown when the CLI asks for a question.
#[must_use]
pub fn question_prompt(locale: Locale) -> &'static str {
    match locale {
        Locale::Portuguese => "Digite sua pergunta científica: ",
        Locale::English => "Enter your scientific question: ",
    }
}

fn search_spec(
    target: SearchTarget,
    retriever: Arc<dyn Retriever>,
    locale: Locale,
) -> StepSpec<ResearchState> {
    StepSpec::new(Arc::new(SearchStep::new(target, retriever, locale)))
        .with_fallback(move |_err| target.fallback_update(locale))
}

/// Builds the research pipeline.
///
/// # Errors
///
/// Returns an error only if the step contracts are inconsistent.
pub fn build_pipeline(
    arxiv: Arc<dyn Retriever>,
    wikipedia: Arc<dyn Retriever>,
    generator: Arc<dyn TextGenerator>,
    locale: Locale,
    event_sink: Arc<dyn EventSink>,
) -> Result<Pipeline<ResearchState>, PipelineValidationError> {
    PipelineBuilder::new(PIPELINE_NAME, &["question"])?
        .with_event_sink(event_sink)
        .step_spec(search_spec(SearchTarget::Arxiv, arxiv, locale))?
        .step_spec(search_spec(SearchTarget::Wikipedia, wikipedia, locale))?
        .step(Arc::new(SynthesizeAnswer::new(generator, locale)))?
        .build()
}
