//! Hurricane report pipeline.
//!
//! `fetch` loads the active storm list, `summarize` hands it to a text
//! generator. With no active storms the report is a fixed sentence and the
//! model is never called.

mod feed;
mod record;
mod steps;

pub use feed::{parse_feed, NhcStormFeed, StormSource};
pub use record::{
    Classification, StormKind, StormLinks, StormLocation, StormMovement, StormRecord,
};
pub use steps::{no_active_storms, storm_context, summary_prompt, FetchStorms, SummarizeStorms};

use crate::config::Locale;
use crate::errors::PipelineValidationError;
use crate::events::EventSink;
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::providers::TextGenerator;
use std::sync::Arc;

/// Pipeline name.
pub const PIPELINE_NAME: &str = "hurricane-report";

/// Sampling temperature for storm summaries.
pub const SUMMARY_TEMPERATURE: f32 = 0.4;

crate::pipeline_state! {
    /// State of one hurricane report run.
    pub struct HurricaneState / HurricaneUpdate: "hurricane" {
        /// The caller's question.
        question: String,
        /// Active storms, possibly empty.
        storms_data: Vec<StormRecord>,
        /// Final report.
        synthesis: String,
    }
}

/// Returns the question asked when the caller supplies none.
#[must_use]
pub fn default_question(locale: Locale) -> &'static str {
    match locale {
        Locale::Portuguese => "Quais furacões estão ativos no Caribe neste momento?",
        Locale::English => "Which hurricanes are currently active in the Caribbean?",
    }
}

/// Builds the `fetch -> summarize` pipeline.
///
/// # Errors
///
/// Returns an error only if the step contracts are inconsistent.
pub fn build_pipeline(
    source: Arc<dyn StormSource>,
    generator: Arc<dyn TextGenerator>,
    locale: Locale,
    event_sink: Arc<dyn EventSink>,
) -> Result<Pipeline<HurricaneState>, PipelineValidationError> {
    PipelineBuilder::new(PIPELINE_NAME, &["question"])?
        .with_event_sink(event_sink)
        .step(Arc::new(FetchStorms::new(source, locale)))?
        .step(Arc::new(SummarizeStorms::new(generator, locale)))?
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{GatherflowError, StepError, UpstreamError};
    use crate::events::{CollectingEventSink, NoOpEventSink};
    use crate::pipeline::TERMINAL;
    use crate::providers::{LlmResponse, MockTextGenerator};
    use crate::state::FieldValue;
    use feed::MockStormSource;
    use pretty_assertions::assert_eq;

    fn source_with(storms: Vec<StormRecord>) -> Arc<dyn StormSource> {
        let mut source = MockStormSource::new();
        source
            .expect_active_storms()
            .times(1)
            .returning(move || Ok(storms.clone()));
        Arc::new(source)
    }

    #[test]
    fn test_execution_order() {
        let pipeline = build_pipeline(
            source_with(Vec::new()),
            Arc::new(MockTextGenerator::new()),
            Locale::Portuguese,
            Arc::new(NoOpEventSink),
        )
        .unwrap();

        assert_eq!(pipeline.entry_step(), "fetch");
        assert_eq!(pipeline.execution_order(), vec!["fetch", "summarize", TERMINAL]);
    }

    #[tokio::test]
    async fn test_no_storms_yields_sentinel() {
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().times(0);

        let pipeline = build_pipeline(
            source_with(Vec::new()),
            Arc::new(generator),
            Locale::Portuguese,
            Arc::new(NoOpEventSink),
        )
        .unwrap();

        let state = pipeline
            .invoke([("question", FieldValue::from("x"))])
            .await
            .unwrap();

        assert_eq!(state.storms_data, Some(Vec::new()));
        assert_eq!(state.synthesis.as_deref(), Some(no_active_storms(Locale::Portuguese)));
    }

    #[tokio::test]
    async fn test_single_hurricane_report() {
        let mut storm = StormRecord::new("Test", "HU");
        storm.wind_mph = Some("90".to_string());
        storm.pressure_mb = Some("980".to_string());

        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .withf(|prompt: &str| {
                prompt.contains("Test") && prompt.contains("90 mph") && prompt.contains("980 mb")
            })
            .times(1)
            .returning(|_| Ok(LlmResponse::new("Hurricane Test is active.", "m", "mock")));

        let sink = Arc::new(CollectingEventSink::new());
        let pipeline = build_pipeline(
            source_with(vec![storm]),
            Arc::new(generator),
            Locale::English,
            sink.clone(),
        )
        .unwrap();

        let state = pipeline
            .invoke([("question", FieldValue::from(default_question(Locale::English)))])
            .await
            .unwrap();

        let storms = state.storms_data.unwrap();
        assert_eq!(storms[0].classification.label(Locale::English), "Hurricane");
        assert_eq!(state.synthesis.as_deref(), Some("Hurricane Test is active."));
        assert_eq!(sink.events_of_type("step.started").len(), 2);
    }

    #[tokio::test]
    async fn test_feed_failure_aborts() {
        let mut source = MockStormSource::new();
        source
            .expect_active_storms()
            .returning(|| Err(UpstreamError::status("nhc-storm-feed", 503)));
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().times(0);

        let pipeline = build_pipeline(
            Arc::new(source),
            Arc::new(generator),
            Locale::Portuguese,
            Arc::new(NoOpEventSink),
        )
        .unwrap();

        let err = pipeline
            .invoke([("question", FieldValue::from("x"))])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatherflowError::StepFailed { ref step, source: StepError::Upstream(_) } if step == "fetch"
        ));
    }
}
