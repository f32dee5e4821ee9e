//! In-memory collaborators.

use crate::errors::{StepError, UpstreamError};
use crate::hurricane::{StormRecord, StormSource};
use crate::providers::{LlmResponse, TextGenerator};
use crate::retrieval::Retriever;
use async_trait::async_trait;
use parking_lot::Mutex;

/// A retriever that returns the same documents for every query.
#[derive(Debug)]
pub struct StaticRetriever {
    source: &'static str,
    documents: Vec<String>,
    queries: Mutex<Vec<String>>,
}

impl StaticRetriever {
    /// Creates a retriever answering with `documents`.
    #[must_use]
    pub fn new(source: &'static str, documents: Vec<String>) -> Self {
        Self {
            source,
            documents,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Returns the queries received so far.
    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    fn source(&self) -> &'static str {
        self.source
    }

    async fn retrieve(&self, query: &str) -> Result<Vec<String>, StepError> {
        self.queries.lock().push(query.to_string());
        Ok(self.documents.clone())
    }
}

/// A retriever whose source is always unreachable.
#[derive(Debug)]
pub struct FailingRetriever {
    source: &'static str,
    status: u16,
}

impl FailingRetriever {
    /// Creates a retriever failing with HTTP `status`.
    #[must_use]
    pub fn new(source: &'static str, status: u16) -> Self {
        Self { source, status }
    }
}

#[async_trait]
impl Retriever for FailingRetriever {
    fn source(&self) -> &'static str {
        self.source
    }

    async fn retrieve(&self, _query: &str) -> Result<Vec<String>, StepError> {
        Err(UpstreamError::status(self.source, self.status).into())
    }
}

/// A storm source with a fixed storm list.
#[derive(Debug, Default)]
pub struct StaticStormSource {
    storms: Vec<StormRecord>,
}

impl StaticStormSource {
    /// Creates a source returning `storms`.
    #[must_use]
    pub fn new(storms: Vec<StormRecord>) -> Self {
        Self { storms }
    }
}

#[async_trait]
impl StormSource for StaticStormSource {
    async fn active_storms(&self) -> Result<Vec<StormRecord>, UpstreamError> {
        Ok(self.storms.clone())
    }
}

/// A generator that records prompts and answers with a fixed reply.
#[derive(Debug)]
pub struct RecordingGenerator {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    /// Creates a generator answering every prompt with `reply`.
    #[must_use]
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Returns the prompts received so far.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl TextGenerator for RecordingGenerator {
    async fn generate(&self, prompt: &str) -> Result<LlmResponse, UpstreamError> {
        self.prompts.lock().push(prompt.to_string());
        Ok(LlmResponse::new(self.reply.clone(), "recording", "test"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Locale;
    use crate::events::NoOpEventSink;
    use crate::state::FieldValue;
    use crate::{hurricane, research};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_research_with_fakes() {
        let arxiv = Arc::new(StaticRetriever::new("arxiv", vec!["paper".to_string()]));
        let generator = Arc::new(RecordingGenerator::new("answer"));

        let pipeline = research::build_pipeline(
            arxiv.clone(),
            Arc::new(FailingRetriever::new("wikipedia", 503)),
            generator.clone(),
            Locale::Portuguese,
            Arc::new(NoOpEventSink),
        )
        .unwrap();

        let state = pipeline
            .invoke([("question", FieldValue::from(" fótons "))])
            .await
            .unwrap();

        assert_eq!(state.synthesis.as_deref(), Some("answer"));
        assert_eq!(arxiv.queries(), vec!["fótons".to_string()]);
        assert_eq!(generator.call_count(), 1);
        assert!(generator.prompts()[0].contains("Não foi possível obter resultados da Wikipedia."));
    }

    #[tokio::test]
    async fn test_hurricane_with_fakes() {
        let generator = Arc::new(RecordingGenerator::new("report"));
        let pipeline = hurricane::build_pipeline(
            Arc::new(StaticStormSource::default()),
            generator.clone(),
            Locale::English,
            Arc::new(NoOpEventSink),
        )
        .unwrap();

        let state = pipeline
            .invoke([("question", FieldValue::from("x"))])
            .await
            .unwrap();

        assert_eq!(
            state.synthesis.as_deref(),
            Some(hurricane::no_active_storms(Locale::English))
        );
        assert_eq!(generator.call_count(), 0);
    }
}
