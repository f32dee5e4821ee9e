//! Research pipeline steps.

use super::{ResearchState, ResearchUpdate};
use crate::config::Locale;
use crate::errors::StepError;
use crate::providers::TextGenerator;
use crate::retrieval::{validate_query, Retriever};
use crate::state::require;
use crate::steps::Step;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Which state field a search step fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTarget {
    /// Writes `arxiv_docs`.
    Arxiv,
    /// Writes `wiki_docs`.
    Wikipedia,
}

impl SearchTarget {
    /// Step name.
    #[must_use]
    pub fn step_name(self) -> &'static str {
        match self {
            Self::Arxiv => "arxiv_search",
            Self::Wikipedia => "wiki_search",
        }
    }

    /// Field written by the step.
    #[must_use]
    pub fn field(self) -> &'static str {
        match self {
            Self::Arxiv => "arxiv_docs",
            Self::Wikipedia => "wiki_docs",
        }
    }

    /// Text stored when the source cannot be reached.
    #[must_use]
    pub fn fallback_text(self, locale: Locale) -> &'static str {
        match (self, locale) {
            (Self::Arxiv, Locale::Portuguese) => "Não foi possível obter resultados do arXiv.",
            (Self::Arxiv, Locale::English) => "Could not retrieve results from arXiv.",
            (Self::Wikipedia, Locale::Portuguese) => {
                "Não foi possível obter resultados da Wikipedia."
            }
            (Self::Wikipedia, Locale::English) => "Could not retrieve results from Wikipedia.",
        }
    }

    fn no_results_text(self, locale: Locale) -> &'static str {
        match (self, locale) {
            (Self::Arxiv, Locale::Portuguese) => "Nenhum artigo encontrado no arXiv.",
            (Self::Arxiv, Locale::English) => "No good Arxiv Result was found",
            (Self::Wikipedia, Locale::Portuguese) => "Nenhuma página encontrada na Wikipedia.",
            (Self::Wikipedia, Locale::English) => "No good Wikipedia Search Result was found",
        }
    }

    /// Builds an update that sets only this target's field.
    #[must_use]
    pub fn update(self, docs: Vec<String>) -> ResearchUpdate {
        match self {
            Self::Arxiv => ResearchUpdate {
                arxiv_docs: Some(docs),
                ..Default::default()
            },
            Self::Wikipedia => ResearchUpdate {
                wiki_docs: Some(docs),
                ..Default::default()
            },
        }
    }

    /// Builds the fallback update.
    #[must_use]
    pub fn fallback_update(self, locale: Locale) -> ResearchUpdate {
        self.update(vec![self.fallback_text(locale).to_string()])
    }
}

/// Looks up the question in one retrieval source.
pub struct SearchStep {
    target: SearchTarget,
    produces: [&'static str; 1],
    retriever: Arc<dyn Retriever>,
    locale: Locale,
}

impl SearchStep {
    /// Creates a search step writing to `target`.
    #[must_use]
    pub fn new(target: SearchTarget, retriever: Arc<dyn Retriever>, locale: Locale) -> Self {
        Self {
            target,
            produces: [target.field()],
            retriever,
            locale,
        }
    }
}

impl std::fmt::Debug for SearchStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchStep")
            .field("target", &self.target)
            .field("source", &self.retriever.source())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Step<ResearchState> for SearchStep {
    fn name(&self) -> &str {
        self.target.step_name()
    }

    fn requires(&self) -> &[&'static str] {
        &["question"]
    }

    fn produces(&self) -> &[&'static str] {
        &self.produces
    }

    fn progress_message(&self, state: &ResearchState) -> Option<String> {
        let question = state.question.as_deref().unwrap_or_default().trim();
        Some(match (self.target, self.locale) {
            (SearchTarget::Arxiv, Locale::Portuguese) => {
                format!("Buscando artigos no arXiv sobre: {question}")
            }
            (SearchTarget::Arxiv, Locale::English) => {
                format!("Searching arXiv papers about: {question}")
            }
            (SearchTarget::Wikipedia, Locale::Portuguese) => {
                format!("Buscando contexto na Wikipedia: {question}")
            }
            (SearchTarget::Wikipedia, Locale::English) => {
                format!("Searching Wikipedia for context: {question}")
            }
        })
    }

    async fn run(&self, state: &ResearchState) -> Result<ResearchUpdate, StepError> {
        let question = require(&state.question, self.name(), "question")?;
        let query = validate_query(self.retriever.source(), question)?;

        let mut docs = self.retriever.retrieve(query).await?;
        info!(
            source = self.retriever.source(),
            field = self.target.field(),
            documents = docs.len(),
            "Retrieval finished"
        );
        if docs.is_empty() {
            docs.push(self.target.no_results_text(self.locale).to_string());
        }
        Ok(self.target.update(docs))
    }
}

/// Writes the final answer from the question and all retrieved documents.
pub struct SynthesizeAnswer {
    generator: Arc<dyn TextGenerator>,
    locale: Locale,
}

impl SynthesizeAnswer {
    /// Step name.
    pub const NAME: &'static str = "synthesis";

    /// Creates the step.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, locale: Locale) -> Self {
        Self { generator, locale }
    }
}

impl std::fmt::Debug for SynthesizeAnswer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesizeAnswer")
            .field("locale", &self.locale)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Step<ResearchState> for SynthesizeAnswer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn requires(&self) -> &[&'static str] {
        &["question", "arxiv_docs", "wiki_docs"]
    }

    fn produces(&self) -> &[&'static str] {
        &["synthesis"]
    }

    fn progress_message(&self, _state: &ResearchState) -> Option<String> {
        Some(
            match self.locale {
                Locale::Portuguese => "Gerando síntese final...",
                Locale::English => "Generating final synthesis...",
            }
            .to_string(),
        )
    }

    async fn run(&self, state: &ResearchState) -> Result<ResearchUpdate, StepError> {
        let question = require(&state.question, Self::NAME, "question")?;
        let arxiv = require(&state.arxiv_docs, Self::NAME, "arxiv_docs")?;
        let wiki = require(&state.wiki_docs, Self::NAME, "wiki_docs")?;

        let sources: Vec<&str> = arxiv.iter().chain(wiki).map(String::as_str).collect();
        let prompt = answer_prompt(question, &sources, self.locale);
        let response = self.generator.generate(&prompt).await?;

        Ok(ResearchUpdate {
            synthesis: Some(response.content),
            ..Default::default()
        })
    }
}

/// Builds the synthesis prompt. Sources are separated by blank lines.
pub fn answer_prompt(question: &str, sources: &[&str], locale: Locale) -> String {
    let context = sources.join("\n\n");
    match locale {
        Locale::Portuguese => format!(
            "Você é um pesquisador científico.\n\
             Pergunta: {question}\n\
             Fontes:\n\
             {context}\n\n\
             Gere uma resposta clara, com ênfase em descobertas recentes, conceitos centrais \
             e implicações.\n"
        ),
        Locale::English => format!(
            "You are a scientific researcher.\n\
             Question: {question}\n\
             Sources:\n\
             {context}\n\n\
             Write a clear answer emphasizing recent findings, core concepts and implications.\n"
        ),
    }
}
