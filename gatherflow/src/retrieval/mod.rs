//! Free-text document retrieval.
//!
//! Retrievers turn a query into plain-text documents. A blank query fails
//! with [`StepError::InvalidArgument`] before any request is made.

mod arxiv;
mod wikipedia;

pub use arxiv::ArxivRetriever;
pub use wikipedia::WikipediaRetriever;

use crate::errors::StepError;
use async_trait::async_trait;

/// Looks up documents relevant to a query.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Short source name used in logs and messages.
    fn source(&self) -> &'static str;

    /// Returns documents for `query`, most relevant first.
    async fn retrieve(&self, query: &str) -> Result<Vec<String>, StepError>;
}

/// Trims `query` and rejects it if nothing is left.
pub(crate) fn validate_query<'a>(source: &str, query: &'a str) -> Result<&'a str, StepError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(StepError::invalid_argument(format!(
            "{source} query must not be empty"
        )));
    }
    Ok(query)
}

/// Keeps at most `max_chars` characters of `text`.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Separator used when documents are joined into a prompt.
pub(crate) const DOCUMENT_SEPARATOR: &str = "\n\n";

/// Caps the documents so that joining them with [`DOCUMENT_SEPARATOR`] yields
/// at most `max_chars` characters.
///
/// The last document that fits partially is cut; the rest are dropped.
pub(crate) fn limit_joined(documents: Vec<String>, max_chars: usize) -> Vec<String> {
    let separator = DOCUMENT_SEPARATOR.chars().count();
    let mut remaining = max_chars;
    let mut kept = Vec::with_capacity(documents.len());

    for document in documents {
        let gap = if kept.is_empty() { 0 } else { separator };
        if remaining <= gap {
            break;
        }
        remaining -= gap;

        let len = document.chars().count();
        if len <= remaining {
            remaining -= len;
            kept.push(document);
        } else {
            kept.push(truncate_chars(&document, remaining));
            break;
        }
    }
    kept
}
