//! Wikipedia page summaries through the MediaWiki API.

use super::{limit_joined, truncate_chars, validate_query, Retriever};
use crate::config::SourceSettings;
use crate::errors::{StepError, UpstreamError};
use crate::providers::http;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

const SERVICE: &str = "wikipedia";
const MAX_QUERY_CHARS: usize = 300;

#[derive(Debug, Deserialize)]
struct ApiResponse<Q> {
    #[serde(default)]
    query: Option<Q>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Debug, Default, Deserialize)]
struct PagesQuery {
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    title: String,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    missing: bool,
}

impl<Q> ApiResponse<Q> {
    fn into_query(self) -> Result<Option<Q>, UpstreamError> {
        if let Some(error) = self.error {
            return Err(UpstreamError::service(
                SERVICE,
                format!("{}: {}", error.code, error.info),
            ));
        }
        Ok(self.query)
    }
}

/// Searches one Wikipedia language edition and returns page summaries.
///
/// Each document reads `Page: <title>\nSummary: <intro text>`. The documents
/// joined by a blank line never exceed the configured character budget.
#[derive(Debug, Clone)]
pub struct WikipediaRetriever {
    client: reqwest::Client,
    api_url: String,
    top_k: usize,
    max_chars: usize,
}

impl WikipediaRetriever {
    /// Creates a retriever from settings.
    #[must_use]
    pub fn new(settings: &SourceSettings, client: reqwest::Client) -> Self {
        Self {
            client,
            api_url: settings.wikipedia_api_url(),
            top_k: settings.wikipedia_top_k,
            max_chars: settings.wikipedia_max_chars,
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<String>, UpstreamError> {
        let limit = self.top_k.to_string();
        let request = self.client.get(&self.api_url).query(&[
            ("action", "query"),
            ("list", "search"),
            ("srsearch", query),
            ("srlimit", limit.as_str()),
            ("format", "json"),
            ("formatversion", "2"),
        ]);
        let response: ApiResponse<SearchQuery> = http::get_json(SERVICE, request).await?;
        Ok(response
            .into_query()?
            .map(|q| q.search.into_iter().map(|hit| hit.title).collect())
            .unwrap_or_default())
    }

    async fn summary(&self, title: &str) -> Result<Option<Page>, UpstreamError> {
        let request = self.client.get(&self.api_url).query(&[
            ("action", "query"),
            ("prop", "extracts"),
            ("exintro", "1"),
            ("explaintext", "1"),
            ("redirects", "1"),
            ("titles", title),
            ("format", "json"),
            ("formatversion", "2"),
        ]);
        let response: ApiResponse<PagesQuery> = http::get_json(SERVICE, request).await?;
        Ok(response
            .into_query()?
            .and_then(|q| q.pages.into_iter().find(|page| !page.missing)))
    }
}

#[async_trait]
impl Retriever for WikipediaRetriever {
    fn source(&self) -> &'static str {
        SERVICE
    }

    async fn retrieve(&self, query: &str) -> Result<Vec<String>, StepError> {
        let query = truncate_chars(validate_query(SERVICE, query)?, MAX_QUERY_CHARS);

        let titles = self.search(&query).await?;
        debug!(query = %query, hits = titles.len(), "Wikipedia search finished");

        let mut documents = Vec::with_capacity(titles.len());
        for title in titles.iter().take(self.top_k) {
            let Some(page) = self.summary(title).await? else {
                continue;
            };
            let text = format!(
                "Page: {}\nSummary: {}",
                page.title,
                page.extract.unwrap_or_default().trim()
            );
            documents.push(text);
        }
        Ok(limit_joined(documents, self.max_chars))
    }
}
