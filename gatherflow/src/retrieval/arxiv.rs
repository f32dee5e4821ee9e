//! arXiv paper summaries through the export API.

use super::{limit_joined, truncate_chars, validate_query, Retriever};
use crate::config::SourceSettings;
use crate::errors::{StepError, UpstreamError};
use crate::providers::http;
use async_trait::async_trait;
use regex::{Captures, Regex};
use std::sync::LazyLock;
use tracing::debug;

const SERVICE: &str = "arxiv";
const MAX_QUERY_CHARS: usize = 300;

/// One parsed Atom entry.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    id: String,
    published: String,
    title: String,
    authors: Vec<String>,
    summary: String,
}

impl Entry {
    fn is_error(&self) -> bool {
        self.id.contains("/api/errors")
    }

    fn to_document(&self) -> String {
        format!(
            "Published: {}\nTitle: {}\nAuthors: {}\nSummary: {}",
            self.published.get(..10).unwrap_or(&self.published),
            self.title,
            self.authors.join(", "),
            self.summary
        )
    }
}

static ENTRY: LazyLock<Regex> = LazyLock::new(|| tag_pattern("entry"));
static ID: LazyLock<Regex> = LazyLock::new(|| tag_pattern("id"));
static PUBLISHED: LazyLock<Regex> = LazyLock::new(|| tag_pattern("published"));
static TITLE: LazyLock<Regex> = LazyLock::new(|| tag_pattern("title"));
static SUMMARY: LazyLock<Regex> = LazyLock::new(|| tag_pattern("summary"));
static AUTHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<author>\s*<name>(.*?)</name>").expect("Invalid regex pattern"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex pattern"));
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#[xX]([0-9A-Fa-f]{1,6})|#([0-9]{1,7})|(lt|gt|quot|apos|amp));")
        .expect("Invalid regex pattern")
});

fn tag_pattern(name: &str) -> Regex {
    Regex::new(&format!(r"(?s)<{name}(?:\s[^>]*)?>(.*?)</{name}>")).expect("Invalid regex pattern")
}

/// Decodes XML character references in one pass.
///
/// References that do not name a valid character are left as they are.
fn unescape(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures<'_>| {
            let decoded = if let Some(hex) = caps.get(1) {
                u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = caps.get(2) {
                dec.as_str().parse().ok().and_then(char::from_u32)
            } else {
                match caps.get(3).map(|m| m.as_str()) {
                    Some("lt") => Some('<'),
                    Some("gt") => Some('>'),
                    Some("quot") => Some('"'),
                    Some("apos") => Some('\''),
                    Some("amp") => Some('&'),
                    _ => None,
                }
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn clean(raw: &str) -> String {
    unescape(WHITESPACE.replace_all(raw.trim(), " ").as_ref())
}

/// Extracts entries from an Atom feed.
fn parse_feed(feed: &str) -> Vec<Entry> {
    let capture = |re: &Regex, body: &str| {
        re.captures(body)
            .and_then(|c| c.get(1))
            .map(|m| clean(m.as_str()))
            .unwrap_or_default()
    };

    ENTRY
        .captures_iter(feed)
        .filter_map(|c| c.get(1))
        .map(|body| {
            let body = body.as_str();
            Entry {
                id: capture(&ID, body),
                published: capture(&PUBLISHED, body),
                title: capture(&TITLE, body),
                authors: AUTHOR
                    .captures_iter(body)
                    .filter_map(|c| c.get(1))
                    .map(|m| clean(m.as_str()))
                    .collect(),
                summary: capture(&SUMMARY, body),
            }
        })
        .collect()
}

/// Queries arXiv and returns one document per paper.
///
/// Each document lists `Published`, `Title`, `Authors` and `Summary`. The
/// documents joined by a blank line never exceed the configured character
/// budget.
#[derive(Debug, Clone)]
pub struct ArxivRetriever {
    client: reqwest::Client,
    api_url: String,
    max_results: usize,
    max_chars: usize,
}

impl ArxivRetriever {
    /// Creates a retriever from settings.
    #[must_use]
    pub fn new(settings: &SourceSettings, client: reqwest::Client) -> Self {
        Self {
            client,
            api_url: settings.arxiv_api_url.clone(),
            max_results: settings.arxiv_max_results,
            max_chars: settings.arxiv_max_chars,
        }
    }
}

#[async_trait]
impl Retriever for ArxivRetriever {
    fn source(&self) -> &'static str {
        SERVICE
    }

    async fn retrieve(&self, query: &str) -> Result<Vec<String>, StepError> {
        let query = truncate_chars(validate_query(SERVICE, query)?, MAX_QUERY_CHARS);

        let max_results = self.max_results.to_string();
        let request = self.client.get(&self.api_url).query(&[
            ("search_query", query.as_str()),
            ("start", "0"),
            ("max_results", max_results.as_str()),
        ]);
        let response = http::send(SERVICE, request).await?;
        let feed = http::read_text(SERVICE, response).await?;

        let entries = parse_feed(&feed);
        if let Some(error) = entries.iter().find(|e| e.is_error()) {
            return Err(UpstreamError::service(SERVICE, error.summary.clone()).into());
        }
        debug!(query = %query, entries = entries.len(), "arXiv query finished");

        let documents = entries
            .iter()
            .take(self.max_results)
            .map(Entry::to_document)
            .collect();
        Ok(limit_joined(documents, self.max_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: search_query=all:black holes</title>
  <entry>
    <id>http://arxiv.org/abs/2401.00001v1</id>
    <published>2024-01-02T18:59:59Z</published>
    <title>Black Hole
      Thermodynamics &amp; Information</title>
    <summary>  We revisit the information
  paradox.
    </summary>
    <author>
      <name>Ana Souza</name>
    </author>
    <author>
      <name>John Smith</name>
    </author>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2401.00002v2</id>
    <published>2023-12-30T10:00:00Z</published>
    <title>Shadows of &lt;Kerr&gt; Black Holes</title>
    <summary>Imaging results.</summary>
    <author><name>Li Wei</name></author>
  </entry>
</feed>"#;

    fn retriever(server: &MockServer, max_chars: usize) -> ArxivRetriever {
        let settings = SourceSettings {
            arxiv_api_url: format!("{}/api/query", server.uri()),
            arxiv_max_chars: max_chars,
            ..Default::default()
        };
        ArxivRetriever::new(&settings, reqwest::Client::new())
    }

    #[test]
    fn test_parse_feed() {
        let entries = parse_feed(FEED);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Black Hole Thermodynamics & Information");
        assert_eq!(entries[0].authors, vec!["Ana Souza", "John Smith"]);
        assert_eq!(entries[0].summary, "We revisit the information paradox.");
        assert_eq!(entries[1].title, "Shadows of <Kerr> Black Holes");
    }

    #[test]
    fn test_document_format() {
        let entries = parse_feed(FEED);
        assert_eq!(
            entries[0].to_document(),
            "Published: 2024-01-02\nTitle: Black Hole Thermodynamics & Information\n\
             Authors: Ana Souza, John Smith\nSummary: We revisit the information paradox."
        );
    }

    #[test]
    fn test_unescape_named_and_numeric_references() {
        assert_eq!(
            unescape("&lt;b&gt; &quot;x&quot; &apos;y&#39; caf&#233; &#x1F300; &#XE9;"),
            "<b> \"x\" 'y' café 🌀 é"
        );
    }

    #[test]
    fn test_unescape_is_single_pass() {
        assert_eq!(unescape("&amp;#233; &amp;lt;"), "&#233; &lt;");
    }

    #[test]
    fn test_unescape_keeps_invalid_references() {
        assert_eq!(unescape("&#xD800; &#1114112; &nbsp; & x"), "&#xD800; &#1114112; &nbsp; & x");
    }

    #[tokio::test]
    async fn test_budget_covers_joined_documents() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&server)
            .await;

        let first = parse_feed(FEED)[0].to_document();
        let budget = first.chars().count() + 2 + 9;
        let docs = retriever(&server, budget).retrieve("black holes").await.unwrap();

        assert_eq!(docs, vec![first, "Published".to_string()]);
    }

    #[tokio::test]
    async fn test_retrieve() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/query"))
            .and(query_param("search_query", "black holes"))
            .and(query_param("max_results", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .expect(1)
            .mount(&server)
            .await;

        let docs = retriever(&server, 4000).retrieve("black holes").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[1].starts_with("Published: 2023-12-30\nTitle: Shadows of <Kerr> Black Holes"));
    }

    #[tokio::test]
    async fn test_long_query_is_truncated() {
        let server = MockServer::start().await;
        let long = "q".repeat(400);
        Mock::given(method("GET"))
            .and(query_param("search_query", "q".repeat(300).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string("<feed></feed>"))
            .expect(1)
            .mount(&server)
            .await;

        assert!(retriever(&server, 4000).retrieve(&long).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_entry_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<feed><entry><id>http://arxiv.org/api/errors#incorrect_id_format</id>\
                 <title>Error</title><summary>incorrect id format</summary></entry></feed>",
            ))
            .mount(&server)
            .await;

        let err = retriever(&server, 4000).retrieve("x").await.unwrap_err();
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_blank_query_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = retriever(&server, 4000).retrieve("").await.unwrap_err();
        assert!(matches!(err, StepError::InvalidArgument(_)));
    }
}
