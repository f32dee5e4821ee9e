//! Ollama daemon client.
//!
//! Covers the availability check, model listing, streaming model downloads and
//! streaming generation. Every response body except `/api/tags` is NDJSON.

use super::llm::{LlmResponse, TextGenerator};
use super::{http, ndjson};
use crate::config::OllamaSettings;
use crate::errors::{ConfigError, UpstreamError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const SERVICE: &str = "ollama";

/// A locally available model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OllamaModel {
    /// Model tag, e.g. `gemma2:2b`.
    pub name: String,
    /// Size on disk in bytes.
    #[serde(default)]
    pub size: Option<u64>,
    /// Last modification timestamp as reported by the daemon.
    #[serde(default)]
    pub modified_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct PullLine {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateLine {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for a single Ollama daemon.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    host: String,
    model: String,
    check_timeout: Duration,
    generate_timeout: Duration,
    pull_timeout: Duration,
}

impl OllamaClient {
    /// Creates a client from settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a timeout setting is invalid.
    pub fn new(settings: &OllamaSettings, client: reqwest::Client) -> Result<Self, ConfigError> {
        Ok(Self {
            client,
            host: settings.host.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            check_timeout: settings.check_timeout()?,
            generate_timeout: settings.generate_timeout()?,
            pull_timeout: settings.pull_timeout()?,
        })
    }

    /// Sets the model used by [`TextGenerator::generate`].
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Returns the daemon base URL.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the default model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.host)
    }

    /// Checks that `/api/tags` answers.
    ///
    /// Returns `false` on any failure, including the check timeout.
    pub async fn is_available(&self) -> bool {
        let result = self
            .client
            .get(self.url("/api/tags"))
            .timeout(self.check_timeout)
            .send()
            .await;

        match result {
            Ok(response) if response.status() == reqwest::StatusCode::OK => true,
            Ok(response) => {
                debug!(status = response.status().as_u16(), "Ollama availability check rejected");
                false
            }
            Err(e) => {
                debug!(error = %e, timeout = e.is_timeout(), "Ollama availability check failed");
                false
            }
        }
    }

    /// Lists locally available models.
    pub async fn list_models(&self) -> Result<Vec<OllamaModel>, UpstreamError> {
        let tags: TagsResponse =
            http::get_json(SERVICE, self.client.get(self.url("/api/tags"))).await?;
        Ok(tags.models)
    }

    /// Returns true if `model` is available locally.
    pub async fn model_exists(&self, model: &str) -> Result<bool, UpstreamError> {
        Ok(self.list_models().await?.iter().any(|m| m.name == model))
    }

    /// Downloads `model`, passing each status line to `on_status`.
    ///
    /// # Errors
    ///
    /// Fails if the request fails or the daemon streams an error line.
    pub async fn pull_model<F>(&self, model: &str, mut on_status: F) -> Result<(), UpstreamError>
    where
        F: FnMut(&str),
    {
        info!(model, "Pulling Ollama model");
        let request = self
            .client
            .post(self.url("/api/pull"))
            .timeout(self.pull_timeout)
            .json(&json!({ "name": model }));
        let response = http::send(SERVICE, request).await?;

        ndjson::for_each_line(SERVICE, response, |line: PullLine| {
            if let Some(error) = line.error {
                on_status(&error);
                return Err(UpstreamError::service(SERVICE, error));
            }
            if let Some(status) = line.status {
                on_status(&status);
            }
            Ok(ControlFlow::Continue(()))
        })
        .await
    }

    /// Streams a generation, passing each chunk to `on_chunk`.
    ///
    /// Generation stops at the daemon's `done` line or as soon as `on_chunk`
    /// returns [`ControlFlow::Break`]. The returned response holds the text
    /// received so far.
    pub async fn generate_stream<F>(
        &self,
        model: &str,
        prompt: &str,
        mut on_chunk: F,
    ) -> Result<LlmResponse, UpstreamError>
    where
        F: FnMut(&str) -> ControlFlow<()>,
    {
        let request = self
            .client
            .post(self.url("/api/generate"))
            .timeout(self.generate_timeout)
            .json(&json!({ "model": model, "prompt": prompt }));

        let start = Instant::now();
        let response = http::send(SERVICE, request).await?;

        let mut result = LlmResponse::new(String::new(), model, SERVICE);
        ndjson::for_each_line(SERVICE, response, |line: GenerateLine| {
            if let Some(error) = line.error {
                return Err(UpstreamError::service(SERVICE, error));
            }
            let mut flow = ControlFlow::Continue(());
            if let Some(chunk) = line.response.filter(|c| !c.is_empty()) {
                result.content.push_str(&chunk);
                flow = on_chunk(&chunk);
            }
            if line.done {
                result.finish_reason = line.done_reason;
                result.input_tokens = line.prompt_eval_count;
                result.output_tokens = line.eval_count;
                return Ok(ControlFlow::Break(()));
            }
            Ok(flow)
        })
        .await?;

        result.latency_ms = Some(start.elapsed().as_secs_f64() * 1000.0);
        Ok(result)
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<LlmResponse, UpstreamError> {
        self.generate_stream(&self.model, prompt, |_| ControlFlow::Continue(()))
            .await
    }
}

/// Outcome of [`smoke_test`].
#[derive(Debug, Clone, PartialEq)]
pub enum SmokeTest {
    /// The daemon did not answer the availability check; nothing else was attempted.
    Unavailable,
    /// The daemon answered and the model replied.
    Replied {
        /// True if the model had to be downloaded first.
        pulled: bool,
        /// The model's reply.
        response: LlmResponse,
    },
}

/// Checks the daemon, downloads `model` if needed and sends a test prompt.
///
/// Stops without further calls if the availability check fails.
pub async fn smoke_test<F>(
    client: &OllamaClient,
    model: &str,
    prompt: &str,
    on_pull_status: F,
) -> Result<SmokeTest, UpstreamError>
where
    F: FnMut(&str),
{
    if !client.is_available().await {
        warn!(host = client.host(), "Ollama is not reachable");
        return Ok(SmokeTest::Unavailable);
    }

    let pulled = if client.model_exists(model).await? {
        false
    } else {
        client.pull_model(model, on_pull_status).await?;
        true
    };

    let response = client
        .generate_stream(model, prompt, |_| ControlFlow::Continue(()))
        .await?;
    Ok(SmokeTest::Replied { pulled, response })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OllamaClient {
        let settings = OllamaSettings {
            host: server.uri(),
            check_timeout_seconds: 0.2,
            ..Default::default()
        };
        OllamaClient::new(&settings, reqwest::Client::new()).unwrap()
    }

    fn tags(names: &[&str]) -> serde_json::Value {
        json!({
            "models": names.iter().map(|n| json!({"name": n, "size": 1_600_000_000u64})).collect::<Vec<_>>()
        })
    }

    async fn mount_generate(server: &MockServer, expected: u64) {
        let body = concat!(
            "{\"model\":\"gemma2:2b\",\"response\":\"Olá\",\"done\":false}\n",
            "{\"model\":\"gemma2:2b\",\"response\":\" Mundo\",\"done\":false}\n",
            "{\"model\":\"gemma2:2b\",\"response\":\"\",\"done\":true,\"done_reason\":\"stop\",",
            "\"prompt_eval_count\":11,\"eval_count\":2}\n",
        );
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(expected)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_availability_check_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tags(&[])))
            .mount(&server)
            .await;

        assert!(client(&server).is_available().await);
    }

    #[tokio::test]
    async fn test_check_timeout_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(tags(&[]))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        assert!(!client(&server).is_available().await);
    }

    #[tokio::test]
    async fn test_tags_error_status_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(!client(&server).is_available().await);
    }

    #[tokio::test]
    async fn test_model_exists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tags(&["gemma2:2b", "llama3:8b"])))
            .mount(&server)
            .await;

        let client = client(&server);
        assert!(client.model_exists("gemma2:2b").await.unwrap());
        assert!(!client.model_exists("mistral").await.unwrap());
    }

    #[tokio::test]
    async fn test_pull_reports_status_lines() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/pull"))
            .and(body_json(json!({"name": "gemma2:2b"})))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "{\"status\":\"pulling manifest\"}\n{\"status\":\"verifying sha256 digest\"}\n{\"status\":\"success\"}\n",
            ))
            .mount(&server)
            .await;

        let mut statuses = Vec::new();
        client(&server)
            .pull_model("gemma2:2b", |s| statuses.push(s.to_string()))
            .await
            .unwrap();

        assert_eq!(statuses, vec!["pulling manifest", "verifying sha256 digest", "success"]);
    }

    #[tokio::test]
    async fn test_pull_error_line() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/pull"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "{\"status\":\"pulling manifest\"}\n{\"error\":\"pull model manifest: file does not exist\"}\n",
            ))
            .mount(&server)
            .await;

        let err = client(&server).pull_model("nope", |_| {}).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Service { .. }));
    }

    #[tokio::test]
    async fn test_generate_collects_chunks() {
        let server = MockServer::start().await;
        mount_generate(&server, 1).await;

        let response = client(&server).generate("Diga 'Olá Mundo'").await.unwrap();
        assert_eq!(response.content, "Olá Mundo");
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
        assert_eq!(response.total_tokens(), 13);
    }

    #[tokio::test]
    async fn test_generate_stream_can_stop_early() {
        let server = MockServer::start().await;
        mount_generate(&server, 1).await;

        let response = client(&server)
            .generate_stream("gemma2:2b", "q", |_| ControlFlow::Break(()))
            .await
            .unwrap();
        assert_eq!(response.content, "Olá");
    }

    #[tokio::test]
    async fn test_smoke_test_stops_when_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = smoke_test(&client(&server), "gemma2:2b", "q", |_| {}).await.unwrap();
        assert_eq!(outcome, SmokeTest::Unavailable);
    }

    #[tokio::test]
    async fn test_smoke_test_pulls_missing_model() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tags(&[])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/pull"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"status\":\"success\"}\n"))
            .expect(1)
            .mount(&server)
            .await;
        mount_generate(&server, 1).await;

        let outcome = smoke_test(&client(&server), "gemma2:2b", "q", |_| {}).await.unwrap();
        match outcome {
            SmokeTest::Replied { pulled, response } => {
                assert!(pulled);
                assert_eq!(response.content, "Olá Mundo");
            }
            SmokeTest::Unavailable => panic!("expected a reply"),
        }
    }
}
