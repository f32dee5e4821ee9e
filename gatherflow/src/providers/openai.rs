//! OpenAI chat completions client.

use super::http;
use super::llm::{LlmResponse, TextGenerator};
use crate::config::OpenAiSettings;
use crate::errors::{ConfigError, UpstreamError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

const SERVICE: &str = "openai";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Sends single-message prompts to `/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    organization_id: Option<String>,
    project_id: Option<String>,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiChat {
    /// Creates a client from settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVar`] when no API key is configured.
    pub fn new(settings: &OpenAiSettings, client: reqwest::Client) -> Result<Self, ConfigError> {
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.require_api_key()?.to_string(),
            organization_id: settings.organization_id.clone(),
            project_id: settings.project_id.clone(),
            model: settings.model.clone(),
            temperature: None,
        })
    }

    /// Sets the sampling temperature. Without it the provider default applies.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Returns the model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the configured temperature.
    #[must_use]
    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl TextGenerator for OpenAiChat {
    async fn generate(&self, prompt: &str) -> Result<LlmResponse, UpstreamError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let mut request = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body);
        if let Some(org) = &self.organization_id {
            request = request.header("OpenAI-Organization", org);
        }
        if let Some(project) = &self.project_id {
            request = request.header("OpenAI-Project", project);
        }

        debug!(
            model = self.model(),
            temperature = ?self.temperature(),
            prompt_chars = prompt.len(),
            "Sending chat completion"
        );
        let start = Instant::now();
        let completion: ChatCompletion = http::get_json(SERVICE, request).await?;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::service(SERVICE, "response contained no choices"))?;

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            model: completion.model.unwrap_or_else(|| self.model.clone()),
            provider: SERVICE.to_string(),
            input_tokens: completion.usage.as_ref().map(|u| u.prompt_tokens),
            output_tokens: completion.usage.as_ref().map(|u| u.completion_tokens),
            latency_ms: Some(latency_ms),
            finish_reason: choice.finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base_url: &str) -> OpenAiSettings {
        OpenAiSettings {
            api_key: Some("sk-test".to_string()),
            organization_id: Some("org-1".to_string()),
            project_id: Some("proj-1".to_string()),
            base_url: base_url.to_string(),
            ..Default::default()
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 9, "completion_tokens": 4, "total_tokens": 13}
        })
    }

    #[test]
    fn test_requires_api_key() {
        let err = OpenAiChat::new(&OpenAiSettings::default(), reqwest::Client::new()).unwrap_err();
        assert_eq!(err, ConfigError::MissingVar("OPENAI_API_KEY"));
    }

    #[test]
    fn test_model_and_temperature_from_settings() {
        let chat = OpenAiChat::new(&settings("http://localhost"), reqwest::Client::new()).unwrap();
        assert_eq!(chat.model(), OpenAiSettings::default().model);
        assert_eq!(chat.temperature(), None);

        let chat = chat.with_temperature(0.2);
        assert_eq!(chat.temperature(), Some(0.2));
    }

    #[tokio::test]
    async fn test_generate_sends_headers_and_temperature() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("OpenAI-Organization", "org-1"))
            .and(header("OpenAI-Project", "proj-1"))
            .and(body_json(json!({
                "model": "gpt-4o-mini",
                "messages": [{"role": "user", "content": "Diga 'Olá Mundo'"}],
                "temperature": 0.5
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Olá Mundo")))
            .expect(1)
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(&settings(&server.uri()), reqwest::Client::new())
            .unwrap()
            .with_temperature(0.5);
        let response = chat.generate("Diga 'Olá Mundo'").await.unwrap();

        assert_eq!(response.content, "Olá Mundo");
        assert_eq!(response.model, "gpt-4o-mini-2024-07-18");
        assert_eq!(response.total_tokens(), 13);
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn test_default_temperature_is_omitted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({
                "model": "gpt-4o-mini",
                "messages": [{"role": "user", "content": "q"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("a")))
            .expect(1)
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(&settings(&server.uri()), reqwest::Client::new()).unwrap();
        assert_eq!(chat.generate("q").await.unwrap().content, "a");
    }

    #[tokio::test]
    async fn test_unauthorized_is_upstream_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Incorrect API key provided"}
            })))
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(&settings(&server.uri()), reqwest::Client::new()).unwrap();
        let err = chat.generate("q").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let chat = OpenAiChat::new(&settings(&server.uri()), reqwest::Client::new()).unwrap();
        let err = chat.generate("q").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Service { .. }));
    }
}
