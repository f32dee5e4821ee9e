//! Application configuration.
//!
//! Built once at process start (usually from the environment) and passed by
//! reference to whatever needs it.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Environment variable holding the OpenAI API key.
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
/// Environment variable holding the OpenAI organization id.
pub const OPENAI_ORG_ID: &str = "OPENAI_ORG_ID";
/// Environment variable holding the OpenAI project id.
pub const OPENAI_PROJECT_ID: &str = "OPENAI_PROJECT_ID";
/// Environment variable holding the Ollama base URL.
pub const OLLAMA_HOST: &str = "OLLAMA_HOST";

/// Language used for labels, prompts and fixed messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Locale {
    /// Brazilian Portuguese.
    #[default]
    #[serde(rename = "pt")]
    Portuguese,
    /// English.
    #[serde(rename = "en")]
    English,
}

impl FromStr for Locale {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pt" | "pt-br" | "portuguese" => Ok(Self::Portuguese),
            "en" | "en-us" | "english" => Ok(Self::English),
            other => Err(ConfigError::InvalidValue {
                name: "locale".to_string(),
                message: format!("unsupported locale '{other}'"),
            }),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// OpenAI settings.
    #[serde(default)]
    pub openai: OpenAiSettings,
    /// Ollama settings.
    #[serde(default)]
    pub ollama: OllamaSettings,
    /// Data source settings.
    #[serde(default)]
    pub sources: SourceSettings,
    /// Shared HTTP client settings.
    #[serde(default)]
    pub http: HttpSettings,
    /// Output language.
    #[serde(default)]
    pub locale: Locale,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through a variable lookup function.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();
        config.openai.api_key = get(OPENAI_API_KEY);
        config.openai.organization_id = get(OPENAI_ORG_ID);
        config.openai.project_id = get(OPENAI_PROJECT_ID);

        if let Some(host) = get(OLLAMA_HOST) {
            config.ollama.host = normalize_base_url(OLLAMA_HOST, &host)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks every timeout setting.
    ///
    /// Configuration deserialized from elsewhere should be validated before
    /// clients are built from it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.openai.timeout()?;
        self.ollama.check_timeout()?;
        self.ollama.generate_timeout()?;
        self.ollama.pull_timeout()?;
        self.http.timeout()?;
        Ok(())
    }

    /// Sets the output language.
    #[must_use]
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|e| ConfigError::InvalidValue {
        name: name.to_string(),
        message: format!("{value} is not a valid number of seconds ({e})"),
    })
}

fn normalize_base_url(name: &str, value: &str) -> Result<String, ConfigError> {
    let value = if value.contains("://") {
        value.to_string()
    } else {
        format!("http://{value}")
    };
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("'{value}' is not an http(s) URL"),
        });
    }
    Ok(value.trim_end_matches('/').to_string())
}

/// OpenAI chat completion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiSettings {
    /// API key.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Organization id, sent as `OpenAI-Organization`.
    #[serde(default)]
    pub organization_id: Option<String>,
    /// Project id, sent as `OpenAI-Project`.
    #[serde(default)]
    pub project_id: Option<String>,
    /// API base URL.
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    /// Model identifier.
    #[serde(default = "default_openai_model")]
    pub model: String,
    /// Request timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: f64,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout() -> f64 {
    120.0
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            organization_id: None,
            project_id: None,
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            timeout_seconds: default_llm_timeout(),
        }
    }
}

impl OpenAiSettings {
    /// Returns the API key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVar`] if no key is configured.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .ok_or(ConfigError::MissingVar(OPENAI_API_KEY))
    }

    /// Gets the timeout as a Duration.
    ///
    /// # Errors
    ///
    /// Fails if the value is negative, not finite or out of range.
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        seconds("openai.timeout_seconds", self.timeout_seconds)
    }
}

/// Ollama daemon settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaSettings {
    /// Base URL of the daemon.
    #[serde(default = "default_ollama_host")]
    pub host: String,
    /// Model used by the smoke test.
    #[serde(default = "default_ollama_model")]
    pub model: String,
    /// Timeout of the availability check in seconds.
    #[serde(default = "default_check_timeout")]
    pub check_timeout_seconds: f64,
    /// Timeout of generate requests in seconds.
    #[serde(default = "default_generate_timeout")]
    pub generate_timeout_seconds: f64,
    /// Timeout of a model download in seconds.
    #[serde(default = "default_pull_timeout")]
    pub pull_timeout_seconds: f64,
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "gemma2:2b".to_string()
}

fn default_check_timeout() -> f64 {
    2.0
}

fn default_generate_timeout() -> f64 {
    10.0
}

fn default_pull_timeout() -> f64 {
    1800.0
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_ollama_model(),
            check_timeout_seconds: default_check_timeout(),
            generate_timeout_seconds: default_generate_timeout(),
            pull_timeout_seconds: default_pull_timeout(),
        }
    }
}

impl OllamaSettings {
    /// Gets the availability check timeout as a Duration.
    ///
    /// # Errors
    ///
    /// Fails if the value is negative, not finite or out of range.
    pub fn check_timeout(&self) -> Result<Duration, ConfigError> {
        seconds("ollama.check_timeout_seconds", self.check_timeout_seconds)
    }

    /// Gets the generate timeout as a Duration.
    ///
    /// # Errors
    ///
    /// Fails if the value is negative, not finite or out of range.
    pub fn generate_timeout(&self) -> Result<Duration, ConfigError> {
        seconds("ollama.generate_timeout_seconds", self.generate_timeout_seconds)
    }

    /// Gets the pull timeout as a Duration.
    ///
    /// # Errors
    ///
    /// Fails if the value is negative, not finite or out of range.
    pub fn pull_timeout(&self) -> Result<Duration, ConfigError> {
        seconds("ollama.pull_timeout_seconds", self.pull_timeout_seconds)
    }
}

/// Data source endpoints and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSettings {
    /// URL of the active storms feed.
    #[serde(default = "default_storm_feed_url")]
    pub storm_feed_url: String,
    /// Wikipedia language edition.
    #[serde(default = "default_wikipedia_lang")]
    pub wikipedia_lang: String,
    /// Overrides the MediaWiki API URL derived from the language.
    #[serde(default)]
    pub wikipedia_api_url: Option<String>,
    /// Number of Wikipedia pages to load per query.
    #[serde(default = "default_wikipedia_top_k")]
    pub wikipedia_top_k: usize,
    /// Maximum characters kept per Wikipedia document.
    #[serde(default = "default_max_chars")]
    pub wikipedia_max_chars: usize,
    /// arXiv query API URL.
    #[serde(default = "default_arxiv_api_url")]
    pub arxiv_api_url: String,
    /// Number of arXiv entries per query.
    #[serde(default = "default_arxiv_max_results")]
    pub arxiv_max_results: usize,
    /// Maximum characters kept per arXiv document.
    #[serde(default = "default_max_chars")]
    pub arxiv_max_chars: usize,
}

fn default_storm_feed_url() -> String {
    "https://www.nhc.noaa.gov/CurrentStorms.json".to_string()
}

fn default_wikipedia_lang() -> String {
    "pt".to_string()
}

fn default_wikipedia_top_k() -> usize {
    2
}

fn default_max_chars() -> usize {
    4000
}

fn default_arxiv_api_url() -> String {
    "https://export.arxiv.org/api/query".to_string()
}

fn default_arxiv_max_results() -> usize {
    3
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            storm_feed_url: default_storm_feed_url(),
            wikipedia_lang: default_wikipedia_lang(),
            wikipedia_api_url: None,
            wikipedia_top_k: default_wikipedia_top_k(),
            wikipedia_max_chars: default_max_chars(),
            arxiv_api_url: default_arxiv_api_url(),
            arxiv_max_results: default_arxiv_max_results(),
            arxiv_max_chars: default_max_chars(),
        }
    }
}

impl SourceSettings {
    /// Returns the MediaWiki API URL for the configured language.
    #[must_use]
    pub fn wikipedia_api_url(&self) -> String {
        self.wikipedia_api_url.clone().unwrap_or_else(|| {
            format!("https://{}.wikipedia.org/w/api.php", self.wikipedia_lang)
        })
    }
}

/// Shared HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Request timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: f64,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_http_timeout() -> f64 {
    30.0
}

fn default_user_agent() -> String {
    concat!("gatherflow/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpSettings {
    /// Gets the timeout as a Duration.
    ///
    /// # Errors
    ///
    /// Fails if the value is negative, not finite or out of range.
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        seconds("http.timeout_seconds", self.timeout_seconds)
    }

    /// Builds a client with this user agent and timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn client(&self) -> Result<reqwest::Client, ConfigError> {
        self.client_with_timeout(self.timeout()?)
    }

    /// Builds a client with this user agent and a custom timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn client_with_timeout(&self, timeout: Duration) -> Result<reqwest::Client, ConfigError> {
        reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))
    }
}
