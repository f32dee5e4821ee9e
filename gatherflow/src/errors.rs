//! Error types for gatherflow.
//!
//! Build-time problems (schema and ordering contracts) surface as
//! [`PipelineValidationError`] carrying a [`ContractErrorInfo`] code, runtime
//! problems as [`StepError`] wrapped in [`GatherflowError::StepFailed`].

use crate::state::FieldKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for gatherflow operations.
#[derive(Debug, Error)]
pub enum GatherflowError {
    /// A state value referenced an undeclared field or had the wrong kind.
    #[error("{0}")]
    Schema(#[from] SchemaError),

    /// A pipeline failed its construction-time checks.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A step failed and its failure policy did not allow a fallback.
    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        /// The failing step.
        step: String,
        /// The underlying step error.
        #[source]
        source: StepError,
    },

    /// An external service call failed outside of any step.
    #[error("{0}")]
    Upstream(#[from] UpstreamError),

    /// Configuration was missing or invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl GatherflowError {
    /// Creates a step failure error.
    #[must_use]
    pub fn step_failed(step: impl Into<String>, source: StepError) -> Self {
        Self::StepFailed {
            step: step.into(),
            source,
        }
    }
}

/// Errors raised when state values do not match the declared schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The field is not part of the state schema.
    #[error("Field '{field}' is not declared in the '{schema}' state schema")]
    UndeclaredField {
        /// The schema name.
        schema: String,
        /// The offending field.
        field: String,
    },

    /// The value kind does not match the declared field kind.
    #[error("Field '{field}' expects a {expected} value, got {actual}")]
    KindMismatch {
        /// The field name.
        field: String,
        /// The declared kind.
        expected: FieldKind,
        /// The kind that was supplied.
        actual: FieldKind,
    },

    /// A structured value could not be decoded into the field type.
    #[error("Field '{field}' holds an invalid value: {message}")]
    InvalidValue {
        /// The field name.
        field: String,
        /// Decoder message.
        message: String,
    },

    /// A field was read before anything set it.
    #[error("Field '{field}' must be set before step '{step}' runs")]
    MissingField {
        /// The step that needed the field.
        step: String,
        /// The unset field.
        field: String,
    },

    /// A step finished without setting a field it declared.
    #[error("Step '{step}' declared field '{field}' but left it unset")]
    NotProduced {
        /// The step.
        step: String,
        /// The declared field.
        field: String,
    },

    /// A step wrote a field it did not declare.
    #[error("Step '{step}' wrote field '{field}' which it does not declare")]
    UndeclaredOutput {
        /// The step.
        step: String,
        /// The field written.
        field: String,
    },
}

impl SchemaError {
    /// Creates an undeclared field error.
    #[must_use]
    pub fn undeclared(schema: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UndeclaredField {
            schema: schema.into(),
            field: field.into(),
        }
    }

    /// Creates a missing field error.
    #[must_use]
    pub fn missing(step: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            step: step.into(),
            field: field.into(),
        }
    }
}

/// Errors returned by a step body.
///
/// The pipeline runner inspects the variant to decide whether a configured
/// fallback may replace the failure. Only [`StepError::Upstream`] is ever
/// substitutable.
#[derive(Debug, Error)]
pub enum StepError {
    /// An external service could not be reached or answered with an error.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// The step received an argument it cannot work with.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The state did not satisfy the step contract.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl StepError {
    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Returns true if the failure came from an external service.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }
}

/// An external service call failed.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The request could not be sent or the connection failed or timed out.
    #[error("{service} request failed: {source}")]
    Request {
        /// Service name.
        service: String,
        /// Transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status.
    #[error("{service} returned HTTP {status}")]
    Status {
        /// Service name.
        service: String,
        /// HTTP status code.
        status: u16,
    },

    /// The response body could not be decoded.
    #[error("{service} response could not be decoded: {message}")]
    Decode {
        /// Service name.
        service: String,
        /// Decoder message.
        message: String,
    },

    /// The service reported an error inside a successful response.
    #[error("{service} reported an error: {message}")]
    Service {
        /// Service name.
        service: String,
        /// Error message from the service.
        message: String,
    },
}

impl UpstreamError {
    /// Creates a request error.
    #[must_use]
    pub fn request(service: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Request {
            service: service.into(),
            source,
        }
    }

    /// Creates a status error.
    #[must_use]
    pub fn status(service: impl Into<String>, status: u16) -> Self {
        Self::Status {
            service: service.into(),
            status,
        }
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Creates a service error.
    #[must_use]
    pub fn service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Returns true if the failure was a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request { source, .. } if source.is_timeout())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("Missing required environment variable {0}")]
    MissingVar(&'static str),

    /// A value could not be parsed.
    #[error("Invalid value for {name}: {message}")]
    InvalidValue {
        /// Setting name.
        name: String,
        /// Parse message.
        message: String,
    },

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONTRACT-UNSATISFIED_FIELD").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when pipeline construction fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The steps involved in the error.
    pub steps: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            steps: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the steps involved.
    #[must_use]
    pub fn with_steps(mut self, steps: Vec<String>) -> Self {
        self.steps = steps;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

impl From<SchemaError> for PipelineValidationError {
    fn from(err: SchemaError) -> Self {
        let steps = match &err {
            SchemaError::MissingField { step, .. }
            | SchemaError::NotProduced { step, .. }
            | SchemaError::UndeclaredOutput { step, .. } => vec![step.clone()],
            _ => Vec::new(),
        };
        PipelineValidationError {
            message: err.to_string(),
            steps,
            error_info: Some(
                ContractErrorInfo::new("CONTRACT-SCHEMA", err.to_string())
                    .with_fix_hint("Declare the field in the state schema or fix the field name."),
            ),
        }
    }
}
