//! Field kinds and dynamically typed field values.

use crate::errors::SchemaError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The semantic type of a state field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// A single string.
    Text,
    /// A list of strings.
    TextList,
    /// A structured record or list of records.
    Structured,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::TextList => write!(f, "text list"),
            Self::Structured => write!(f, "structured"),
        }
    }
}

/// A field value supplied by name at the caller boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// A single string.
    Text(String),
    /// A list of strings.
    TextList(Vec<String>),
    /// A structured value.
    Structured(serde_json::Value),
}

impl FieldValue {
    /// Returns the kind of this value.
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Text(_) => FieldKind::Text,
            Self::TextList(_) => FieldKind::TextList,
            Self::Structured(_) => FieldKind::Structured,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        Self::TextList(value)
    }
}

/// A Rust type that can back a state field.
pub trait FieldType: Sized {
    /// The declared kind for fields of this type.
    const KIND: FieldKind;

    /// Converts a caller-supplied value into the field type.
    fn from_field_value(field: &str, value: FieldValue) -> Result<Self, SchemaError>;
}

fn mismatch(field: &str, expected: FieldKind, value: &FieldValue) -> SchemaError {
    SchemaError::KindMismatch {
        field: field.to_string(),
        expected,
        actual: value.kind(),
    }
}

impl FieldType for String {
    const KIND: FieldKind = FieldKind::Text;

    fn from_field_value(field: &str, value: FieldValue) -> Result<Self, SchemaError> {
        match value {
            FieldValue::Text(text) => Ok(text),
            other => Err(mismatch(field, Self::KIND, &other)),
        }
    }
}

impl FieldType for Vec<String> {
    const KIND: FieldKind = FieldKind::TextList;

    fn from_field_value(field: &str, value: FieldValue) -> Result<Self, SchemaError> {
        match value {
            FieldValue::TextList(items) => Ok(items),
            other => Err(mismatch(field, Self::KIND, &other)),
        }
    }
}

/// Decodes a [`FieldValue::Structured`] into `T`.
///
/// Used by [`FieldType`] implementations of record types.
pub fn decode_structured<T: DeserializeOwned>(
    field: &str,
    value: FieldValue,
) -> Result<T, SchemaError> {
    match value {
        FieldValue::Structured(json) => {
            serde_json::from_value(json).map_err(|e| SchemaError::InvalidValue {
                field: field.to_string(),
                message: e.to_string(),
            })
        }
        other => Err(mismatch(field, FieldKind::Structured, &other)),
    }
}
