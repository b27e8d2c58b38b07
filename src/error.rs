//! Unified application error model and mapping helpers.
//! This module provides a common error enum used across the form engine and
//! the HTTP surface, along with mappers to HTTP statuses and to the
//! fractional problem codes clients key on.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// The request body was declared as something other than XML.
    UnsupportedFormat { format: String },
    /// The bytes did not parse as well-formed XML.
    MalformedDocument { raw_length: usize },
    /// The document parsed but a required identity field could not be located.
    MissingIdentity { field: String },
    /// The version registry rejected the candidate (xmlFormId, version) pair.
    DuplicateIdentity { fields: Vec<String>, values: Vec<String> },
    /// A lifecycle state outside the enumerated set was requested.
    InvalidState { value: String },
    NotFound { resource: String },
    Io { message: String },
    Internal { message: String },
}

impl AppError {
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        AppError::UnsupportedFormat { format: format.into() }
    }
    pub fn malformed(raw_length: usize) -> Self {
        AppError::MalformedDocument { raw_length }
    }
    pub fn missing_identity<S: Into<String>>(field: S) -> Self {
        AppError::MissingIdentity { field: field.into() }
    }
    pub fn duplicate(fields: Vec<String>, values: Vec<String>) -> Self {
        AppError::DuplicateIdentity { fields, values }
    }
    pub fn invalid_state<S: Into<String>>(value: S) -> Self {
        AppError::InvalidState { value: value.into() }
    }
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        AppError::NotFound { resource: resource.into() }
    }
    pub fn io<S: Into<String>>(msg: S) -> Self { AppError::Io { message: msg.into() } }
    pub fn internal<S: Into<String>>(msg: S) -> Self { AppError::Internal { message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UnsupportedFormat { .. } => 400,
            AppError::MalformedDocument { .. } => 400,
            AppError::MissingIdentity { .. } => 400,
            AppError::DuplicateIdentity { .. } => 400,
            AppError::InvalidState { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Io { .. } => 500,
            AppError::Internal { .. } => 500,
        }
    }

    /// Fractional problem code rendered at the boundary.
    ///
    /// MalformedDocument and MissingIdentity are distinct kinds internally but
    /// collapse to the same `400.2` code unless `strict_xml` is set, in which
    /// case malformed XML reports `400.1` with the raw input length. The
    /// collapse mirrors the absence of a real XML validator at the boundary.
    pub fn problem_code(&self, strict_xml: bool) -> &'static str {
        match self {
            AppError::UnsupportedFormat { .. } => "400.1",
            AppError::MalformedDocument { .. } => {
                if strict_xml { "400.1" } else { "400.2" }
            }
            AppError::MissingIdentity { .. } => "400.2",
            AppError::DuplicateIdentity { .. } => "400.5",
            AppError::InvalidState { .. } => "400.8",
            AppError::NotFound { .. } => "404.1",
            AppError::Io { .. } | AppError::Internal { .. } => "500.1",
        }
    }

    /// Structured details payload naming the offending fields and values.
    pub fn details(&self, strict_xml: bool) -> Value {
        match self {
            AppError::UnsupportedFormat { format } => json!({ "format": format }),
            AppError::MalformedDocument { raw_length } => {
                if strict_xml {
                    json!({ "format": "xml", "rawLength": raw_length })
                } else {
                    json!({ "field": "formId" })
                }
            }
            AppError::MissingIdentity { field } => json!({ "field": field }),
            AppError::DuplicateIdentity { fields, values } => {
                json!({ "fields": fields, "values": values })
            }
            AppError::InvalidState { value } => json!({ "value": value }),
            AppError::NotFound { resource } => json!({ "resource": resource }),
            AppError::Io { .. } | AppError::Internal { .. } => Value::Null,
        }
    }

    pub fn message(&self) -> String {
        match self {
            AppError::UnsupportedFormat { format } => {
                format!("Unsupported content format: {}", format)
            }
            AppError::MalformedDocument { .. } => "Input could not be parsed as XML.".into(),
            AppError::MissingIdentity { field } => {
                format!("Required field {} could not be found in the document.", field)
            }
            AppError::DuplicateIdentity { fields, values } => format!(
                "A form already exists with {} of {}.",
                fields.join(", "),
                values.join(", ")
            ),
            AppError::InvalidState { value } => format!("Unrecognized form state: {}", value),
            AppError::NotFound { resource } => format!("Could not find {}.", resource),
            AppError::Io { message } => message.clone(),
            AppError::Internal { message } => message.clone(),
        }
    }

    /// Full boundary body: `{code, message, details}`.
    pub fn body(&self, strict_xml: bool) -> Value {
        json!({
            "code": self.problem_code(strict_xml),
            "message": self.message(),
            "details": self.details(strict_xml),
        })
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.problem_code(false), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { message: err.to_string() }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io { message: err.to_string() }
    }
}
