//! Engine error taxonomy and its HTTP classification.
//!
//! Request-level failures ([`EngineError`]) stop execution before any
//! resolver runs. Field-level failures ([`FieldError`]) are raised by
//! resolvers and end up in the response `errors` array.

use http::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::JsonMap;
use crate::response::{GraphQLError, PathSegment};

/// A request the engine refused to execute.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Unparseable query. Reported like a validation failure; the detailed
    /// errors carry `GRAPHQL_PARSE_FAILED`.
    #[error("GraphQL validation error")]
    Syntax(Vec<GraphQLError>),

    #[error("GraphQL validation error")]
    Validation(Vec<GraphQLError>),

    #[error("Invalid variables")]
    InvalidVariables(Vec<GraphQLError>),

    #[error("Invalid GraphQL request: {0}")]
    InvalidRequest(String),

    #[error("Unknown operation: {0}")]
    OperationNotFound(String),

    #[error("PersistedQueryNotFound")]
    PersistedQueryNotFound(String),

    #[error("Provided sha256Hash does not match query")]
    PersistedQueryHashMismatch,

    #[error("{operation} operations are not allowed over {method}")]
    MethodNotAllowed { operation: String, method: String },
}

/// How an [`EngineError`] is reported over HTTP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl EngineError {
    /// Map this error to an HTTP status, a stable code and a message.
    pub fn classify(&self) -> Classification {
        let (status, code) = match self {
            EngineError::Syntax(_) | EngineError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "GRAPHQL_VALIDATION_FAILED")
            }
            EngineError::InvalidVariables(_) => (StatusCode::BAD_REQUEST, "BAD_USER_INPUT"),
            EngineError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            EngineError::OperationNotFound(_) => (StatusCode::BAD_REQUEST, "OPERATION_NOT_FOUND"),
            EngineError::PersistedQueryNotFound(_) => {
                (StatusCode::BAD_REQUEST, "PERSISTED_QUERY_NOT_FOUND")
            }
            EngineError::PersistedQueryHashMismatch => {
                (StatusCode::BAD_REQUEST, "PERSISTED_QUERY_HASH_MISMATCH")
            }
            EngineError::MethodNotAllowed { .. } => {
                (StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED")
            }
        };
        Classification {
            status,
            code,
            message: self.to_string(),
        }
    }

    /// Detailed GraphQL errors for the response body.
    pub fn errors(&self) -> Vec<GraphQLError> {
        match self {
            EngineError::Syntax(errors)
            | EngineError::Validation(errors)
            | EngineError::InvalidVariables(errors) => errors.clone(),
            other => {
                let Classification { code, message, .. } = other.classify();
                vec![GraphQLError::new(message).with_extension("code", code)]
            }
        }
    }
}

/// An error raised while resolving a single field.
#[derive(Debug, Clone, Default, PartialEq, Error)]
#[error("{message}")]
pub struct FieldError {
    pub message: String,
    pub extensions: JsonMap,
}

impl FieldError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            extensions: JsonMap::new(),
        }
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    pub(crate) fn into_graphql_error(self, path: Vec<PathSegment>) -> GraphQLError {
        GraphQLError {
            message: self.message,
            locations: Vec::new(),
            path: Some(path),
            extensions: self.extensions,
        }
    }
}

impl From<String> for FieldError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for FieldError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<serde_json::Error> for FieldError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(error.to_string())
    }
}
