//! Error types for the dynaschema domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant: registry errors are
//! fatal at startup, routing errors are per request and recoverable.

use http::StatusCode;
use thiserror::Error;

/// The top-level error type for all dynaschema operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Registration errors ---
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    // --- Routing errors ---
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Startup-time configuration failures. Any of these aborts registration
/// entirely; no partially built registry is ever served.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("No schemas registered")]
    NoSchemas,

    #[error("No strategy configured: a request classifier is required")]
    MissingStrategy,

    #[error("Duplicate schema name: {0}")]
    DuplicateSchema(String),

    #[error("Duplicate route: constraint '{constraint}' is already registered at {path}")]
    DuplicateRoute { path: String, constraint: String },

    #[error("Invalid path for schema '{schema}': {path} (must start with '/', no ':' or '*' segments, balanced '{{}}')")]
    InvalidPath { schema: String, path: String },

    #[error("Invalid header name: {0}")]
    InvalidHeader(String),

    #[error("Default schema '{0}' is not registered")]
    UnknownDefaultSchema(String),

    #[error("Invalid schema '{schema}': {reason}")]
    InvalidSchema { schema: String, reason: String },

    #[error("Resolver for unknown field {type_name}.{field} in schema '{schema}'")]
    UnknownResolverTarget {
        schema: String,
        type_name: String,
        field: String,
    },
}

/// Per-request routing failures. A request that fails routing never reaches
/// an engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("No GraphQL route registered at {path}")]
    NoRoute { path: String },

    #[error("No schema at {path} matches derived constraint {derived:?}")]
    ConstraintMismatch { path: String, derived: Vec<String> },

    #[error("Strategy selected no schema for {path} and no default schema is configured")]
    Unselected { path: String },
}

impl RoutingError {
    /// HTTP status this failure maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            RoutingError::NoRoute { .. } => StatusCode::NOT_FOUND,
            RoutingError::ConstraintMismatch { .. } | RoutingError::Unselected { .. } => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    /// Stable machine-readable code for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            RoutingError::NoRoute { .. } => "ROUTE_NOT_FOUND",
            RoutingError::ConstraintMismatch { .. } => "SCHEMA_CONSTRAINT_MISMATCH",
            RoutingError::Unselected { .. } => "SCHEMA_NOT_SELECTED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_error_displays_correctly() {
        let err = Error::Registry(RegistryError::DuplicateRoute {
            path: "/graphql".into(),
            constraint: "schema1".into(),
        });
        assert!(err.to_string().contains("/graphql"));
        assert!(err.to_string().contains("schema1"));
    }

    #[test]
    fn routing_error_maps_to_client_status() {
        let mismatch = RoutingError::ConstraintMismatch {
            path: "/graphql".into(),
            derived: vec!["schema3".into()],
        };
        assert_eq!(mismatch.status(), StatusCode::BAD_REQUEST);
        assert_eq!(mismatch.code(), "SCHEMA_CONSTRAINT_MISMATCH");
        assert!(mismatch.to_string().contains("schema3"));

        let missing = RoutingError::NoRoute {
            path: "/nope".into(),
        };
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
