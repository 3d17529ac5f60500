//! # Dynaschema Core
//!
//! Domain types, traits, and error definitions for request-time GraphQL
//! schema selection. This crate has **no web framework dependencies**: it
//! defines the seams (how a request is classified, how a request context is
//! derived) that the gateway and the engine implement against.
//!
//! ## Design Philosophy
//!
//! Every pluggable behavior is a trait here:
//! - [`RequestClassifier`] maps a request to the name of the schema that must
//!   serve it
//! - [`ContextDeriver`] maps a request to the user fields of its execution
//!   context
//!
//! Closures plug into both seams ([`classifier_fn`], or any
//! `Fn(&Parts) -> ContextFields` for contexts), so simple setups need no
//! boilerplate.

pub mod context;
pub mod error;
pub mod strategy;

// Re-export key types at crate root for ergonomics
pub use context::{ContextDeriver, ContextFields, HeaderContext};
pub use error::{Error, RegistryError, Result, RoutingError};
pub use strategy::{
    Constraint, FnClassifier, HeaderClassifier, RequestClassifier, StrategyDescriptor, classifier_fn,
};

/// Path used by schemas registered without an explicit one.
pub const DEFAULT_PATH: &str = "/graphql";
