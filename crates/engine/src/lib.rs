//! GraphQL execution engine for dynaschema.
//!
//! One [`Engine`] owns one schema: its validated SDL, its resolver map and
//! its persisted queries. Engines never share type registries, so the same
//! type or field name in two schemas cannot collide.
//!
//! Parsing and validation are delegated to `apollo-compiler`; execution walks
//! the validated operation and awaits user resolvers, completing values
//! against the schema types with GraphQL null propagation.

pub mod context;
pub mod engine;
pub mod error;
mod execute;
mod input;
pub mod persisted;
pub mod request;
pub mod resolver;
pub mod response;

pub use context::{RequestContext, ResponseHandle, ResponseParts};
pub use engine::{Engine, PreparedOperation};
pub use error::{Classification, EngineError, FieldError};
pub use persisted::PersistedQueries;
pub use request::GraphQLRequest;
pub use resolver::{FieldInfo, Resolver, ResolverCall, ResolverMap};
pub use response::{GraphQLError, GraphQLResponse, Location, PathSegment};

/// JSON object as used for variables, extensions and response data.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;
