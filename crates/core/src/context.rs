//! Context derivation — the user-supplied half of a request context.
//!
//! A [`ContextDeriver`] produces the fields resolvers can read for one
//! request. The gateway merges them with transport handles; derivers never
//! see those handles.

use async_trait::async_trait;
use http::HeaderName;
use http::request::Parts;
use serde_json::Value;

/// User fields of a request context.
pub type ContextFields = serde_json::Map<String, Value>;

/// Derives request-scoped context fields. Called once per matched request.
#[async_trait]
pub trait ContextDeriver: Send + Sync {
    async fn derive(&self, request: &Parts) -> ContextFields;
}

#[async_trait]
impl<F> ContextDeriver for F
where
    F: Fn(&Parts) -> ContextFields + Send + Sync,
{
    async fn derive(&self, request: &Parts) -> ContextFields {
        (self)(request)
    }
}

/// Copies selected request headers into context fields.
///
/// Numeric and boolean header values become JSON numbers and booleans, so
/// `additional-add: 3` is readable as an integer.
#[derive(Debug, Clone, Default)]
pub struct HeaderContext {
    mappings: Vec<(HeaderName, String)>,
}

impl HeaderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward `header` as context field `key`.
    pub fn forward(mut self, header: HeaderName, key: impl Into<String>) -> Self {
        self.mappings.push((header, key.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

#[async_trait]
impl ContextDeriver for HeaderContext {
    async fn derive(&self, request: &Parts) -> ContextFields {
        let mut fields = ContextFields::new();
        for (header, key) in &self.mappings {
            let Some(raw) = request.headers.get(header).and_then(|v| v.to_str().ok()) else {
                continue;
            };
            fields.insert(key.clone(), header_value(raw));
        }
        fields
    }
}

fn header_value(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(v @ (Value::Number(_) | Value::Bool(_))) => v,
        _ => Value::String(raw.to_string()),
    }
}
