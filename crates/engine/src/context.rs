//! Per-request context handed to every resolver.
//!
//! Holds the user fields derived for the request, a handle for shaping the
//! HTTP reply, and the engine that is executing the operation.

use std::sync::{Arc, Mutex, MutexGuard};

use dynaschema_core::ContextFields;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::engine::Engine;

/// Headers and status a resolver asked to put on the reply.
#[derive(Debug, Clone, Default)]
pub struct ResponseParts {
    pub headers: HeaderMap,
    pub status: Option<StatusCode>,
}

/// Shared, mutable view of the reply being built for one request.
#[derive(Debug, Clone, Default)]
pub struct ResponseHandle {
    parts: Arc<Mutex<ResponseParts>>,
}

impl ResponseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ResponseParts> {
        self.parts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set a header, replacing any earlier value.
    pub fn insert_header(&self, name: HeaderName, value: HeaderValue) {
        self.lock().headers.insert(name, value);
    }

    pub fn append_header(&self, name: HeaderName, value: HeaderValue) {
        self.lock().headers.append(name, value);
    }

    /// Override the HTTP status of a successful reply.
    pub fn set_status(&self, status: StatusCode) {
        self.lock().status = Some(status);
    }

    /// Current headers and status.
    pub fn snapshot(&self) -> ResponseParts {
        self.lock().clone()
    }
}

struct ContextInner {
    fields: ContextFields,
    response: ResponseHandle,
    engine: Arc<Engine>,
}

/// Context for one request. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct RequestContext {
    inner: Arc<ContextInner>,
}

impl RequestContext {
    pub fn new(fields: ContextFields, engine: Arc<Engine>) -> Self {
        Self::with_response(fields, engine, ResponseHandle::new())
    }

    pub fn with_response(fields: ContextFields, engine: Arc<Engine>, response: ResponseHandle) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                fields,
                response,
                engine,
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.inner.fields.get(key)
    }

    /// Deserialize a context field. `None` when absent or of the wrong shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn fields(&self) -> &ContextFields {
        &self.inner.fields
    }

    pub fn response(&self) -> &ResponseHandle {
        &self.inner.response
    }

    /// The engine executing this request.
    pub fn engine(&self) -> &Arc<Engine> {
        &self.inner.engine
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("fields", &self.inner.fields)
            .field("engine", &self.inner.engine.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolverMap;
    use serde_json::json;

    fn engine() -> Arc<Engine> {
        Arc::new(Engine::build("test", "type Query { ok: Boolean }", ResolverMap::new()).unwrap())
    }

    #[test]
    fn typed_field_access() {
        let mut fields = ContextFields::new();
        fields.insert("additionalAdd".into(), json!(3));
        fields.insert("user".into(), json!("ada"));
        let ctx = RequestContext::new(fields, engine());

        assert_eq!(ctx.get_as::<i64>("additionalAdd"), Some(3));
        assert_eq!(ctx.get_as::<i64>("user"), None);
        assert_eq!(ctx.get_as::<String>("missing"), None);
        assert_eq!(ctx.engine().name(), "test");
    }

    #[test]
    fn response_handle_is_shared_between_clones() {
        let ctx = RequestContext::new(ContextFields::new(), engine());
        let clone = ctx.clone();
        clone.response().set_status(StatusCode::CREATED);
        clone.response().insert_header(
            HeaderName::from_static("x-schema"),
            HeaderValue::from_static("test"),
        );

        let parts = ctx.response().snapshot();
        assert_eq!(parts.status, Some(StatusCode::CREATED));
        assert_eq!(parts.headers["x-schema"], "test");
    }
}
