//! Builds the per-request [`RequestContext`] handed to resolvers.

use std::sync::Arc;

use dynaschema_core::{ContextDeriver, ContextFields};
use dynaschema_engine::{Engine, RequestContext};
use http::request::Parts;

/// Runs the optional user deriver and attaches transport handles.
#[derive(Clone, Default)]
pub struct ContextBridge {
    deriver: Option<Arc<dyn ContextDeriver>>,
}

impl ContextBridge {
    pub fn new(deriver: Option<Arc<dyn ContextDeriver>>) -> Self {
        Self { deriver }
    }

    pub fn is_configured(&self) -> bool {
        self.deriver.is_some()
    }

    /// A fresh context for one matched request.
    pub async fn build(&self, request: &Parts, engine: Arc<Engine>) -> RequestContext {
        let fields = match &self.deriver {
            Some(deriver) => deriver.derive(request).await,
            None => ContextFields::new(),
        };
        RequestContext::new(fields, engine)
    }
}

impl std::fmt::Debug for ContextBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBridge")
            .field("configured", &self.is_configured())
            .finish()
    }
}
