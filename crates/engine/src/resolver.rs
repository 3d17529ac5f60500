//! Field resolvers and the per-schema resolver map.
//!
//! A field without a registered resolver falls back to reading the
//! same-named key of its parent object.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::JsonMap;
use crate::context::RequestContext;
use crate::error::FieldError;
use crate::response::PathSegment;

/// Where in the operation a resolver is being called.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub parent_type: String,
    pub field_name: String,
    pub path: Vec<PathSegment>,
}

/// Everything a resolver receives for one field invocation.
#[derive(Debug, Clone)]
pub struct ResolverCall {
    /// Parent value; `null` for root fields unless a root value is provided.
    pub parent: Value,
    /// Coerced arguments, defaults applied.
    pub args: JsonMap,
    pub context: RequestContext,
    pub info: FieldInfo,
}

impl ResolverCall {
    /// Deserialize argument `name`. A missing argument reads as `null`.
    pub fn arg<T: DeserializeOwned>(&self, name: &str) -> Result<T, FieldError> {
        let value = self.args.get(name).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|e| FieldError::new(format!("Invalid argument '{name}': {e}")))
    }
}

/// Produces the value of one field.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, call: ResolverCall) -> Result<Value, FieldError>;
}

#[async_trait]
impl<F, Fut> Resolver for F
where
    F: Fn(ResolverCall) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, FieldError>> + Send,
{
    async fn resolve(&self, call: ResolverCall) -> Result<Value, FieldError> {
        (self)(call).await
    }
}

/// Resolvers keyed by type name, then field name.
#[derive(Clone, Default)]
pub struct ResolverMap {
    types: HashMap<String, HashMap<String, Arc<dyn Resolver>>>,
}

impl ResolverMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`ResolverMap::insert`].
    pub fn field(
        mut self,
        type_name: impl Into<String>,
        field: impl Into<String>,
        resolver: impl Resolver + 'static,
    ) -> Self {
        self.insert(type_name, field, Arc::new(resolver));
        self
    }

    pub fn insert(
        &mut self,
        type_name: impl Into<String>,
        field: impl Into<String>,
        resolver: Arc<dyn Resolver>,
    ) {
        self.types
            .entry(type_name.into())
            .or_default()
            .insert(field.into(), resolver);
    }

    pub fn get(&self, type_name: &str, field: &str) -> Option<&Arc<dyn Resolver>> {
        self.types.get(type_name)?.get(field)
    }

    /// All `(type, field)` pairs with a resolver.
    pub fn targets(&self) -> impl Iterator<Item = (&str, &str)> {
        self.types.iter().flat_map(|(type_name, fields)| {
            fields
                .keys()
                .map(move |field| (type_name.as_str(), field.as_str()))
        })
    }

    pub fn len(&self) -> usize {
        self.types.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ResolverMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut targets: Vec<String> = self.targets().map(|(t, f)| format!("{t}.{f}")).collect();
        targets.sort();
        f.debug_struct("ResolverMap").field("targets", &targets).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn map_registers_and_lists_targets() {
        let map = ResolverMap::new()
            .field("Query", "add", |_call: ResolverCall| async { Ok::<_, FieldError>(json!(1)) })
            .field("Query", "sub", |_call: ResolverCall| async { Ok::<_, FieldError>(json!(2)) })
            .field("Mutation", "reset", |_call: ResolverCall| async { Ok::<_, FieldError>(json!(true)) });

        assert_eq!(map.len(), 3);
        assert!(map.get("Query", "add").is_some());
        assert!(map.get("Query", "missing").is_none());

        let mut targets: Vec<_> = map.targets().collect();
        targets.sort();
        assert_eq!(
            targets,
            vec![("Mutation", "reset"), ("Query", "add"), ("Query", "sub")]
        );
    }
}
