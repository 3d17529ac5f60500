//! Constraint router: picks exactly one engine per request.
//!
//! Several schemas may share a path. Each route carries its schema name as
//! a constraint, and the strategy derives the constraint a request must
//! satisfy.

use std::collections::HashMap;

use dynaschema_core::{Constraint, RegistryError, RoutingError, StrategyDescriptor};
use http::request::Parts;
use tracing::debug;

use crate::registry::EngineId;

/// A registered (path, constraint) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredRoute {
    pub path: String,
    pub constraint: String,
    pub engine: EngineId,
}

#[derive(Debug)]
pub struct ConstraintRouter {
    routes: HashMap<String, Vec<RegisteredRoute>>,
    paths: Vec<String>,
    strategy: StrategyDescriptor,
    default_schema: Option<String>,
}

impl ConstraintRouter {
    pub fn new(strategy: StrategyDescriptor) -> Self {
        Self {
            routes: HashMap::new(),
            paths: Vec::new(),
            strategy,
            default_schema: None,
        }
    }

    /// Schema used when the strategy derives nothing.
    pub fn with_default_schema(mut self, schema: Option<String>) -> Self {
        self.default_schema = schema;
        self
    }

    pub fn strategy(&self) -> &StrategyDescriptor {
        &self.strategy
    }

    /// Add a route. Each (path, constraint) pair may be registered once.
    pub fn register(
        &mut self,
        path: impl Into<String>,
        constraint: impl Into<String>,
        engine: EngineId,
    ) -> Result<(), RegistryError> {
        let path = path.into();
        let constraint = constraint.into();

        if !self.routes.contains_key(&path) {
            self.paths.push(path.clone());
        }
        let routes = self.routes.entry(path.clone()).or_default();
        if routes.iter().any(|route| route.constraint == constraint) {
            return Err(RegistryError::DuplicateRoute { path, constraint });
        }

        debug!(path = %path, constraint = %constraint, "Registered route");
        routes.push(RegisteredRoute {
            path,
            constraint,
            engine,
        });
        Ok(())
    }

    /// Distinct paths, in first-registration order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn routes_at(&self, path: &str) -> &[RegisteredRoute] {
        self.routes.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    /// Route a request: derive its constraint, then match.
    pub async fn resolve(&self, path: &str, request: &Parts) -> Result<EngineId, RoutingError> {
        if !self.routes.contains_key(path) {
            return Err(RoutingError::NoRoute {
                path: path.to_string(),
            });
        }
        let derived = self.strategy.derive(request).await;
        self.match_constraint(path, &derived)
    }

    /// Match an already derived constraint against the routes at `path`.
    pub fn match_constraint(
        &self,
        path: &str,
        derived: &Constraint,
    ) -> Result<EngineId, RoutingError> {
        let candidates = self.routes_at(path);
        if candidates.is_empty() {
            return Err(RoutingError::NoRoute {
                path: path.to_string(),
            });
        }

        let find = |value: &str| {
            candidates
                .iter()
                .find(|route| route.constraint == value)
                .map(|route| route.engine)
        };

        if !derived.is_derived() {
            let Some(default) = &self.default_schema else {
                return Err(RoutingError::Unselected {
                    path: path.to_string(),
                });
            };
            return find(default.as_str()).ok_or_else(|| RoutingError::ConstraintMismatch {
                path: path.to_string(),
                derived: vec![default.clone()],
            });
        }

        if let Some(engine) = derived.values().iter().find_map(|value| find(value.as_str())) {
            return Ok(engine);
        }

        if self.strategy.must_match_when_derived() {
            Err(RoutingError::ConstraintMismatch {
                path: path.to_string(),
                derived: derived.values().to_vec(),
            })
        } else {
            Ok(candidates[0].engine)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{SchemaEntry, SchemaRegistry};
    use dynaschema_engine::ResolverMap;

    fn ids() -> (EngineId, EngineId, EngineId) {
        let sdl = "type Query { ok: Boolean }";
        let registry = SchemaRegistry::build(
            vec![
                SchemaEntry::new("schema1", sdl, ResolverMap::new()),
                SchemaEntry::new("schema2", sdl, ResolverMap::new()),
                SchemaEntry::new("admin", sdl, ResolverMap::new()),
            ],
            "/graphql",
        )
        .unwrap();
        (
            registry.id_of("schema1").unwrap(),
            registry.id_of("schema2").unwrap(),
            registry.id_of("admin").unwrap(),
        )
    }

    fn header_strategy() -> StrategyDescriptor {
        StrategyDescriptor::from_fn(|req: &Parts| {
            req.headers
                .get("schema")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
    }

    fn router(strategy: StrategyDescriptor) -> ConstraintRouter {
        let (one, two, admin) = ids();
        let mut router = ConstraintRouter::new(strategy);
        router.register("/graphql", "schema1", one).unwrap();
        router.register("/graphql", "schema2", two).unwrap();
        router.register("/admin", "admin", admin).unwrap();
        router
    }

    fn request(schema: Option<&str>) -> Parts {
        let mut builder = http::Request::builder().uri("/graphql");
        if let Some(schema) = schema {
            builder = builder.header("schema", schema);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn derived_constraint_selects_route() {
        let (one, two, _) = ids();
        let router = router(header_strategy());
        assert_eq!(router.resolve("/graphql", &request(Some("schema1"))).await, Ok(one));
        assert_eq!(router.resolve("/graphql", &request(Some("schema2"))).await, Ok(two));
    }

    #[tokio::test]
    async fn routes_are_isolated_by_path() {
        let router = router(header_strategy());
        let err = router
            .resolve("/admin", &request(Some("schema1")))
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::ConstraintMismatch { .. }));

        let err = router.resolve("/nope", &request(Some("schema1"))).await.unwrap_err();
        assert!(matches!(err, RoutingError::NoRoute { .. }));
    }

    #[test]
    fn unknown_constraint_is_a_mismatch() {
        let router = router(header_strategy());
        let err = router
            .match_constraint("/graphql", &Constraint::from("schema3"))
            .unwrap_err();
        assert_eq!(
            err,
            RoutingError::ConstraintMismatch {
                path: "/graphql".into(),
                derived: vec!["schema3".into()],
            }
        );
    }

    #[test]
    fn ordered_candidates_pick_first_match() {
        let (_, two, _) = ids();
        let router = router(header_strategy());
        let derived = Constraint::from(vec!["schema9", "schema2", "schema1"]);
        assert_eq!(router.match_constraint("/graphql", &derived), Ok(two));
    }

    #[test]
    fn lenient_strategy_falls_back_to_first_route() {
        let (one, _, _) = ids();
        let router = router(header_strategy().with_must_match_when_derived(false));
        assert_eq!(
            router.match_constraint("/graphql", &Constraint::from("schema3")),
            Ok(one)
        );
    }

    #[test]
    fn no_derivation_uses_default_or_fails() {
        let (_, two, _) = ids();
        let strict = router(header_strategy());
        assert!(matches!(
            strict.match_constraint("/graphql", &Constraint::None),
            Err(RoutingError::Unselected { .. })
        ));

        let with_default = router(header_strategy()).with_default_schema(Some("schema2".into()));
        assert_eq!(with_default.match_constraint("/graphql", &Constraint::None), Ok(two));
        assert!(matches!(
            with_default.match_constraint("/admin", &Constraint::None),
            Err(RoutingError::ConstraintMismatch { .. })
        ));
    }

    #[test]
    fn duplicate_route_rejected() {
        let (one, two, _) = ids();
        let mut router = ConstraintRouter::new(header_strategy());
        router.register("/graphql", "schema1", one).unwrap();
        let err = router.register("/graphql", "schema1", two).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateRoute { .. }));
        router.register("/other", "schema1", two).unwrap();
        assert_eq!(router.paths().collect::<Vec<_>>(), vec!["/graphql", "/other"]);
    }
}
