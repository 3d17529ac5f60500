//! HTTP gateway for dynaschema.
//!
//! Serves several independently defined GraphQL schemas, possibly on the
//! same path, and picks the one that handles each request at request time:
//!
//! 1. the [`ConstraintRouter`] derives a constraint from the request through
//!    the configured strategy and matches it against the registered schemas
//! 2. the [`ContextBridge`] builds the request context for the chosen engine
//! 3. [`dispatch`] runs the operation and shapes the HTTP reply
//!
//! Built on Axum.

pub mod constraint;
pub mod context;
pub mod dispatch;
pub mod registry;

use std::sync::Arc;

use axum::extract::{MatchedPath, Request, State};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{MethodRouter, get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use dynaschema_core::{ContextDeriver, HeaderClassifier, HeaderContext, RegistryError, RoutingError, StrategyDescriptor};
use http::{HeaderName, StatusCode};
use http_body_util::LengthLimitError;
use serde::Serialize;
use tracing::{Instrument, info, info_span, warn};

pub use constraint::{ConstraintRouter, RegisteredRoute};
pub use context::ContextBridge;
pub use registry::{EngineId, SchemaEntry, SchemaRegistry, is_valid_path};

/// Default cap on request bodies: 1 MB.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

const HEALTH_PATH: &str = "/health";

/// Shared state behind every route.
struct Gateway {
    registry: SchemaRegistry,
    router: ConstraintRouter,
    bridge: ContextBridge,
    allow_get: bool,
    body_limit: usize,
    start_time: DateTime<Utc>,
}

/// A built set of schemas with their routing, ready to serve.
#[derive(Clone)]
pub struct DynamicSchema {
    gateway: Arc<Gateway>,
}

/// Collects schemas and settings for [`DynamicSchema`].
pub struct DynamicSchemaBuilder {
    entries: Vec<SchemaEntry>,
    strategy: Option<StrategyDescriptor>,
    context: Option<Arc<dyn ContextDeriver>>,
    default_schema: Option<String>,
    default_path: String,
    allow_get: bool,
    body_limit: usize,
}

impl Default for DynamicSchemaBuilder {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            strategy: None,
            context: None,
            default_schema: None,
            default_path: dynaschema_core::DEFAULT_PATH.to_string(),
            allow_get: true,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl DynamicSchemaBuilder {
    pub fn schema(mut self, entry: SchemaEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn schemas(mut self, entries: impl IntoIterator<Item = SchemaEntry>) -> Self {
        self.entries.extend(entries);
        self
    }

    /// The strategy that names the schema for each request. Required.
    pub fn strategy(mut self, strategy: StrategyDescriptor) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Derive user context fields for each matched request.
    pub fn context(mut self, deriver: impl ContextDeriver + 'static) -> Self {
        self.context = Some(Arc::new(deriver));
        self
    }

    /// Schema to use when the strategy names none.
    pub fn default_schema(mut self, name: impl Into<String>) -> Self {
        self.default_schema = Some(name.into());
        self
    }

    /// Path for schemas registered without one (`/graphql` unless set).
    pub fn default_path(mut self, path: impl Into<String>) -> Self {
        self.default_path = path.into();
        self
    }

    pub fn allow_get(mut self, allow: bool) -> Self {
        self.allow_get = allow;
        self
    }

    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Apply the `[routing]`, `[context]` and `[server]` settings: header
    /// strategy, header forwarding, default schema, path, GET and body limit.
    pub fn configure(mut self, config: &dynaschema_config::AppConfig) -> Result<Self, RegistryError> {
        let routing = &config.routing;
        let header = parse_header(&routing.schema_header)?;
        self.strategy = Some(
            StrategyDescriptor::new(HeaderClassifier::new(header))
                .with_must_match_when_derived(routing.must_match_when_derived),
        );
        self.default_schema = routing.default_schema.clone();
        self.default_path = routing.default_path.clone();
        self.allow_get = routing.allow_get;
        self.body_limit = config.server.body_limit;

        if !config.context.headers.is_empty() {
            let mut forward = HeaderContext::new();
            for (header, key) in &config.context.headers {
                forward = forward.forward(parse_header(header)?, key.clone());
            }
            self.context = Some(Arc::new(forward));
        }
        Ok(self)
    }

    /// Build every engine and register every route.
    ///
    /// Nothing is served unless the whole configuration is valid.
    pub fn build(self) -> Result<DynamicSchema, RegistryError> {
        let strategy = self.strategy.ok_or(RegistryError::MissingStrategy)?;
        if !registry::is_valid_path(&self.default_path) {
            return Err(RegistryError::InvalidPath {
                schema: "<default>".into(),
                path: self.default_path,
            });
        }

        let registry = SchemaRegistry::build(self.entries, &self.default_path)?;
        for (id, engine) in registry.iter() {
            if registry.path(id) == HEALTH_PATH {
                return Err(RegistryError::InvalidPath {
                    schema: engine.name().to_string(),
                    path: HEALTH_PATH.to_string(),
                });
            }
        }

        if let Some(default) = &self.default_schema {
            if registry.id_of(default).is_none() {
                return Err(RegistryError::UnknownDefaultSchema(default.clone()));
            }
        }

        let mut router = ConstraintRouter::new(strategy).with_default_schema(self.default_schema);
        for (id, engine) in registry.iter() {
            router.register(registry.path(id), engine.name(), id)?;
        }

        info!(
            schemas = registry.len(),
            strategy = %router.strategy().name(),
            "Dynamic schema ready"
        );

        Ok(DynamicSchema {
            gateway: Arc::new(Gateway {
                registry,
                router,
                bridge: ContextBridge::new(self.context),
                allow_get: self.allow_get,
                body_limit: self.body_limit,
                start_time: Utc::now(),
            }),
        })
    }
}

fn parse_header(name: &str) -> Result<HeaderName, RegistryError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| RegistryError::InvalidHeader(name.to_string()))
}

impl DynamicSchema {
    pub fn builder() -> DynamicSchemaBuilder {
        DynamicSchemaBuilder::default()
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.gateway.registry
    }

    pub fn constraint_router(&self) -> &ConstraintRouter {
        &self.gateway.router
    }

    /// Axum router: one route per distinct path, plus `/health`.
    pub fn router(&self) -> Router {
        let mut app = Router::new().route(HEALTH_PATH, get(health_handler));
        for path in self.gateway.router.paths() {
            let mut method: MethodRouter<Arc<Gateway>> = post(graphql_handler);
            if self.gateway.allow_get {
                method = method.get(graphql_handler);
            }
            app = app.route(path, method);
        }
        app.fallback(not_found_handler)
            .layer(tower_http::trace::TraceLayer::new_for_http())
            .with_state(self.gateway.clone())
    }
}

impl std::fmt::Debug for DynamicSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicSchema")
            .field("registry", &self.gateway.registry)
            .field("router", &self.gateway.router)
            .finish()
    }
}

/// Start the gateway HTTP server.
pub async fn start(
    config: &dynaschema_config::AppConfig,
    schema: DynamicSchema,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = schema.router();

    info!(addr = %addr, schemas = ?schema.registry().names(), "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

async fn graphql_handler(
    State(gateway): State<Arc<Gateway>>,
    matched: MatchedPath,
    request: Request,
) -> Response {
    let request_id = uuid::Uuid::new_v4();
    let span = info_span!("graphql", %request_id, path = %matched.as_str());
    handle(gateway, matched, request).instrument(span).await
}

async fn handle(gateway: Arc<Gateway>, matched: MatchedPath, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let id = match gateway.router.resolve(matched.as_str(), &parts).await {
        Ok(id) => id,
        Err(error) => return dispatch::routing_error_response(&error),
    };
    let engine = gateway.registry.engine(id).clone();

    let body = match axum::body::to_bytes(body, gateway.body_limit).await {
        Ok(body) => body,
        Err(error) if is_length_limit(&error) => {
            warn!(limit = gateway.body_limit, "Request body too large");
            return dispatch::error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                format!("Request body exceeds {} bytes", gateway.body_limit),
                Vec::new(),
            );
        }
        Err(error) => {
            warn!(error = %error, "Failed to read request body");
            return dispatch::error_response(
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                format!("Failed to read request body: {error}"),
                Vec::new(),
            );
        }
    };

    let context = gateway.bridge.build(&parts, engine.clone()).await;
    dispatch::dispatch(&engine, context, &parts, body).await
}

fn is_length_limit(error: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(err) = source {
        if err.is::<LengthLimitError>() {
            return true;
        }
        source = err.source();
    }
    false
}

async fn not_found_handler(request: Request) -> Response {
    dispatch::routing_error_response(&RoutingError::NoRoute {
        path: request.uri().path().to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    schemas: Vec<String>,
    uptime_secs: i64,
}

async fn health_handler(State(gateway): State<Arc<Gateway>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        schemas: gateway
            .registry
            .names()
            .into_iter()
            .map(str::to_string)
            .collect(),
        uptime_secs: (Utc::now() - gateway.start_time).num_seconds(),
    })
}
