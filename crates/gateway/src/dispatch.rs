//! Request normalisation, engine invocation and HTTP reply shaping.

use axum::Json;
use axum::body::Bytes;
use axum::response::{IntoResponse, Response};
use dynaschema_core::RoutingError;
use dynaschema_engine::{Engine, EngineError, GraphQLError, GraphQLRequest, RequestContext};
use http::header::{self, HeaderValue};
use http::request::Parts;
use http::{Method, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

/// Decode the GraphQL request carried by an HTTP request.
///
/// - `GET`: parameters from the query string.
/// - `POST` with a JSON content type: `{query, operationName, variables, extensions}`.
/// - any other `POST`: the body is the query text.
pub fn normalize(parts: &Parts, body: &Bytes) -> Result<GraphQLRequest, EngineError> {
    if parts.method == Method::GET {
        return GraphQLRequest::from_urlencoded_query(parts.uri.query().unwrap_or_default());
    }

    if is_json(parts) {
        return GraphQLRequest::from_json(body);
    }

    let query = std::str::from_utf8(body)
        .map_err(|_| EngineError::InvalidRequest("Request body is not valid UTF-8".into()))?;
    Ok(GraphQLRequest::from_query(query))
}

fn is_json(parts: &Parts) -> bool {
    parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim();
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

/// Run one request against `engine` and build the HTTP reply.
pub async fn dispatch(
    engine: &Engine,
    context: RequestContext,
    parts: &Parts,
    body: Bytes,
) -> Response {
    let request = match normalize(parts, &body) {
        Ok(request) => request,
        Err(error) => return engine_error_response(&error),
    };

    let prepared = match engine.prepare(&request) {
        Ok(prepared) => prepared,
        Err(error) => return engine_error_response(&error),
    };

    if parts.method == Method::GET && prepared.is_mutation() {
        let error = EngineError::MethodNotAllowed {
            operation: prepared.kind().to_string(),
            method: parts.method.to_string(),
        };
        let mut response = engine_error_response(&error);
        response
            .headers_mut()
            .insert(header::ALLOW, HeaderValue::from_static("POST"));
        return response;
    }

    let result = engine.execute_prepared(&prepared, &context).await;
    debug!(
        schema = %engine.name(),
        errors = result.errors.len(),
        "GraphQL request completed"
    );

    let extra = context.response().snapshot();
    let mut response = (extra.status.unwrap_or(StatusCode::OK), Json(result)).into_response();
    response.headers_mut().extend(extra.headers);
    response
}

/// Non-200 error body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub status_code: u16,
    pub code: &'static str,
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
}

pub fn error_response(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    errors: Vec<GraphQLError>,
) -> Response {
    let envelope = ErrorEnvelope {
        status_code: status.as_u16(),
        code,
        error: status.canonical_reason().unwrap_or("Error"),
        message: message.into(),
        errors,
    };
    (status, Json(envelope)).into_response()
}

pub fn engine_error_response(error: &EngineError) -> Response {
    let class = error.classify();
    debug!(code = class.code, status = %class.status, "Rejected GraphQL request");
    error_response(class.status, class.code, class.message, error.errors())
}

pub fn routing_error_response(error: &RoutingError) -> Response {
    warn!(error = %error, "Routing failed");
    error_response(error.status(), error.code(), error.to_string(), Vec::new())
}
