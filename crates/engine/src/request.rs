//! The GraphQL request payload, decoded from JSON bodies or URL query strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::JsonMap;
use crate::error::EngineError;
use crate::response::GraphQLError;

/// A GraphQL request.
///
/// `variables` and `extensions` may arrive as JSON objects or, in GET query
/// strings, as JSON-encoded text. Both forms decode to the same map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawRequest")]
pub struct GraphQLRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,

    #[serde(skip_serializing_if = "JsonMap::is_empty")]
    pub variables: JsonMap,

    #[serde(skip_serializing_if = "JsonMap::is_empty")]
    pub extensions: JsonMap,
}

/// Wire shape before `variables` and `extensions` are decoded.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRequest {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    operation_name: Option<String>,
    #[serde(default)]
    variables: Option<Value>,
    #[serde(default)]
    extensions: Option<Value>,
}

impl RawRequest {
    fn decode(self) -> Result<GraphQLRequest, EngineError> {
        Ok(GraphQLRequest {
            query: self.query,
            operation_name: self.operation_name,
            variables: json_object("variables", self.variables)?,
            extensions: json_object("extensions", self.extensions)?,
        })
    }
}

impl TryFrom<RawRequest> for GraphQLRequest {
    type Error = EngineError;

    fn try_from(raw: RawRequest) -> Result<Self, Self::Error> {
        raw.decode()
    }
}

impl GraphQLRequest {
    pub fn from_query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    pub fn with_variables(mut self, variables: JsonMap) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    pub fn with_extensions(mut self, extensions: JsonMap) -> Self {
        self.extensions = extensions;
        self
    }

    /// Decode a JSON request body.
    pub fn from_json(body: &[u8]) -> Result<Self, EngineError> {
        serde_json::from_slice::<RawRequest>(body)
            .map_err(|e| EngineError::InvalidRequest(e.to_string()))?
            .decode()
    }

    /// Decode `query=...&operationName=...&variables=...` as sent with GET.
    pub fn from_urlencoded_query(query_string: &str) -> Result<Self, EngineError> {
        serde_urlencoded::from_str::<RawRequest>(query_string)
            .map_err(|e| EngineError::InvalidRequest(e.to_string()))?
            .decode()
    }

    /// `extensions.persistedQuery.sha256Hash`, when present.
    pub fn persisted_query_hash(&self) -> Option<&str> {
        self.extensions
            .get("persistedQuery")?
            .get("sha256Hash")?
            .as_str()
    }
}

/// Decode `variables` or `extensions`: absent, null, an object, or JSON
/// text holding one of those. Anything else fails validation.
fn json_object(field: &str, value: Option<Value>) -> Result<JsonMap, EngineError> {
    let invalid = |reason: String| {
        EngineError::Validation(vec![
            GraphQLError::new(format!("Invalid {field}: {reason}"))
                .with_extension("code", "GRAPHQL_VALIDATION_FAILED"),
        ])
    };

    match value {
        None | Some(Value::Null) => Ok(JsonMap::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(JsonMap::new()),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(Value::Null) => Ok(JsonMap::new()),
            Ok(_) => Err(invalid("expected a JSON object".into())),
            Err(e) => Err(invalid(e.to_string())),
        },
        Some(_) => Err(invalid("expected a JSON object".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_body_with_object_variables() {
        let body = br#"{"query":"query($x:Int){add(x:$x,y:2)}","operationName":null,"variables":{"x":1}}"#;
        let request = GraphQLRequest::from_json(body).unwrap();
        assert_eq!(request.variables["x"], json!(1));
        assert_eq!(request.operation_name, None);
    }

    #[test]
    fn json_body_with_text_variables() {
        let body = br#"{"query":"{ a }","variables":"{\"x\":1}"}"#;
        let request = GraphQLRequest::from_json(body).unwrap();
        assert_eq!(request.variables["x"], json!(1));
    }

    #[test]
    fn non_object_variables_fail_validation() {
        let body = br#"{"query":"{ a }","variables":[1]}"#;
        assert!(matches!(
            GraphQLRequest::from_json(body),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn unparseable_variables_text_fails_validation() {
        let body = br#"{"query":"{ a }","variables":"{not json"}"#;
        let err = GraphQLRequest::from_json(body).unwrap_err();
        assert_eq!(err.classify().code, "GRAPHQL_VALIDATION_FAILED");
        assert!(err.errors()[0].message.starts_with("Invalid variables"));
    }

    #[test]
    fn malformed_body_is_invalid_request() {
        assert!(matches!(
            GraphQLRequest::from_json(b"{\"query\": "),
            Err(EngineError::InvalidRequest(_))
        ));
    }

    #[test]
    fn deserialize_decodes_text_fields() {
        let request: GraphQLRequest =
            serde_json::from_str(r#"{"query":"{ a }","extensions":"{\"k\":true}"}"#).unwrap();
        assert_eq!(request.extensions["k"], json!(true));
    }

    #[test]
    fn query_string_request() {
        let request = GraphQLRequest::from_urlencoded_query(
            "query=%7B%20add(x%3A%201%2C%20y%3A%202)%20%7D&variables=%7B%22a%22%3A1%7D",
        )
        .unwrap();
        assert_eq!(request.query.as_deref(), Some("{ add(x: 1, y: 2) }"));
        assert_eq!(request.variables["a"], json!(1));
    }

    #[test]
    fn persisted_query_hash_is_read_from_extensions() {
        let body = br#"{"extensions":{"persistedQuery":{"version":1,"sha256Hash":"abc"}}}"#;
        let request = GraphQLRequest::from_json(body).unwrap();
        assert_eq!(request.persisted_query_hash(), Some("abc"));
        assert!(request.query.is_none());
    }
}
