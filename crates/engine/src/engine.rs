//! A GraphQL engine bound to one schema.
//!
//! Parsing and validation come from `apollo-compiler`; execution is
//! [`crate::execute`]. An engine is immutable once built and is shared across
//! requests behind an `Arc`.

use apollo_compiler::ast::{Document, OperationType};
use apollo_compiler::executable::Operation;
use apollo_compiler::validation::{DiagnosticList, Valid};
use apollo_compiler::{ExecutableDocument, Node, Schema};
use dynaschema_core::RegistryError;
use schema_check::check_resolver_targets;
use tracing::{debug, info};

use crate::JsonMap;
use crate::context::RequestContext;
use crate::error::EngineError;
use crate::execute::{Execution, operation_kind};
use crate::input::coerce_variable_values;
use crate::persisted::PersistedQueries;
use crate::request::GraphQLRequest;
use crate::resolver::ResolverMap;
use crate::response::{GraphQLError, GraphQLResponse};

/// One schema, its resolvers and its persisted queries.
pub struct Engine {
    name: String,
    schema: Valid<Schema>,
    resolvers: ResolverMap,
    persisted: PersistedQueries,
}

/// A parsed, validated operation with coerced variables, ready to run.
#[derive(Debug, Clone)]
pub struct PreparedOperation {
    document: Valid<ExecutableDocument>,
    operation: Node<Operation>,
    variables: JsonMap,
}

impl PreparedOperation {
    pub fn operation_type(&self) -> OperationType {
        self.operation.operation_type
    }

    pub fn is_mutation(&self) -> bool {
        self.operation.operation_type == OperationType::Mutation
    }

    /// `"query"` or `"mutation"`.
    pub fn kind(&self) -> &'static str {
        operation_kind(self.operation.operation_type)
    }

    pub fn operation_name(&self) -> Option<&str> {
        self.operation.name.as_ref().map(|name| name.as_str())
    }
}

impl Engine {
    /// Build an engine from SDL and resolvers.
    ///
    /// Fails on invalid SDL and on resolvers that name a field the schema
    /// does not define.
    pub fn build(
        name: impl Into<String>,
        sdl: &str,
        resolvers: ResolverMap,
    ) -> Result<Self, RegistryError> {
        let name = name.into();
        let schema = Schema::parse_and_validate(sdl, format!("{name}.graphql")).map_err(|invalid| {
            RegistryError::InvalidSchema {
                schema: name.clone(),
                reason: invalid.errors.to_string(),
            }
        })?;
        check_resolver_targets(&name, &schema, &resolvers)?;

        info!(
            schema = %name,
            types = schema.types.len(),
            resolvers = resolvers.len(),
            "Built GraphQL engine"
        );
        Ok(Self {
            name,
            schema,
            resolvers,
            persisted: PersistedQueries::new(),
        })
    }

    pub fn with_persisted_queries(mut self, persisted: PersistedQueries) -> Self {
        self.persisted = persisted;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Valid<Schema> {
        &self.schema
    }

    pub fn resolvers(&self) -> &ResolverMap {
        &self.resolvers
    }

    pub fn persisted_queries(&self) -> &PersistedQueries {
        &self.persisted
    }

    /// Parse, validate and bind variables. No resolver runs.
    pub fn prepare(&self, request: &GraphQLRequest) -> Result<PreparedOperation, EngineError> {
        let query = self.query_text(request)?;

        let ast = Document::parse(query, "query.graphql")
            .map_err(|invalid| EngineError::Syntax(diagnostics(&invalid.errors, "GRAPHQL_PARSE_FAILED")))?;
        let document = ast.to_executable_validate(&self.schema).map_err(|invalid| {
            EngineError::Validation(diagnostics(&invalid.errors, "GRAPHQL_VALIDATION_FAILED"))
        })?;

        let operation = document
            .operations
            .get(request.operation_name.as_deref())
            .map_err(|_| {
                EngineError::OperationNotFound(
                    request
                        .operation_name
                        .clone()
                        .unwrap_or_else(|| "<anonymous>".to_string()),
                )
            })?
            .clone();

        if operation.operation_type == OperationType::Subscription {
            return Err(EngineError::InvalidRequest(
                "Subscriptions are not supported".to_string(),
            ));
        }

        let variables = coerce_variable_values(&self.schema, &operation, &request.variables)
            .map_err(EngineError::InvalidVariables)?;

        Ok(PreparedOperation {
            document,
            operation,
            variables,
        })
    }

    /// Run a prepared operation. Field errors land in the response.
    pub async fn execute_prepared(
        &self,
        prepared: &PreparedOperation,
        context: &RequestContext,
    ) -> GraphQLResponse {
        debug!(
            schema = %self.name,
            operation = prepared.operation_name().unwrap_or("<anonymous>"),
            kind = prepared.kind(),
            "Executing operation"
        );
        Execution::new(self, &prepared.document, &prepared.variables, context)
            .execute_operation(&prepared.operation)
            .await
    }

    /// [`Engine::prepare`] then [`Engine::execute_prepared`].
    pub async fn execute(
        &self,
        request: &GraphQLRequest,
        context: &RequestContext,
    ) -> Result<GraphQLResponse, EngineError> {
        let prepared = self.prepare(request)?;
        Ok(self.execute_prepared(&prepared, context).await)
    }

    /// The query to run, resolving persisted query hashes.
    fn query_text<'r>(&'r self, request: &'r GraphQLRequest) -> Result<&'r str, EngineError> {
        match (request.query.as_deref(), request.persisted_query_hash()) {
            (Some(query), Some(hash)) => {
                if PersistedQueries::hash(query).eq_ignore_ascii_case(hash) {
                    Ok(query)
                } else {
                    Err(EngineError::PersistedQueryHashMismatch)
                }
            }
            (Some(query), None) => Ok(query),
            (None, Some(hash)) => self
                .persisted
                .get(hash)
                .ok_or_else(|| EngineError::PersistedQueryNotFound(hash.to_string())),
            (None, None) => Err(EngineError::InvalidRequest(
                "Must provide query string.".to_string(),
            )),
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("name", &self.name)
            .field("resolvers", &self.resolvers)
            .field("persisted_queries", &self.persisted.len())
            .finish()
    }
}

fn diagnostics(errors: &DiagnosticList, code: &'static str) -> Vec<GraphQLError> {
    errors
        .iter()
        .map(|diagnostic| GraphQLError::from_diagnostic(diagnostic.to_json(), code))
        .collect()
}

mod schema_check {
    use apollo_compiler::Schema;
    use apollo_compiler::schema::ExtendedType;
    use dynaschema_core::RegistryError;

    use crate::resolver::ResolverMap;

    /// Every resolver must target a field of an object type.
    pub(super) fn check_resolver_targets(
        schema_name: &str,
        schema: &Schema,
        resolvers: &ResolverMap,
    ) -> Result<(), RegistryError> {
        for (type_name, field) in resolvers.targets() {
            let known = match schema.types.get(type_name) {
                Some(ExtendedType::Object(object)) => object.fields.contains_key(field),
                _ => false,
            };
            if !known {
                return Err(RegistryError::UnknownResolverTarget {
                    schema: schema_name.to_string(),
                    type_name: type_name.to_string(),
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FieldError;
    use crate::resolver::ResolverCall;
    use dynaschema_core::ContextFields;
    use serde_json::{Value, json};
    use std::sync::Arc;

    const SDL: &str = r#"
        interface Named { name: String! }
        type User implements Named { id: ID!, name: String!, friends: [User!] }
        type Bot implements Named { name: String!, version: Int }
        type Query {
            add(x: Int, y: Int): Int
            me: User
            named: [Named]
            strict: String!
            greet(name: String = "world"): String
            optional: String
        }
        type Mutation { push(value: Int!): [Int!]! }
    "#;

    fn resolvers() -> ResolverMap {
        ResolverMap::new()
            .field("Query", "add", |call: ResolverCall| async move {
                let x: i64 = call.arg("x")?;
                let y: i64 = call.arg("y")?;
                let extra = call.context.get_as::<i64>("additionalAdd").unwrap_or(0);
                Ok::<_, FieldError>(json!(x + y + extra))
            })
            .field("Query", "me", |_call: ResolverCall| async {
                Ok::<_, FieldError>(json!({
                    "id": 1,
                    "name": "Ada",
                    "friends": [{ "id": "2", "name": "Grace" }]
                }))
            })
            .field("Query", "named", |_call: ResolverCall| async {
                Ok::<_, FieldError>(json!([
                    { "__typename": "User", "id": "1", "name": "Ada" },
                    { "__typename": "Bot", "name": "R2", "version": 2 },
                    { "name": "untyped" }
                ]))
            })
            .field("Query", "strict", |_call: ResolverCall| async {
                Err::<Value, _>(FieldError::new("strict failed").with_extension("code", "NOPE"))
            })
            .field("Query", "greet", |call: ResolverCall| async move {
                let name: String = call.arg("name")?;
                Ok::<_, FieldError>(json!(format!("hello {name}")))
            })
            .field("Mutation", "push", |call: ResolverCall| async move {
                let value: i64 = call.arg("value")?;
                Ok::<_, FieldError>(json!([value, value + 1]))
            })
    }

    fn engine() -> Arc<Engine> {
        Arc::new(Engine::build("test", SDL, resolvers()).unwrap())
    }

    async fn run(engine: &Arc<Engine>, request: GraphQLRequest) -> Result<GraphQLResponse, EngineError> {
        let ctx = RequestContext::new(ContextFields::new(), engine.clone());
        engine.execute(&request, &ctx).await
    }

    async fn data(query: &str) -> Value {
        let response = run(&engine(), GraphQLRequest::from_query(query)).await.unwrap();
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        response.data.unwrap()
    }

    #[tokio::test]
    async fn executes_root_resolver_with_arguments() {
        assert_eq!(data("{ add(x: 1, y: 2) }").await, json!({ "add": 3 }));
    }

    #[tokio::test]
    async fn context_fields_reach_resolvers() {
        let engine = engine();
        let mut fields = ContextFields::new();
        fields.insert("additionalAdd".into(), json!(3));
        let ctx = RequestContext::new(fields, engine.clone());
        let response = engine
            .execute(&GraphQLRequest::from_query("{ add(x: 1, y: -2) }"), &ctx)
            .await
            .unwrap();
        assert_eq!(response.data.unwrap(), json!({ "add": 2 }));
    }

    #[tokio::test]
    async fn nested_fields_use_parent_values() {
        assert_eq!(
            data("{ me { id name friends { name } } }").await,
            json!({ "me": { "id": 1, "name": "Ada", "friends": [{ "name": "Grace" }] } })
        );
    }

    #[tokio::test]
    async fn aliases_typename_and_fragments() {
        let query = r#"
            query {
                sum: add(x: 2, y: 2)
                me { __typename ...UserName }
            }
            fragment UserName on User { name }
        "#;
        assert_eq!(
            data(query).await,
            json!({ "sum": 4, "me": { "__typename": "User", "name": "Ada" } })
        );
    }

    #[tokio::test]
    async fn skip_and_include() {
        let request = GraphQLRequest::from_query(
            "query($skip: Boolean!) { add(x: 1, y: 1) @skip(if: $skip) greet @include(if: true) }",
        )
        .with_variables(json!({ "skip": true }).as_object().cloned().unwrap());
        let response = run(&engine(), request).await.unwrap();
        assert_eq!(response.data.unwrap(), json!({ "greet": "hello world" }));
    }

    #[tokio::test]
    async fn abstract_types_resolve_by_typename() {
        let response = run(
            &engine(),
            GraphQLRequest::from_query(
                "{ named { name ... on Bot { version } } }",
            ),
        )
        .await
        .unwrap();
        assert_eq!(
            response.data.unwrap(),
            json!({ "named": [{ "name": "Ada" }, { "name": "R2", "version": 2 }, null] })
        );
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].path.as_ref().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn non_null_error_propagates_to_data() {
        let response = run(&engine(), GraphQLRequest::from_query("{ add(x: 1, y: 1) strict }"))
            .await
            .unwrap();
        assert_eq!(response.data, Some(Value::Null));
        assert_eq!(response.errors[0].message, "strict failed");
        assert_eq!(response.errors[0].extensions["code"], "NOPE");
        assert!(!response.errors[0].locations.is_empty());
    }

    #[tokio::test]
    async fn mutation_runs_with_variables() {
        let request = GraphQLRequest::from_query("mutation($v: Int!) { push(value: $v) }")
            .with_variables(json!({ "v": 41 }).as_object().cloned().unwrap());
        let response = run(&engine(), request).await.unwrap();
        assert_eq!(response.data.unwrap(), json!({ "push": [41, 42] }));
    }

    #[tokio::test]
    async fn missing_required_variable_is_rejected() {
        let request = GraphQLRequest::from_query("mutation($v: Int!) { push(value: $v) }");
        let err = run(&engine(), request).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidVariables(_)));
    }

    #[tokio::test]
    async fn syntax_and_validation_errors_share_a_class() {
        let syntax = run(&engine(), GraphQLRequest::from_query("{ add(x: 1")).await.unwrap_err();
        assert!(matches!(syntax, EngineError::Syntax(_)));
        assert_eq!(syntax.classify().code, "GRAPHQL_VALIDATION_FAILED");
        assert_eq!(syntax.classify().message, "GraphQL validation error");
        assert_eq!(syntax.errors()[0].extensions["code"], "GRAPHQL_PARSE_FAILED");

        let invalid = run(&engine(), GraphQLRequest::from_query("{ subtract(x: 1, y: 2) }"))
            .await
            .unwrap_err();
        let class = invalid.classify();
        assert_eq!(class.code, "GRAPHQL_VALIDATION_FAILED");
        assert_eq!(class.message, "GraphQL validation error");
        assert!(!invalid.errors().is_empty());
    }

    #[tokio::test]
    async fn introspection_is_not_supported() {
        let response = run(&engine(), GraphQLRequest::from_query("{ __schema { types { name } } }"))
            .await
            .unwrap();
        assert_eq!(response.data, Some(Value::Null));
        assert_eq!(response.errors[0].message, "Introspection is not supported");
    }

    #[tokio::test]
    async fn unknown_operation_name() {
        let request = GraphQLRequest::from_query("query A { optional } query B { optional }")
            .with_operation_name("C");
        let err = run(&engine(), request).await.unwrap_err();
        assert!(matches!(err, EngineError::OperationNotFound(name) if name == "C"));
    }

    #[tokio::test]
    async fn persisted_queries() {
        let query = "{ add(x: 1, y: 2) }";
        let engine = Arc::new(
            Engine::build("test", SDL, resolvers())
                .unwrap()
                .with_persisted_queries(PersistedQueries::from_queries([query])),
        );
        let hash = PersistedQueries::hash(query).to_uppercase();
        let extensions = json!({ "persistedQuery": { "version": 1, "sha256Hash": hash } });
        let by_hash = GraphQLRequest::default().with_extensions(extensions.as_object().cloned().unwrap());

        let response = run(&engine, by_hash.clone()).await.unwrap();
        assert_eq!(response.data.unwrap(), json!({ "add": 3 }));

        let mut mismatched = by_hash.clone();
        mismatched.query = Some("{ optional }".into());
        assert!(matches!(
            run(&engine, mismatched).await,
            Err(EngineError::PersistedQueryHashMismatch)
        ));

        let unknown = GraphQLRequest::default().with_extensions(
            json!({ "persistedQuery": { "sha256Hash": "00" } }).as_object().cloned().unwrap(),
        );
        assert!(matches!(
            run(&engine, unknown).await,
            Err(EngineError::PersistedQueryNotFound(_))
        ));
    }

    #[test]
    fn build_rejects_bad_sdl_and_unknown_targets() {
        assert!(matches!(
            Engine::build("bad", "type Query {", ResolverMap::new()),
            Err(RegistryError::InvalidSchema { .. })
        ));

        let resolvers = ResolverMap::new().field("Query", "nope", |_call: ResolverCall| async {
            Ok::<_, FieldError>(Value::Null)
        });
        assert!(matches!(
            Engine::build("bad", "type Query { ok: Int }", resolvers),
            Err(RegistryError::UnknownResolverTarget { field, .. }) if field == "nope"
        ));
    }
}
