//! Operation execution and result coercion.
//!
//! <https://spec.graphql.org/October2021/#sec-Execution>
//!
//! Fields of a selection set run one after another, so mutation root fields
//! are serial as required. A field error nulls the nearest nullable ancestor:
//! [`PropagateNull`] travels upwards until [`try_nullify`] finds one.

use std::collections::HashSet;
use std::sync::Mutex;

use apollo_compiler::ExecutableDocument;
use apollo_compiler::Node;
use apollo_compiler::ast::OperationType;
use apollo_compiler::executable::{Field, Operation, Selection, SelectionSet};
use apollo_compiler::schema::{ExtendedType, Type};
use apollo_compiler::validation::Valid;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use crate::JsonMap;
use crate::context::RequestContext;
use crate::engine::Engine;
use crate::error::FieldError;
use crate::input::coerce_argument_values;
use crate::resolver::{FieldInfo, ResolverCall};
use crate::response::{GraphQLError, GraphQLResponse, Location, PathSegment};

/// A field error was recorded; the value must become null somewhere above.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PropagateNull;

/// Swallow a propagated error at a nullable position.
pub(crate) fn try_nullify(ty: &Type, result: Result<Value, PropagateNull>) -> Result<Value, PropagateNull> {
    match result {
        Err(PropagateNull) if !ty.is_non_null() => Ok(Value::Null),
        other => other,
    }
}

pub(crate) struct Execution<'a> {
    engine: &'a Engine,
    document: &'a Valid<ExecutableDocument>,
    variables: &'a JsonMap,
    context: &'a RequestContext,
    errors: Mutex<Vec<GraphQLError>>,
}

impl<'a> Execution<'a> {
    pub(crate) fn new(
        engine: &'a Engine,
        document: &'a Valid<ExecutableDocument>,
        variables: &'a JsonMap,
        context: &'a RequestContext,
    ) -> Self {
        Self {
            engine,
            document,
            variables,
            context,
            errors: Mutex::new(Vec::new()),
        }
    }

    pub(crate) async fn execute_operation(self, operation: &'a Operation) -> GraphQLResponse {
        let root_type = operation.selection_set.ty.as_str();
        let data = if self.engine.schema().get_object(root_type).is_none() {
            self.push_error(GraphQLError::new(format!(
                "Schema does not define a root type for {}",
                operation_kind(operation.operation_type)
            )));
            Value::Null
        } else {
            self.execute_selection_set(root_type, Value::Null, Vec::new(), vec![&operation.selection_set])
                .await
                .map(Value::Object)
                .unwrap_or(Value::Null)
        };

        let errors = self.errors.into_inner().unwrap_or_else(|e| e.into_inner());
        debug!(
            schema = %self.engine.name(),
            errors = errors.len(),
            "Operation executed"
        );
        GraphQLResponse {
            data: Some(data),
            errors,
            extensions: JsonMap::new(),
        }
    }

    fn execute_selection_set<'s>(
        &'s self,
        object_type: &'a str,
        parent: Value,
        path: Vec<PathSegment>,
        selection_sets: Vec<&'a SelectionSet>,
    ) -> BoxFuture<'s, Result<JsonMap, PropagateNull>> {
        Box::pin(async move {
            let grouped = self.collect_fields(object_type, &selection_sets);
            let mut response = JsonMap::new();
            for (response_key, fields) in grouped {
                let field = fields[0];
                let mut field_path = path.clone();
                field_path.push(PathSegment::Key(response_key.to_string()));

                let result = if field.name.as_str() == "__typename" {
                    Ok(Value::String(object_type.to_string()))
                } else if field.name.as_str().starts_with("__") {
                    self.field_error("Introspection is not supported", field_path, field);
                    Err(PropagateNull)
                } else {
                    self.execute_field(object_type, &parent, fields, field_path).await
                };

                match try_nullify(&field.definition.ty, result) {
                    Ok(value) => {
                        response.insert(response_key.to_string(), value);
                    }
                    Err(PropagateNull) => return Err(PropagateNull),
                }
            }
            Ok(response)
        })
    }

    async fn execute_field(
        &self,
        object_type: &'a str,
        parent: &Value,
        fields: Vec<&'a Node<Field>>,
        path: Vec<PathSegment>,
    ) -> Result<Value, PropagateNull> {
        let field = fields[0];
        let args = match coerce_argument_values(self.engine.schema(), field, self.variables) {
            Ok(args) => args,
            Err(message) => {
                self.field_error(message, path, field);
                return Err(PropagateNull);
            }
        };

        let resolved = match self.engine.resolvers().get(object_type, field.name.as_str()) {
            Some(resolver) => {
                let call = ResolverCall {
                    parent: parent.clone(),
                    args,
                    context: self.context.clone(),
                    info: FieldInfo {
                        parent_type: object_type.to_string(),
                        field_name: field.name.to_string(),
                        path: path.clone(),
                    },
                };
                resolver.resolve(call).await
            }
            None => Ok(parent.get(field.name.as_str()).cloned().unwrap_or(Value::Null)),
        };

        match resolved {
            Ok(value) => {
                self.complete_value(&field.definition.ty, value, fields, path)
                    .await
            }
            Err(error) => {
                self.push_field_error(error, path, field);
                Err(PropagateNull)
            }
        }
    }

    /// <https://spec.graphql.org/October2021/#CompleteValue()>
    fn complete_value<'s>(
        &'s self,
        ty: &'a Type,
        value: Value,
        fields: Vec<&'a Node<Field>>,
        path: Vec<PathSegment>,
    ) -> BoxFuture<'s, Result<Value, PropagateNull>> {
        Box::pin(async move {
            let field = fields[0];
            if value.is_null() {
                if ty.is_non_null() {
                    self.field_error(format!("Non-null type {ty} resolved to null"), path, field);
                    return Err(PropagateNull);
                }
                return Ok(Value::Null);
            }

            let type_name = match ty {
                Type::List(inner) | Type::NonNullList(inner) => {
                    let items = match value {
                        Value::Array(items) => items,
                        other => {
                            self.field_error(format!("List type {ty} resolved to {other}"), path, field);
                            return Err(PropagateNull);
                        }
                    };
                    let mut completed = Vec::with_capacity(items.len());
                    for (index, item) in items.into_iter().enumerate() {
                        let mut item_path = path.clone();
                        item_path.push(PathSegment::Index(index));
                        let result = self
                            .complete_value(inner, item, fields.clone(), item_path)
                            .await;
                        match try_nullify(inner, result) {
                            Ok(item) => completed.push(item),
                            Err(PropagateNull) => return try_nullify(ty, Err(PropagateNull)),
                        }
                    }
                    return Ok(Value::Array(completed));
                }
                Type::Named(name) | Type::NonNullNamed(name) => name,
            };

            let schema = self.engine.schema();
            let Some(definition) = schema.types.get(type_name) else {
                self.field_error(format!("Undefined type {type_name}"), path, field);
                return Err(PropagateNull);
            };

            let object_type = match definition {
                ExtendedType::Scalar(_) => {
                    return match coerce_leaf(type_name.as_str(), &value) {
                        Ok(()) => Ok(value),
                        Err(message) => {
                            self.field_error(message, path, field);
                            Err(PropagateNull)
                        }
                    };
                }
                ExtendedType::Enum(def) => {
                    if value.as_str().is_some_and(|s| def.values.contains_key(s)) {
                        return Ok(value);
                    }
                    self.field_error(
                        format!("Resolver returned {value}, expected enum {type_name}"),
                        path,
                        field,
                    );
                    return Err(PropagateNull);
                }
                ExtendedType::InputObject(_) => {
                    self.field_error(format!("Field with input object type {type_name}"), path, field);
                    return Err(PropagateNull);
                }
                ExtendedType::Object(_) => type_name.as_str(),
                ExtendedType::Interface(_) | ExtendedType::Union(_) => {
                    let concrete = value.get("__typename").and_then(Value::as_str);
                    match concrete.and_then(|name| schema.get_object(name).map(|def| (name, def))) {
                        Some((_, def)) if schema.is_subtype(type_name, &def.name) => def.name.as_str(),
                        Some((name, _)) => {
                            self.field_error(
                                format!("Object type {name} is not a possible type of {type_name}"),
                                path,
                                field,
                            );
                            return Err(PropagateNull);
                        }
                        None => {
                            self.field_error(
                                format!(
                                    "Abstract type {type_name} must resolve to an object type \
                                     named by a \"__typename\" key"
                                ),
                                path,
                                field,
                            );
                            return Err(PropagateNull);
                        }
                    }
                }
            };

            if !value.is_object() {
                self.field_error(
                    format!("Resolver returned {value}, expected an object of type {object_type}"),
                    path,
                    field,
                );
                return Err(PropagateNull);
            }
            let selection_sets = fields.iter().copied().map(|field| &field.selection_set).collect();
            self.execute_selection_set(object_type, value, path, selection_sets)
                .await
                .map(Value::Object)
        })
    }

    /// <https://spec.graphql.org/October2021/#CollectFields()>
    ///
    /// Groups fields by response key, keeping first-seen order.
    fn collect_fields(
        &self,
        object_type: &str,
        selection_sets: &[&'a SelectionSet],
    ) -> Vec<(&'a str, Vec<&'a Node<Field>>)> {
        let mut grouped = Vec::new();
        let mut visited_fragments = HashSet::new();
        for selection_set in selection_sets {
            self.collect_into(object_type, selection_set, &mut visited_fragments, &mut grouped);
        }
        grouped
    }

    fn collect_into(
        &self,
        object_type: &str,
        selection_set: &'a SelectionSet,
        visited_fragments: &mut HashSet<&'a str>,
        grouped: &mut Vec<(&'a str, Vec<&'a Node<Field>>)>,
    ) {
        for selection in &selection_set.selections {
            if !self.is_included(selection) {
                continue;
            }
            match selection {
                Selection::Field(field) => {
                    let key = field.response_key().as_str();
                    match grouped.iter_mut().find(|(existing, _)| *existing == key) {
                        Some((_, fields)) => fields.push(field),
                        None => grouped.push((key, vec![field])),
                    }
                }
                Selection::FragmentSpread(spread) => {
                    let name = spread.fragment_name.as_str();
                    if !visited_fragments.insert(name) {
                        continue;
                    }
                    let Some(fragment) = self.document.fragments.get(name) else {
                        continue;
                    };
                    if self.applies(fragment.selection_set.ty.as_str(), object_type) {
                        self.collect_into(object_type, &fragment.selection_set, visited_fragments, grouped);
                    }
                }
                Selection::InlineFragment(inline) => {
                    let applies = inline
                        .type_condition
                        .as_ref()
                        .is_none_or(|condition| self.applies(condition.as_str(), object_type));
                    if applies {
                        self.collect_into(object_type, &inline.selection_set, visited_fragments, grouped);
                    }
                }
            }
        }
    }

    fn applies(&self, condition: &str, object_type: &str) -> bool {
        condition == object_type || self.engine.schema().is_subtype(condition, object_type)
    }

    /// `@skip(if:)` and `@include(if:)`.
    fn is_included(&self, selection: &Selection) -> bool {
        let directives = match selection {
            Selection::Field(field) => &field.directives,
            Selection::FragmentSpread(spread) => &spread.directives,
            Selection::InlineFragment(inline) => &inline.directives,
        };
        let condition = |name: &str| {
            directives
                .get(name)
                .and_then(|directive| directive.specified_argument_by_name("if"))
                .map(|value| match &**value {
                    apollo_compiler::ast::Value::Boolean(b) => *b,
                    apollo_compiler::ast::Value::Variable(var) => self
                        .variables
                        .get(var.as_str())
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                    _ => false,
                })
        };
        condition("skip") != Some(true) && condition("include") != Some(false)
    }

    fn push_error(&self, error: GraphQLError) {
        self.errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(error);
    }

    fn field_error(&self, message: impl Into<String>, path: Vec<PathSegment>, field: &Field) {
        self.push_field_error(FieldError::new(message), path, field);
    }

    fn push_field_error(&self, error: FieldError, path: Vec<PathSegment>, field: &Field) {
        let error = error
            .into_graphql_error(path)
            .with_locations(self.locations(field));
        self.push_error(error);
    }

    fn locations(&self, field: &Field) -> Vec<Location> {
        field
            .name
            .location()
            .and_then(|span| span.line_column_range(&self.document.sources))
            .map(|range| Location {
                line: range.start.line,
                column: range.start.column,
            })
            .into_iter()
            .collect()
    }
}

/// <https://spec.graphql.org/October2021/#sec-Scalars.Result-Coercion-and-Serialization>
fn coerce_leaf(type_name: &str, value: &Value) -> Result<(), String> {
    let ok = match type_name {
        "Int" => value.as_i64().is_some_and(|int| i32::try_from(int).is_ok()),
        "Float" => value.is_number(),
        "String" => value.is_string(),
        "Boolean" => value.is_boolean(),
        "ID" => value.is_string() || value.is_i64() || value.is_u64(),
        // Custom scalars accept any JSON value.
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(format!("Resolver returned {value}, expected {type_name}"))
    }
}

pub(crate) fn operation_kind(operation_type: OperationType) -> &'static str {
    match operation_type {
        OperationType::Query => "query",
        OperationType::Mutation => "mutation",
        OperationType::Subscription => "subscription",
    }
}
