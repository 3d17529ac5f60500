//! Input coercion: request variables and field arguments.
//!
//! <https://spec.graphql.org/October2021/#sec-Coercing-Variable-Values>

use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::executable::{Field, Operation};
use apollo_compiler::schema::{ExtendedType, Type};
use apollo_compiler::validation::Valid;
use serde_json::{Number, Value};

use crate::JsonMap;
use crate::response::GraphQLError;

/// Coerce the provided variables against the operation's definitions.
pub(crate) fn coerce_variable_values(
    schema: &Valid<Schema>,
    operation: &Operation,
    provided: &JsonMap,
) -> Result<JsonMap, Vec<GraphQLError>> {
    let mut coerced = JsonMap::new();
    let mut errors = Vec::new();

    for definition in &operation.variables {
        let name = definition.name.as_str();
        let ty = &*definition.ty;
        match provided.get(name) {
            None => {
                if let Some(default) = &definition.default_value {
                    coerced.insert(name.to_string(), literal_to_json(default, None));
                } else if ty.is_non_null() {
                    errors.push(variable_error(format!(
                        "Variable \"${name}\" of required type \"{ty}\" was not provided."
                    )));
                }
            }
            Some(value) => match coerce_input_value(schema, ty, value) {
                Ok(value) => {
                    coerced.insert(name.to_string(), value);
                }
                Err(reason) => errors.push(variable_error(format!(
                    "Variable \"${name}\" got invalid value {value}; {reason}"
                ))),
            },
        }
    }

    if errors.is_empty() {
        Ok(coerced)
    } else {
        Err(errors)
    }
}

fn variable_error(message: String) -> GraphQLError {
    GraphQLError::new(message).with_extension("code", "BAD_USER_INPUT")
}

/// Coerce a JSON input value to `ty`.
pub(crate) fn coerce_input_value(
    schema: &Schema,
    ty: &Type,
    value: &Value,
) -> Result<Value, String> {
    if value.is_null() {
        return if ty.is_non_null() {
            Err(format!("expected non-null type {ty}"))
        } else {
            Ok(Value::Null)
        };
    }
    match ty {
        Type::List(inner) | Type::NonNullList(inner) => match value {
            Value::Array(items) => items
                .iter()
                .map(|item| coerce_input_value(schema, inner, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            // A single item is accepted where a list is expected.
            single => Ok(Value::Array(vec![coerce_input_value(schema, inner, single)?])),
        },
        Type::Named(name) | Type::NonNullNamed(name) => {
            let Some(definition) = schema.types.get(name) else {
                return Err(format!("unknown type {name}"));
            };
            match definition {
                ExtendedType::Scalar(_) => coerce_scalar(name.as_str(), value),
                ExtendedType::Enum(def) => match value.as_str() {
                    Some(s) if def.values.contains_key(s) => Ok(value.clone()),
                    _ => Err(format!("expected a value of enum {name}")),
                },
                ExtendedType::InputObject(def) => {
                    let Value::Object(object) = value else {
                        return Err(format!("expected an object for input type {name}"));
                    };
                    if let Some(unknown) = object.keys().find(|k| !def.fields.contains_key(k.as_str())) {
                        return Err(format!("field \"{unknown}\" is not defined by type {name}"));
                    }
                    let mut coerced = JsonMap::new();
                    for (field_name, field_def) in &def.fields {
                        match object.get(field_name.as_str()) {
                            Some(field_value) => {
                                let field_value =
                                    coerce_input_value(schema, &field_def.ty, field_value)
                                        .map_err(|e| format!("at field \"{field_name}\": {e}"))?;
                                coerced.insert(field_name.to_string(), field_value);
                            }
                            None => {
                                if let Some(default) = &field_def.default_value {
                                    coerced.insert(
                                        field_name.to_string(),
                                        literal_to_json(default, None),
                                    );
                                } else if field_def.ty.is_non_null() {
                                    return Err(format!(
                                        "field \"{field_name}\" of required type {} was not provided",
                                        &*field_def.ty
                                    ));
                                }
                            }
                        }
                    }
                    Ok(Value::Object(coerced))
                }
                ExtendedType::Object(_) | ExtendedType::Interface(_) | ExtendedType::Union(_) => {
                    Err(format!("{name} is not an input type"))
                }
            }
        }
    }
}

fn coerce_scalar(name: &str, value: &Value) -> Result<Value, String> {
    match name {
        "Int" => {
            let int = value
                .as_i64()
                .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64));
            match int {
                Some(int) if i32::try_from(int).is_ok() => Ok(Value::from(int)),
                Some(_) => Err("Int cannot represent non 32-bit signed integer value".into()),
                None => Err("Int cannot represent non-integer value".into()),
            }
        }
        "Float" => match value {
            Value::Number(_) => Ok(value.clone()),
            _ => Err("Float cannot represent non numeric value".into()),
        },
        "String" => match value {
            Value::String(_) => Ok(value.clone()),
            _ => Err("String cannot represent a non string value".into()),
        },
        "Boolean" => match value {
            Value::Bool(_) => Ok(value.clone()),
            _ => Err("Boolean cannot represent a non boolean value".into()),
        },
        "ID" => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Value::String(n.to_string())),
            _ => Err("ID cannot represent value".into()),
        },
        // Custom scalars pass through.
        _ => Ok(value.clone()),
    }
}

/// Coerce the arguments of `field`, applying defaults and variable values.
pub(crate) fn coerce_argument_values(
    schema: &Schema,
    field: &Field,
    variables: &JsonMap,
) -> Result<JsonMap, String> {
    let mut coerced = JsonMap::new();
    for definition in &field.definition.arguments {
        let name = definition.name.as_str();
        let supplied = field
            .arguments
            .iter()
            .find(|argument| argument.name == definition.name)
            .map(|argument| &*argument.value);

        let value = match supplied {
            Some(ast::Value::Variable(variable)) => match variables.get(variable.as_str()) {
                Some(value) => Some(value.clone()),
                None => definition
                    .default_value
                    .as_deref()
                    .map(|default| literal_to_json(default, None)),
            },
            Some(literal) => Some(literal_to_json(literal, Some(variables))),
            None => definition
                .default_value
                .as_deref()
                .map(|default| literal_to_json(default, None)),
        };

        match value {
            Some(value) => {
                let value = coerce_input_value(schema, &definition.ty, &value)
                    .map_err(|e| format!("Argument \"{name}\" has invalid value: {e}"))?;
                coerced.insert(name.to_string(), value);
            }
            None if definition.ty.is_non_null() => {
                return Err(format!(
                    "Argument \"{name}\" of required type \"{}\" was not provided.",
                    &*definition.ty
                ));
            }
            None => {}
        }
    }
    Ok(coerced)
}

/// Convert a GraphQL literal to JSON, substituting variables when given.
pub(crate) fn literal_to_json(value: &ast::Value, variables: Option<&JsonMap>) -> Value {
    match value {
        ast::Value::Null => Value::Null,
        ast::Value::Enum(name) => Value::String(name.to_string()),
        ast::Value::Variable(name) => variables
            .and_then(|vars| vars.get(name.as_str()).cloned())
            .unwrap_or(Value::Null),
        ast::Value::String(s) => Value::String(s.clone()),
        ast::Value::Boolean(b) => Value::Bool(*b),
        ast::Value::Int(int) => match int.try_to_i32() {
            Ok(i) => Value::from(i),
            Err(_) => int
                .try_to_f64()
                .ok()
                .and_then(Number::from_f64)
                .map_or(Value::Null, Value::Number),
        },
        ast::Value::Float(float) => float
            .try_to_f64()
            .ok()
            .and_then(Number::from_f64)
            .map_or(Value::Null, Value::Number),
        ast::Value::List(items) => Value::Array(
            items
                .iter()
                .map(|item| literal_to_json(item, variables))
                .collect(),
        ),
        ast::Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, item)| (name.to_string(), literal_to_json(item, variables)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apollo_compiler::Name;
    use serde_json::json;

    const SDL: &str = r#"
        enum Color { RED GREEN }
        input Point { x: Int!, y: Int = 0, color: Color }
        type Query { plot(points: [Point!]!): Int }
    "#;

    fn schema() -> Valid<Schema> {
        Schema::parse_and_validate(SDL, "schema.graphql").unwrap()
    }

    fn named(name: &str) -> Type {
        Type::Named(Name::new(name).unwrap())
    }

    #[test]
    fn int_rejects_overflow_and_fractions() {
        let schema = schema();
        assert_eq!(coerce_input_value(&schema, &named("Int"), &json!(7)).unwrap(), json!(7));
        assert!(coerce_input_value(&schema, &named("Int"), &json!(1.5)).is_err());
        assert!(coerce_input_value(&schema, &named("Int"), &json!(4_294_967_296_i64)).is_err());
        assert!(coerce_input_value(&schema, &named("Int").non_null(), &Value::Null).is_err());
        assert_eq!(coerce_input_value(&schema, &named("Int"), &Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn input_object_applies_defaults() {
        let schema = schema();
        let coerced = coerce_input_value(
            &schema,
            &named("Point").non_null().list().non_null(),
            &json!({ "x": 1, "color": "RED" }),
        )
        .unwrap();
        assert_eq!(coerced, json!([{ "x": 1, "y": 0, "color": "RED" }]));

        assert!(coerce_input_value(&schema, &named("Point"), &json!({ "y": 1 })).is_err());
        assert!(coerce_input_value(&schema, &named("Point"), &json!({ "x": 1, "z": 1 })).is_err());
        assert!(coerce_input_value(&schema, &named("Point"), &json!({ "x": 1, "color": "BLUE" })).is_err());
    }

    #[test]
    fn id_accepts_integers_as_strings() {
        let schema = schema();
        assert_eq!(coerce_input_value(&schema, &named("ID"), &json!(42)).unwrap(), json!("42"));
        assert!(coerce_input_value(&schema, &named("ID"), &json!(true)).is_err());
    }
}
