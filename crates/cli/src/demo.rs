//! The calculator demo served by `dynaschema serve`.
//!
//! Two schemas share one path: `schema1` adds, `schema2` subtracts. Both add
//! the `additionalAdd` context field, forwarded from the `additional-add`
//! header, to their result.

use dynaschema_config::AppConfig;
use dynaschema_core::{HeaderContext, RegistryError};
use dynaschema_engine::{FieldError, ResolverCall, ResolverMap};
use dynaschema_gateway::{DynamicSchema, DynamicSchemaBuilder, SchemaEntry};
use http::HeaderName;
use serde_json::json;

pub const ADD_SDL: &str = "type Query {\n  add(x: Int, y: Int): Int\n}\n";
pub const SUBTRACT_SDL: &str = "type Query {\n  subtract(x: Int, y: Int): Int\n}\n";

/// Schema picked when the request carries no schema header.
pub const FALLBACK_SCHEMA: &str = "schema1";

fn operands(call: &ResolverCall) -> Result<(i64, i64, i64), FieldError> {
    let x = call.arg::<Option<i64>>("x")?.unwrap_or(0);
    let y = call.arg::<Option<i64>>("y")?.unwrap_or(0);
    let extra = call.context.get_as::<i64>("additionalAdd").unwrap_or(0);
    Ok((x, y, extra))
}

pub fn schemas() -> Vec<SchemaEntry> {
    let add = ResolverMap::new().field("Query", "add", |call: ResolverCall| async move {
        let (x, y, extra) = operands(&call)?;
        Ok::<_, FieldError>(json!(x + y + extra))
    });
    let subtract = ResolverMap::new().field("Query", "subtract", |call: ResolverCall| async move {
        let (x, y, extra) = operands(&call)?;
        Ok::<_, FieldError>(json!(x - y + extra))
    });

    vec![
        SchemaEntry::new("schema1", ADD_SDL, add),
        SchemaEntry::new("schema2", SUBTRACT_SDL, subtract),
    ]
}

/// Demo builder on top of `config`: routing and server settings come from
/// the config, the schemas from [`schemas`].
pub fn builder(config: &AppConfig) -> Result<DynamicSchemaBuilder, RegistryError> {
    let mut builder = DynamicSchema::builder()
        .schemas(schemas())
        .configure(config)?;

    if config.routing.default_schema.is_none() {
        builder = builder.default_schema(FALLBACK_SCHEMA);
    }
    if config.context.headers.is_empty() {
        builder = builder.context(
            HeaderContext::new().forward(HeaderName::from_static("additional-add"), "additionalAdd"),
        );
    }
    Ok(builder)
}
