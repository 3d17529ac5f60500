//! `dynaschema check` — Validate a configuration and build its schemas.

use std::path::{Path, PathBuf};

use dynaschema_config::AppConfig;
use dynaschema_engine::ResolverMap;
use dynaschema_gateway::{DynamicSchema, SchemaEntry};

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path.unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
    println!("Checking configuration: {}", path.display());

    match check(&path) {
        Ok(report) => {
            println!("   Config parsed successfully");
            if report.schemas.is_empty() {
                println!("   No [[schemas]] configured, nothing to build");
            }
            for (name, route) in &report.schemas {
                println!("   Schema {name:<16} {route}");
            }
            println!();
            println!("   Server:        {}", report.listen);
            println!("   Schema header: {}", report.schema_header);
            Ok(())
        }
        Err(e) => {
            println!("   Config error: {e}");
            Err(e)
        }
    }
}

/// What a successful check found.
#[derive(Debug)]
struct Report {
    listen: String,
    schema_header: String,
    /// (schema name, serving path)
    schemas: Vec<(String, String)>,
}

fn check(path: &Path) -> Result<Report, Box<dyn std::error::Error>> {
    let mut config = AppConfig::load_from(path)?;
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;

    let mut report = Report {
        listen: format!("{}:{}", config.server.host, config.server.port),
        schema_header: config.routing.schema_header.clone(),
        schemas: Vec::new(),
    };
    if config.schemas.is_empty() {
        return Ok(report);
    }

    let mut entries = Vec::with_capacity(config.schemas.len());
    for schema in &config.schemas {
        let sdl_path = config.sdl_path(schema);
        let sdl = std::fs::read_to_string(&sdl_path)
            .map_err(|e| format!("Failed to read SDL of '{}' at {}: {e}", schema.name, sdl_path.display()))?;
        let mut entry = SchemaEntry::new(schema.name.clone(), sdl, ResolverMap::new());
        entry.path = schema.path.clone();
        entries.push(entry);
    }

    let built = DynamicSchema::builder().schemas(entries).configure(&config)?.build()?;
    let registry = built.registry();
    report.schemas = registry
        .iter()
        .map(|(id, engine)| (engine.name().to_string(), registry.path(id).to_string()))
        .collect();
    Ok(report)
}
