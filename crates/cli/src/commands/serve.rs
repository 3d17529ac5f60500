//! `dynaschema serve` — Run the calculator demo gateway.

use dynaschema_config::AppConfig;

use crate::demo;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.server.port = port;
    }

    let schema = demo::builder(&config)?.build()?;

    println!("Dynaschema demo gateway");
    println!("   Listening:     {}:{}", config.server.host, config.server.port);
    println!("   Path:          {}", config.routing.default_path);
    println!("   Schema header: {}", config.routing.schema_header);
    println!("   Schemas:       {}", schema.registry().names().join(", "));

    dynaschema_gateway::start(&config, schema).await?;

    Ok(())
}
