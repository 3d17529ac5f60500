//! Dynaschema CLI — the main entry point.
//!
//! Commands:
//! - `serve` — Run the calculator demo gateway
//! - `check` — Validate a configuration and build its schemas
//! - `init`  — Print (or write) a default configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod demo;

#[derive(Parser)]
#[command(
    name = "dynaschema",
    about = "Dynaschema — per-request GraphQL schema selection",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the calculator demo (schema1: add, schema2: subtract)
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate a configuration and build every configured schema
    Check {
        /// Config file (defaults to ~/.dynaschema/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print a default configuration
    Init {
        /// Write it to ~/.dynaschema/config.toml instead of stdout
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Check { config } => commands::check::run(config).await?,
        Commands::Init { write } => commands::init::run(write).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_serve_port() {
        let cli = Cli::try_parse_from(["dynaschema", "serve", "--port", "4100"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { port: Some(4100) }));
    }

    #[test]
    fn parses_global_verbose_flag() {
        let cli = Cli::try_parse_from(["dynaschema", "check", "-v", "--config", "a.toml"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Check { config } => assert_eq!(config, Some(PathBuf::from("a.toml"))),
            _ => panic!("expected check"),
        }
    }
}
