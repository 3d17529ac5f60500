//! Configuration loading and validation for dynaschema.
//!
//! Loads configuration from `~/.dynaschema/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use http::HeaderName;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.dynaschema/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Schema selection settings
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Request context derivation
    #[serde(default)]
    pub context: ContextConfig,

    /// Schemas to load from SDL files
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemas: Vec<SchemaConfig>,

    /// Directory the config file was read from; relative SDL paths resolve
    /// against it.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum request body size in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    4000
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Path used by schemas that do not set their own
    #[serde(default = "default_path")]
    pub default_path: String,

    /// Accept queries over GET
    #[serde(default = "default_true")]
    pub allow_get: bool,

    /// Header the strategy reads the schema name from
    #[serde(default = "default_schema_header")]
    pub schema_header: String,

    /// Schema used when the request names none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_schema: Option<String>,

    /// Reject requests whose derived schema matches no route at the path
    #[serde(default = "default_true")]
    pub must_match_when_derived: bool,
}

fn default_path() -> String {
    dynaschema_core::DEFAULT_PATH.into()
}
fn default_schema_header() -> String {
    "schema".into()
}
fn default_true() -> bool {
    true
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_path: default_path(),
            allow_get: true,
            schema_header: default_schema_header(),
            default_schema: None,
            must_match_when_derived: true,
        }
    }
}

/// Request headers copied into the resolver context, header name → key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// A schema served from an SDL file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub name: String,
    pub sdl_file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default location (~/.dynaschema/config.toml).
    ///
    /// Falls back to defaults if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.base_dir = path.parent().map(Path::to_path_buf);

        config.validate()?;
        Ok(config)
    }

    /// Apply `DYNASCHEMA_HOST`, `DYNASCHEMA_PORT` and
    /// `DYNASCHEMA_DEFAULT_SCHEMA` as read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(host) = lookup("DYNASCHEMA_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("DYNASCHEMA_PORT") {
            self.server.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("DYNASCHEMA_PORT is not a valid port: {port}"))
            })?;
        }
        if let Some(schema) = lookup("DYNASCHEMA_DEFAULT_SCHEMA") {
            self.routing.default_schema = Some(schema).filter(|s| !s.is_empty());
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".dynaschema")
    }

    /// Where the SDL of `schema` lives on disk.
    pub fn sdl_path(&self, schema: &SchemaConfig) -> PathBuf {
        match &self.base_dir {
            Some(base) if schema.sdl_file.is_relative() => base.join(&schema.sdl_file),
            _ => schema.sdl_file.clone(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.body_limit == 0 {
            return Err(ConfigError::ValidationError(
                "server.body_limit must be > 0".into(),
            ));
        }

        check_path("routing.default_path", &self.routing.default_path)?;
        check_header("routing.schema_header", &self.routing.schema_header)?;
        for (header, key) in &self.context.headers {
            check_header("context.headers", header)?;
            if key.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "context.headers: header '{header}' maps to an empty key"
                )));
            }
        }

        let mut names = HashSet::new();
        for schema in &self.schemas {
            if schema.name.is_empty() {
                return Err(ConfigError::ValidationError(
                    "schemas: name must not be empty".into(),
                ));
            }
            if !names.insert(schema.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "schemas: duplicate name '{}'",
                    schema.name
                )));
            }
            if let Some(path) = &schema.path {
                check_path(&format!("schemas.{}.path", schema.name), path)?;
            }
        }

        if let Some(default) = &self.routing.default_schema {
            if !self.schemas.is_empty() && !names.contains(default.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "routing.default_schema '{default}' is not a configured schema"
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn check_path(field: &str, path: &str) -> Result<(), ConfigError> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{field} must start with '/': {path}"
        )))
    }
}

fn check_header(field: &str, name: &str) -> Result<(), ConfigError> {
    HeaderName::from_bytes(name.as_bytes())
        .map(|_| ())
        .map_err(|_| ConfigError::ValidationError(format!("{field}: invalid header name '{name}'")))
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for dynaschema_core::Error {
    fn from(error: ConfigError) -> Self {
        dynaschema_core::Error::Config {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.routing.default_path, "/graphql");
        assert_eq!(config.routing.schema_header, "schema");
        assert!(config.routing.must_match_when_derived);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.routing.default_path, config.routing.default_path);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.base_dir.is_none());
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("/graphql"));
        assert!(toml_str.contains("4000"));
    }

    #[test]
    fn schemas_and_context_parse_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"
[routing]
default_schema = "schema1"

[context.headers]
"additional-add" = "additionalAdd"

[[schemas]]
name = "schema1"
sdl_file = "schema1.graphql"

[[schemas]]
name = "schema2"
sdl_file = "/abs/schema2.graphql"
path = "/v2"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.schemas.len(), 2);
        assert_eq!(config.routing.default_schema.as_deref(), Some("schema1"));
        assert_eq!(config.context.headers["additional-add"], "additionalAdd");
        assert_eq!(config.sdl_path(&config.schemas[0]), dir.path().join("schema1.graphql"));
        assert_eq!(config.sdl_path(&config.schemas[1]), PathBuf::from("/abs/schema2.graphql"));
        assert_eq!(config.schemas[1].path.as_deref(), Some("/v2"));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn duplicate_schema_names_rejected() {
        let schema = SchemaConfig {
            name: "schema1".into(),
            sdl_file: "a.graphql".into(),
            path: None,
        };
        let config = AppConfig {
            schemas: vec![schema.clone(), schema],
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn relative_paths_rejected() {
        let mut config = AppConfig::default();
        config.routing.default_path = "graphql".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_default_schema_rejected() {
        let mut config = AppConfig::default();
        config.schemas.push(SchemaConfig {
            name: "schema1".into(),
            sdl_file: "a.graphql".into(),
            path: None,
        });
        config.routing.default_schema = Some("schema9".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_header_name_rejected() {
        let mut config = AppConfig::default();
        config.routing.schema_header = "bad header".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(|key| match key {
                "DYNASCHEMA_PORT" => Some("8080".into()),
                "DYNASCHEMA_DEFAULT_SCHEMA" => Some("schema2".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.routing.default_schema.as_deref(), Some("schema2"));

        let bad_port = config.apply_env(|key| (key == "DYNASCHEMA_PORT").then(|| "http".into()));
        assert!(bad_port.is_err());
    }
}
