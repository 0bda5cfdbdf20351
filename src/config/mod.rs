//! Gateway configuration.
//!
//! Settings come from an optional TOML file named by `AIRGATE_CONFIG`, with
//! environment variables taking precedence:
//!
//! - `AIRGATE_BIND` - listen address (default `0.0.0.0:8080`)
//! - `AIRGATE_TOKEN_DB` - SQLite token database path (default `airgate_token.db`)
//! - `AIRFLOW_HOST` - orchestrator base URL
//! - `AIRFLOW_USER` / `AIRFLOW_PASSWORD` - orchestrator credentials
//! - `AIRFLOW_TOKEN` - optional token used to seed an empty store at startup
//!
//! Empty environment values read as unset.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Complete gateway configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub airflow: AirflowConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the gateway listens on
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Path to the SQLite token database
    #[serde(default = "default_token_db")]
    pub token_db: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_token_db() -> String {
    "airgate_token.db".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            token_db: default_token_db(),
        }
    }
}

/// Orchestrator connection settings.
///
/// All fields are optional here; the clients check presence per call and
/// fail fast when something required is missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AirflowConfig {
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            airflow: AirflowConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Applies environment overrides on top of file values.
    pub fn apply_env(&mut self) {
        if let Some(value) = env_value("AIRGATE_BIND") {
            self.server.bind_addr = value;
        }
        if let Some(value) = env_value("AIRGATE_TOKEN_DB") {
            self.server.token_db = value;
        }
        if let Some(value) = env_value("AIRFLOW_HOST") {
            self.airflow.host = Some(value);
        }
        if let Some(value) = env_value("AIRFLOW_USER") {
            self.airflow.username = Some(value);
        }
        if let Some(value) = env_value("AIRFLOW_PASSWORD") {
            self.airflow.password = Some(value);
        }
    }
}

/// Loads the gateway configuration: optional TOML file named by
/// `AIRGATE_CONFIG`, then environment overrides.
pub fn load() -> Result<GatewayConfig> {
    let mut config = match env_value("AIRGATE_CONFIG") {
        Some(path) => load_config(&path)?,
        None => GatewayConfig::default(),
    };
    config.apply_env();
    Ok(config)
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<GatewayConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let config: GatewayConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path))?;
    Ok(config)
}

/// Initial orchestrator token from the environment, used to seed an empty
/// store at startup.
pub fn seed_token() -> Option<String> {
    env_value("AIRFLOW_TOKEN")
}

/// Reads an env var, treating empty values as unset.
fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
