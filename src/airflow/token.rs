//! Token generation against the orchestrator's auth endpoint.

use super::{AirflowError, AUTH_TIMEOUT};
use crate::config::AirflowConfig;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Response keys probed for the bearer token, in priority order. An empty
/// string under one key falls through to the next.
const TOKEN_KEYS: [&str; 4] = ["access_token", "token", "jwt", "accessToken"];

/// Client for `POST {host}/auth/token`.
///
/// Connection settings are checked per call, so a misconfigured gateway
/// fails fast without touching the network.
pub struct TokenClient {
    config: AirflowConfig,
    http: reqwest::Client,
}

impl TokenClient {
    pub fn new(config: AirflowConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Generates a fresh bearer token.
    ///
    /// Single attempt: a failure here is terminal and never retried.
    ///
    /// # Returns
    /// * `Ok(String)` - Token extracted from the auth response
    /// * `Err(AirflowError::Config)` - Connection settings missing
    /// * `Err(AirflowError::Transport)` - Request failed or answered non-2xx
    /// * `Err(AirflowError::Protocol)` - 2xx answer without a usable token
    pub async fn generate_token(&self) -> Result<String, AirflowError> {
        let host = self
            .config
            .host
            .as_deref()
            .ok_or_else(|| AirflowError::Config("AIRFLOW_HOST is not set".to_string()))?;
        let (username, password) = match (
            self.config.username.as_deref(),
            self.config.password.as_deref(),
        ) {
            (Some(user), Some(pass)) => (user, pass),
            _ => {
                return Err(AirflowError::Config(
                    "AIRFLOW_USER/AIRFLOW_PASSWORD are not set".to_string(),
                ))
            }
        };

        let url = format!("{}/auth/token", host);
        debug!(url = %url, "Requesting orchestrator token");

        let response = self
            .http
            .post(&url)
            .timeout(AUTH_TIMEOUT)
            .json(&json!({
                "username": username,
                "password": password,
            }))
            .send()
            .await
            .map_err(|e| AirflowError::Transport(format!("Airflow token request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AirflowError::Transport(format!("Airflow token request failed: {}", e))
        })?;

        if !status.is_success() {
            return Err(AirflowError::Transport(format!(
                "Airflow token request failed: status {}: {}",
                status, body
            )));
        }

        let data: Value = serde_json::from_str(&body)
            .map_err(|_| AirflowError::Protocol("Invalid JSON in token response".to_string()))?;

        let token = TOKEN_KEYS
            .iter()
            .find_map(|key| {
                data.get(*key)
                    .and_then(Value::as_str)
                    .filter(|t| !t.is_empty())
            })
            .ok_or_else(|| {
                AirflowError::Protocol("Token not found in Airflow response".to_string())
            })?;

        info!("Generated orchestrator token");
        Ok(token.to_string())
    }
}
