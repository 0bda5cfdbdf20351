//! DAG-run triggering against the orchestrator's public API.

use super::{AirflowError, TRIGGER_TIMEOUT};
use crate::config::AirflowConfig;
use chrono::{Duration, SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Raw outcome of a trigger call.
///
/// Status and body are carried verbatim; callers decide what each status
/// means. Only transport failures surface as errors.
#[derive(Debug, Clone)]
pub struct TriggerResponse {
    pub status: u16,
    pub body: String,
}

impl TriggerResponse {
    /// True when the orchestrator rejected the bearer token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status, 401 | 403)
    }
}

/// Client for `POST {host}/api/v2/dags/{dag_id}/dagRuns`.
pub struct TriggerClient {
    config: AirflowConfig,
    http: reqwest::Client,
}

impl TriggerClient {
    pub fn new(config: AirflowConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Starts a run of `dag_id` with `conf` as its parameters.
    ///
    /// The request body carries the conf plus a logical date pinned 24 hours
    /// in the past at second precision. Orchestrator statuses, 4xx and 5xx
    /// included, come back as a [`TriggerResponse`] rather than an error.
    pub async fn trigger_run(
        &self,
        dag_id: &str,
        conf: &Value,
        token: &str,
    ) -> Result<TriggerResponse, AirflowError> {
        let host = self
            .config
            .host
            .as_deref()
            .ok_or_else(|| AirflowError::Config("AIRFLOW_HOST is not set".to_string()))?;

        let url = format!("{}/api/v2/dags/{}/dagRuns", host, dag_id);
        debug!(url = %url, "Triggering DAG run");

        let response = self
            .http
            .post(&url)
            .timeout(TRIGGER_TIMEOUT)
            .header("Authorization", format!("Bearer {}", token))
            .json(&json!({
                "logical_date": logical_date(),
                "conf": conf,
            }))
            .send()
            .await
            .map_err(|e| {
                AirflowError::Transport(format!("Airflow trigger request failed: {}", e))
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            AirflowError::Transport(format!("Airflow trigger request failed: {}", e))
        })?;

        info!(dag_id = %dag_id, status = status, "Airflow trigger response");

        Ok(TriggerResponse { status, body })
    }
}

/// Logical date for triggered runs: now minus one day, UTC, second
/// precision (`2024-03-14T12:00:00+00:00`).
fn logical_date() -> String {
    (Utc::now() - Duration::days(1)).to_rfc3339_opts(SecondsFormat::Secs, false)
}
