//! Registration HTTP API.
//!
//! Exposes two routes:
//! - `POST /register` validates a registration payload and triggers the
//!   matching pipeline DAG
//! - `GET /healthz` is a liveness probe

use crate::airflow::{AirflowError, TriggerClient};
use crate::credentials::{ProviderError, TokenProvider};
use crate::schema::{validate_payload, ValidationFailure, Violation};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Detail returned when the orchestrator rejects both trigger attempts.
const UNAUTHORIZED_DETAIL: &str = "Unauthorized: token invalid or expired.";

/// Shared state for the registration handlers.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<TokenProvider>,
    pub trigger: Arc<TriggerClient>,
}

/// Response for `POST /register`.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub dag_id: String,
    pub conf: Value,
    pub result: Value,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    violations: Option<Vec<Violation>>,
}

// ---------------------------------------------------------------------------
// Business logic (called from HTTP handlers and unit tests)
// ---------------------------------------------------------------------------

/// Validates a registration payload and triggers the matching pipeline DAG.
///
/// Trigger protocol: one attempt with the cached token; if the orchestrator
/// answers 401/403, one forced token refresh and one retry; a second 401/403
/// is terminal. Every other orchestrator status is passed through to the
/// caller inside the response envelope.
pub async fn handle_register(
    state: &AppState,
    payload: Value,
) -> Result<RegisterResponse, AppError> {
    let config = validate_payload(&payload)?;
    info!(
        service = %config.service(),
        project_name = %config.project_name(),
        "Received registration request"
    );

    let dag_id = config.dag_id();
    let conf = json!(config);

    let token = state.provider.get_token().await?;

    let mut response = state.trigger.trigger_run(dag_id, &conf, &token).await?;

    if response.is_unauthorized() {
        info!(
            status = response.status,
            "Initial trigger unauthorized, refreshing token and retrying"
        );
        let token = state.provider.force_refresh().await?;
        response = state.trigger.trigger_run(dag_id, &conf, &token).await?;
        if response.is_unauthorized() {
            warn!(status = response.status, "Retry trigger unauthorized");
            return Err(AppError::Unauthorized);
        }
    }

    let result: Value = serde_json::from_str(&response.body).map_err(|_| {
        AppError::Airflow(AirflowError::Protocol(
            "Invalid JSON in trigger response".to_string(),
        ))
    })?;

    info!(dag_id = %dag_id, status = response.status, "DAG trigger completed");

    Ok(RegisterResponse {
        dag_id: dag_id.to_string(),
        conf,
        result,
    })
}

// ---------------------------------------------------------------------------
// HTTP handlers
// ---------------------------------------------------------------------------

async fn post_register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<Json<RegisterResponse>, AppError> {
    let response = handle_register(&state, payload).await?;
    Ok(Json(response))
}

async fn healthz() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Failures a registration request can surface, mapped onto HTTP statuses.
#[derive(Debug)]
pub enum AppError {
    /// Payload failed schema validation (422).
    Validation(ValidationFailure),
    /// Token lifecycle failure (500 when misconfigured, 502 otherwise).
    Credentials(ProviderError),
    /// Trigger call failure (500 when misconfigured, 502 otherwise).
    Airflow(AirflowError),
    /// Both trigger attempts were rejected (401).
    Unauthorized,
}

impl From<ValidationFailure> for AppError {
    fn from(e: ValidationFailure) -> Self {
        AppError::Validation(e)
    }
}

impl From<ProviderError> for AppError {
    fn from(e: ProviderError) -> Self {
        AppError::Credentials(e)
    }
}

impl From<AirflowError> for AppError {
    fn from(e: AirflowError) -> Self {
        AppError::Airflow(e)
    }
}

fn airflow_status(e: &AirflowError) -> StatusCode {
    match e {
        AirflowError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        AirflowError::Transport(_) | AirflowError::Protocol(_) => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(failure) => {
                info!(
                    violations = failure.violations.len(),
                    "Rejected invalid registration payload"
                );
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(ErrorResponse {
                        error: failure.to_string(),
                        violations: Some(failure.violations),
                    }),
                )
                    .into_response()
            }
            AppError::Credentials(e) => {
                error!(error = %e, "Token lifecycle failure");
                let status = match &e {
                    ProviderError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    ProviderError::Airflow(cause) => airflow_status(cause),
                };
                (
                    status,
                    Json(ErrorResponse {
                        error: e.to_string(),
                        violations: None,
                    }),
                )
                    .into_response()
            }
            AppError::Airflow(e) => {
                error!(error = %e, "Orchestrator call failure");
                (
                    airflow_status(&e),
                    Json(ErrorResponse {
                        error: e.to_string(),
                        violations: None,
                    }),
                )
                    .into_response()
            }
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: UNAUTHORIZED_DETAIL.to_string(),
                    violations: None,
                }),
            )
                .into_response(),
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/register", post(post_register))
        .route("/healthz", get(healthz))
        .with_state(Arc::new(state))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
