// Integration tests for the registration API

use airgate::airflow::{TokenClient, TriggerClient};
use airgate::api::{create_router, AppState};
use airgate::config::AirflowConfig;
use airgate::credentials::{SqliteTokenStore, TokenProvider, TokenStore};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn create_test_app(host: &str) -> (Router, Arc<SqliteTokenStore>) {
    let store = Arc::new(SqliteTokenStore::new(":memory:").unwrap());
    let airflow = AirflowConfig {
        host: Some(host.to_string()),
        username: Some("airflow".to_string()),
        password: Some("secret".to_string()),
    };
    let state = AppState {
        provider: Arc::new(TokenProvider::new(
            Arc::clone(&store) as Arc<dyn TokenStore>,
            TokenClient::new(airflow.clone()),
        )),
        trigger: Arc::new(TriggerClient::new(airflow)),
    };
    (create_router(state), store)
}

fn register_request(payload: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/register")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn mysql_payload() -> Value {
    json!({
        "service": "mysql",
        "project_name": "news_crawler",
        "st_seq": 3,
        "query": "SELECT * FROM articles",
        "mysql_host": "db.internal:3306",
        "mysql_database": "newsdb",
        "mysql_table": "articles",
        "user": "etl",
        "password": "secret",
        "fields": ["an_title", "in_date"]
    })
}

fn elasticsearch_payload() -> Value {
    json!({
        "service": "elasticsearch",
        "project_name": "archive-sync",
        "st_seq": 7,
        "query": "{\"match_all\": {}}",
        "es_source_index": "lucy_main_v4_20240314",
        "es_target_hosts": "http://es.internal:9200",
        "es_target_index": "archive_v2",
        "user": "etl",
        "password": "secret",
        "fields": ["kw_docid", "an_content"]
    })
}

#[tokio::test]
async fn test_register_mysql_uses_cached_token() {
    let mut server = mockito::Server::new_async().await;
    let auth = server
        .mock("POST", "/auth/token")
        .expect(0)
        .create_async()
        .await;
    let trigger = server
        .mock("POST", "/api/v2/dags/mysql_pipeline_dag/dagRuns")
        .match_header("authorization", "Bearer cached-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"dag_run_id": "manual__2024-03-15T12:00:00"}"#)
        .create_async()
        .await;

    let (app, store) = create_test_app(&server.url());
    store.set("cached-token").unwrap();

    let response = app.oneshot(register_request(&mysql_payload())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["dag_id"], "mysql_pipeline_dag");
    assert_eq!(body["conf"]["service"], "mysql");
    assert_eq!(body["conf"]["project_name"], "news_crawler");
    // The forwarded conf is the canonical record, defaults filled in
    assert_eq!(body["conf"]["es_source_index"], "lucy_main_v4_20240314");
    assert_eq!(body["result"]["dag_run_id"], "manual__2024-03-15T12:00:00");

    auth.assert_async().await;
    trigger.assert_async().await;
    assert_eq!(store.get().unwrap(), Some("cached-token".to_string()));
}

#[tokio::test]
async fn test_register_elasticsearch_normalizes_project_name() {
    let mut server = mockito::Server::new_async().await;
    let trigger = server
        .mock("POST", "/api/v2/dags/elasticsearch_pipeline_dag/dagRuns")
        .match_header("authorization", "Bearer cached-token")
        .with_status(200)
        .with_body(r#"{"dag_run_id": "manual__es"}"#)
        .create_async()
        .await;

    let (app, store) = create_test_app(&server.url());
    store.set("cached-token").unwrap();

    let response = app
        .oneshot(register_request(&elasticsearch_payload()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["dag_id"], "elasticsearch_pipeline_dag");
    // Hyphens in the project name come back as underscores
    assert_eq!(body["conf"]["project_name"], "archive_sync");
    assert_eq!(body["conf"]["es_target_index"], "archive_v2");

    trigger.assert_async().await;
}

#[tokio::test]
async fn test_register_refreshes_token_and_retries_once() {
    let mut server = mockito::Server::new_async().await;
    let auth = server
        .mock("POST", "/auth/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token": "fresh-token"}"#)
        .create_async()
        .await;
    let rejected = server
        .mock("POST", "/api/v2/dags/mysql_pipeline_dag/dagRuns")
        .match_header("authorization", "Bearer stale-token")
        .with_status(401)
        .with_body(r#"{"detail": "expired"}"#)
        .create_async()
        .await;
    let accepted = server
        .mock("POST", "/api/v2/dags/mysql_pipeline_dag/dagRuns")
        .match_header("authorization", "Bearer fresh-token")
        .with_status(200)
        .with_body(r#"{"dag_run_id": "manual__retry"}"#)
        .create_async()
        .await;

    let (app, store) = create_test_app(&server.url());
    store.set("stale-token").unwrap();

    let response = app.oneshot(register_request(&mysql_payload())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["result"]["dag_run_id"], "manual__retry");

    // The refreshed token replaced the stale one
    assert_eq!(store.get().unwrap(), Some("fresh-token".to_string()));
    auth.assert_async().await;
    rejected.assert_async().await;
    accepted.assert_async().await;
}

#[tokio::test]
async fn test_register_unauthorized_after_retry() {
    let mut server = mockito::Server::new_async().await;
    let auth = server
        .mock("POST", "/auth/token")
        .with_status(200)
        .with_body(r#"{"access_token": "still-rejected"}"#)
        .create_async()
        .await;
    let first = server
        .mock("POST", "/api/v2/dags/mysql_pipeline_dag/dagRuns")
        .match_header("authorization", "Bearer stale-token")
        .with_status(401)
        .create_async()
        .await;
    let retry = server
        .mock("POST", "/api/v2/dags/mysql_pipeline_dag/dagRuns")
        .match_header("authorization", "Bearer still-rejected")
        .with_status(403)
        .create_async()
        .await;

    let (app, store) = create_test_app(&server.url());
    store.set("stale-token").unwrap();

    let response = app.oneshot(register_request(&mysql_payload())).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = read_json(response).await;
    assert_eq!(body["error"], "Unauthorized: token invalid or expired.");

    // Exactly one refresh and exactly one retry
    auth.assert_async().await;
    first.assert_async().await;
    retry.assert_async().await;
}

#[tokio::test]
async fn test_register_generates_token_when_store_empty() {
    let mut server = mockito::Server::new_async().await;
    let auth = server
        .mock("POST", "/auth/token")
        .with_status(200)
        .with_body(r#"{"access_token": "first-token"}"#)
        .create_async()
        .await;
    let trigger = server
        .mock("POST", "/api/v2/dags/mysql_pipeline_dag/dagRuns")
        .match_header("authorization", "Bearer first-token")
        .with_status(200)
        .with_body(r#"{"dag_run_id": "manual__first"}"#)
        .create_async()
        .await;

    let (app, store) = create_test_app(&server.url());

    let response = app.oneshot(register_request(&mysql_payload())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(store.get().unwrap(), Some("first-token".to_string()));
    auth.assert_async().await;
    trigger.assert_async().await;
}

#[tokio::test]
async fn test_register_validation_failure_returns_all_violations() {
    // Unroutable host: a rejected payload must never reach the network
    let (app, _store) = create_test_app("http://127.0.0.1:1");

    let mut payload = mysql_payload();
    payload["project_name"] = json!("has space");
    payload["st_seq"] = json!("not-a-number");
    payload["fields"] = json!(["an_title", "bogus"]);

    let response = app.oneshot(register_request(&payload)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = read_json(response).await;
    let violations = body["violations"].as_array().unwrap();
    assert_eq!(violations.len(), 3);

    let fields: Vec<&str> = violations
        .iter()
        .map(|v| v["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"project_name"));
    assert!(fields.contains(&"st_seq"));
    assert!(fields.contains(&"fields"));

    let fields_violation = violations
        .iter()
        .find(|v| v["field"] == "fields")
        .unwrap();
    assert!(fields_violation["message"]
        .as_str()
        .unwrap()
        .contains("bogus"));
}

#[tokio::test]
async fn test_register_unknown_service_rejected() {
    let (app, _store) = create_test_app("http://127.0.0.1:1");

    let mut payload = mysql_payload();
    payload["service"] = json!("postgres");

    let response = app.oneshot(register_request(&payload)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = read_json(response).await;
    let violations = body["violations"].as_array().unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0]["field"], "service");
}

#[tokio::test]
async fn test_register_malformed_json_is_bad_request() {
    let (app, _store) = create_test_app("http://127.0.0.1:1");

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/register")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_passes_through_orchestrator_conflict() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/v2/dags/mysql_pipeline_dag/dagRuns")
        .with_status(409)
        .with_body(r#"{"detail": "run already exists"}"#)
        .create_async()
        .await;

    let (app, store) = create_test_app(&server.url());
    store.set("cached-token").unwrap();

    let response = app.oneshot(register_request(&mysql_payload())).await.unwrap();

    // Non-auth orchestrator statuses are the caller's to interpret
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["result"]["detail"], "run already exists");
}

#[tokio::test]
async fn test_register_non_json_trigger_body_is_bad_gateway() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/v2/dags/mysql_pipeline_dag/dagRuns")
        .with_status(200)
        .with_body("accepted")
        .create_async()
        .await;

    let (app, store) = create_test_app(&server.url());
    store.set("cached-token").unwrap();

    let response = app.oneshot(register_request(&mysql_payload())).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = read_json(response).await;
    assert_eq!(body["error"], "Invalid JSON in trigger response");
}

#[tokio::test]
async fn test_register_auth_endpoint_failure_is_bad_gateway() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/auth/token")
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let (app, _store) = create_test_app(&server.url());

    let response = app.oneshot(register_request(&mysql_payload())).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = read_json(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Airflow token request failed"));
}

#[tokio::test]
async fn test_register_missing_credentials_is_server_error() {
    let store = Arc::new(SqliteTokenStore::new(":memory:").unwrap());
    let airflow = AirflowConfig {
        host: Some("http://127.0.0.1:1".to_string()),
        username: None,
        password: None,
    };
    let state = AppState {
        provider: Arc::new(TokenProvider::new(
            Arc::clone(&store) as Arc<dyn TokenStore>,
            TokenClient::new(airflow.clone()),
        )),
        trigger: Arc::new(TriggerClient::new(airflow)),
    };
    let app = create_router(state);

    let response = app.oneshot(register_request(&mysql_payload())).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = read_json(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("AIRFLOW_USER/AIRFLOW_PASSWORD"));
}

#[tokio::test]
async fn test_healthz() {
    let (app, _store) = create_test_app("http://127.0.0.1:1");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["status"], "ok");
}
