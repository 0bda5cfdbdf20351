// Request schemas and validation
pub mod schema;

// Bearer-token persistence and lifecycle
pub mod credentials;

// Orchestrator API clients
pub mod airflow;

// HTTP API
pub mod api;

// Configuration loading
pub mod config;
