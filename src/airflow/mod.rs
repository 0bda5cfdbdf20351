//! Clients for the workflow orchestrator's public API.
//!
//! Two thin clients: [`TokenClient`] obtains bearer tokens from the auth
//! endpoint and [`TriggerClient`] starts DAG runs. Both read connection
//! settings from [`AirflowConfig`](crate::config::AirflowConfig) and report
//! failures as [`AirflowError`].

use std::fmt;
use std::time::Duration;

pub mod token;
pub mod trigger;

pub use token::TokenClient;
pub use trigger::{TriggerClient, TriggerResponse};

/// Timeout for token generation calls.
pub(crate) const AUTH_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for DAG trigger calls.
pub(crate) const TRIGGER_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure talking to the orchestrator.
#[derive(Debug)]
pub enum AirflowError {
    /// Required connection settings are missing; no network call was made.
    Config(String),
    /// The orchestrator could not be reached, or answered outside 2xx where
    /// 2xx was required.
    Transport(String),
    /// The orchestrator answered, but with a body this gateway cannot use.
    Protocol(String),
}

impl fmt::Display for AirflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AirflowError::Config(msg)
            | AirflowError::Transport(msg)
            | AirflowError::Protocol(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AirflowError {}
