//! Token lifecycle: cached reads and forced refreshes.

use super::TokenStore;
use crate::airflow::{AirflowError, TokenClient};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Why a token could not be produced.
#[derive(Debug)]
pub enum ProviderError {
    /// The persistent store could not be read or written.
    Store(anyhow::Error),
    /// Token generation against the orchestrator failed.
    Airflow(AirflowError),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Store(e) => write!(f, "token store failure: {}", e),
            ProviderError::Airflow(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProviderError::Store(e) => Some(e.as_ref()),
            ProviderError::Airflow(e) => Some(e),
        }
    }
}

impl From<AirflowError> for ProviderError {
    fn from(e: AirflowError) -> Self {
        ProviderError::Airflow(e)
    }
}

/// Hands out orchestrator tokens, caching them in a [`TokenStore`].
///
/// `get_token` serves the cached value and only goes to the network when the
/// slot is empty. `force_refresh` always generates a new token; callers reach
/// for it after the orchestrator rejected the cached one.
pub struct TokenProvider {
    store: Arc<dyn TokenStore>,
    client: TokenClient,
}

impl TokenProvider {
    pub fn new(store: Arc<dyn TokenStore>, client: TokenClient) -> Self {
        Self { store, client }
    }

    /// Returns the cached token, generating and persisting one when the
    /// store is empty.
    pub async fn get_token(&self) -> Result<String, ProviderError> {
        if let Some(token) = self.store.get().map_err(ProviderError::Store)? {
            debug!("Using cached orchestrator token");
            return Ok(token);
        }

        info!("No cached orchestrator token, generating a new one");
        let token = self.client.generate_token().await?;
        self.store.set(&token).map_err(ProviderError::Store)?;
        Ok(token)
    }

    /// Generates a fresh token and overwrites the cached one.
    pub async fn force_refresh(&self) -> Result<String, ProviderError> {
        info!("Refreshing orchestrator token");
        let token = self.client.generate_token().await?;
        self.store.set(&token).map_err(ProviderError::Store)?;
        Ok(token)
    }
}
