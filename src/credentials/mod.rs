//! Bearer-token persistence and lifecycle.
//!
//! The orchestrator token lives in a single persistent slot ([`TokenStore`]).
//! [`TokenProvider`] layers the lifecycle on top: serve the cached token when
//! one exists, generate and persist a fresh one when it does not, and force a
//! refresh once the orchestrator has rejected the cached value. Freshness is
//! never inferred locally; only an orchestrator 401/403 invalidates a token.

use anyhow::Result;

mod provider;
mod store;

pub use provider::{ProviderError, TokenProvider};
pub use store::SqliteTokenStore;

/// Persistent slot for the orchestrator bearer token.
///
/// Implementations are shared across request handlers behind an `Arc`, so
/// they must be `Send + Sync` and internally synchronized.
pub trait TokenStore: Send + Sync {
    /// Returns the stored token, or `None` when the slot is empty.
    fn get(&self) -> Result<Option<String>>;

    /// Writes `token`, replacing any previous value.
    fn set(&self, token: &str) -> Result<()>;
}
