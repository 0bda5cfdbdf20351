use airgate::airflow::{TokenClient, TriggerClient};
use airgate::api::{create_router, AppState};
use airgate::config;
use airgate::credentials::{SqliteTokenStore, TokenProvider, TokenStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "airgate=info".into()),
        )
        .init();

    info!("Airgate starting...");

    let config = config::load().context("Failed to load configuration")?;
    info!(
        bind_addr = %config.server.bind_addr,
        token_db = %config.server.token_db,
        airflow_host = config.airflow.host.as_deref().unwrap_or("<unset>"),
        credentials_configured =
            config.airflow.username.is_some() && config.airflow.password.is_some(),
        "Configuration loaded"
    );

    // Initialize token store
    let store = Arc::new(
        SqliteTokenStore::new(&config.server.token_db)
            .context("Failed to initialize token store")?,
    );
    info!("Token store initialized");

    // Seed an empty store from the environment, if a token was provided
    if store.get().context("Failed to read token store")?.is_none() {
        if let Some(token) = config::seed_token() {
            store.set(&token).context("Failed to seed token store")?;
            info!("Token store seeded from environment");
        }
    }

    let state = AppState {
        provider: Arc::new(TokenProvider::new(
            Arc::clone(&store) as Arc<dyn TokenStore>,
            TokenClient::new(config.airflow.clone()),
        )),
        trigger: Arc::new(TriggerClient::new(config.airflow.clone())),
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .context("Failed to bind listen address")?;
    info!(bind_addr = %config.server.bind_addr, "Gateway listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "Gateway server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    info!("Gateway stopped");

    Ok(())
}
