//! Session service binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use session_service::config::Config;
use session_service::http;
use session_service::login::{Argon2Passwords, LoginService, MemoryDirectory, Role};
use session_service::observability::{init_tracing, TracingConfig};
use session_service::session::{CredentialIssuer, SessionGate};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(&TracingConfig::from_config(&config)).context("failed to install tracing")?;

    info!(environment = %config.session.environment, "Starting Session Service");

    let issuer = CredentialIssuer::from_config(&config.session).context("failed to build credential issuer")?;
    let issuer = Arc::new(issuer);
    let gate = SessionGate::new(Arc::clone(&issuer));
    let directory = MemoryDirectory::new(Role {
        id: 1,
        name: "user".to_string(),
    });
    let service = Arc::new(LoginService::new(directory, Argon2Passwords, issuer));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("Session Service listening on {}", addr);

    axum::serve(listener, http::router(gate, service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Session Service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler; run until killed.
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
