//! Server startup and graceful shutdown

use anyhow::Result;
use ferry_core::Config;

use super::App;

/// Start the server with graceful shutdown
pub async fn start_server(config: &Config, app: App) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.server_port);
    tracing::info!(addr = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        max_chunk_bytes = config.limits.max_chunk_bytes,
        max_file_bytes = config.limits.max_file_bytes,
        max_retention_hours = config.limits.max_retention_hours,
        lock_backend = ?config.locks.backend,
        cleanup_enabled = config.retention.enabled,
        cleanup_endpoints = config.cleanup_token.is_some(),
        "Server ready and accepting connections"
    );

    let App {
        router, background, ..
    } = app;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    background.shutdown().await;
    ferry_infra::shutdown_telemetry().await;
    tracing::info!("Server stopped");

    Ok(())
}

/// Resolves on Ctrl+C (SIGINT) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}
