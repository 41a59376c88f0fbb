//! Application setup and initialization

mod maintenance;
pub mod routes;
pub mod server;
pub mod services;

use std::sync::Arc;

use anyhow::{Context, Result};
use ferry_core::{Config, SharedClock, SystemClock};
use ferry_infra::{init_telemetry, TelemetryOptions};
use ferry_services::RetentionScheduler;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::state::AppState;
use maintenance::MaintenanceSweep;

/// A running application: state, router and its background tasks.
pub struct App {
    pub state: Arc<AppState>,
    pub router: axum::Router,
    pub background: Background,
}

/// Background tasks stopped on graceful shutdown.
pub struct Background {
    cancel: CancellationToken,
    retention: Option<JoinHandle<()>>,
}

impl Background {
    pub fn none() -> Self {
        Self {
            cancel: CancellationToken::new(),
            retention: None,
        }
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Some(handle) = self.retention {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Retention scheduler ended abnormally");
            }
        }
    }
}

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<App> {
    let telemetry = TelemetryOptions::from_env(
        "ferry",
        env!("CARGO_PKG_VERSION"),
        &config.environment,
    );
    init_telemetry(&telemetry).map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    config.validate().context("Configuration validation failed")?;
    tracing::info!(
        environment = %config.environment,
        temp_root = %config.temp_root.display(),
        final_root = %config.final_root.display(),
        "Configuration loaded and validated successfully"
    );

    let clock: SharedClock = Arc::new(SystemClock);
    let state = services::initialize_services(&config, clock).await?;
    let router = routes::setup_routes(&config, state.clone())?;

    let background = if config.retention.enabled {
        let cancel = CancellationToken::new();
        let sweeper = Arc::new(MaintenanceSweep::new(state.clone()));
        let handle = RetentionScheduler::new(sweeper, config.retention.interval).start(cancel.clone());
        tracing::info!(
            interval_secs = config.retention.interval.as_secs(),
            "Retention scheduler started"
        );
        Background {
            cancel,
            retention: Some(handle),
        }
    } else {
        tracing::info!("Retention scheduler disabled");
        Background::none()
    };

    Ok(App {
        state,
        router,
        background,
    })
}
