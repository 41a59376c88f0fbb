//! Builds the service graph from configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use ferry_core::{Config, SharedClock};
use ferry_services::{
    Argon2Hasher, AssemblyEngine, AttemptLimiter, CredentialHasher, DownloadGate, MetadataLedger,
    RetentionManager, SessionLocks, UploadService,
};
use ferry_storage::create_stores;

use crate::state::AppState;

/// Initializes stores and services. The clock is injected so tests can
/// control expiry.
pub async fn initialize_services(config: &Config, clock: SharedClock) -> Result<Arc<AppState>> {
    let stores = create_stores(config)
        .await
        .context("Failed to initialize upload storage")?;

    let locks = SessionLocks::from_settings(&config.locks)
        .map_err(|e| anyhow::anyhow!("Failed to initialize session locks: {}", e))?;
    tracing::info!(
        backend = ?config.locks.backend,
        stale_after_secs = config.locks.stale_after.as_secs(),
        max_attempts = config.locks.max_attempts,
        "Session locks ready"
    );

    let hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2Hasher::new());

    let engine = Arc::new(AssemblyEngine::new(
        stores.chunks.clone(),
        stores.artifacts.clone(),
    ));
    let ledger = Arc::new(MetadataLedger::new(
        stores.chunks.clone(),
        stores.artifacts.clone(),
        locks.clone(),
        engine,
        clock.clone(),
    ));
    let upload = Arc::new(UploadService::new(
        stores.chunks.clone(),
        hasher.clone(),
        ledger,
        config.limits,
    ));
    let gate = Arc::new(DownloadGate::new(
        stores.artifacts.clone(),
        stores.chunks.clone(),
        hasher,
        AttemptLimiter::new(
            config.credential_max_failures,
            config.credential_failure_window,
        ),
        clock.clone(),
    ));
    let retention = Arc::new(RetentionManager::new(
        stores.chunks,
        stores.artifacts,
        locks,
        clock,
        config.retention.orphan_stale_after,
    ));

    Ok(Arc::new(AppState {
        config: Arc::new(config.clone()),
        upload,
        gate,
        retention,
    }))
}
