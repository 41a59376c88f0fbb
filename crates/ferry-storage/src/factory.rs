#[cfg(feature = "storage-local")]
use crate::{LocalArtifactStore, LocalChunkStore};
use crate::{ArtifactStore, ChunkStore, StorageError, StorageResult};
use ferry_core::Config;
use std::sync::Arc;

/// Both storage areas an upload moves through.
#[derive(Clone)]
pub struct Stores {
    pub chunks: Arc<dyn ChunkStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
}

/// Create the temporary and final stores based on configuration
#[cfg(feature = "storage-local")]
pub async fn create_stores(config: &Config) -> StorageResult<Stores> {
    if config.temp_root == config.final_root {
        return Err(StorageError::ConfigError(
            "Temporary and final roots must differ".to_string(),
        ));
    }

    let chunks = LocalChunkStore::new(config.temp_root.clone()).await?;
    let artifacts = LocalArtifactStore::new(config.final_root.clone()).await?;

    tracing::info!(
        temp_root = %config.temp_root.display(),
        final_root = %config.final_root.display(),
        "Local storage initialized"
    );

    Ok(Stores {
        chunks: Arc::new(chunks),
        artifacts: Arc::new(artifacts),
    })
}

#[cfg(not(feature = "storage-local"))]
pub async fn create_stores(_config: &Config) -> StorageResult<Stores> {
    Err(StorageError::ConfigError(
        "Local storage backend not available (storage-local feature not enabled)".to_string(),
    ))
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_stores_makes_roots() {
        let dir = tempdir().unwrap();
        let config = Config::with_roots(dir.path().join("tmp"), dir.path().join("final"));
        let _stores = create_stores(&config).await.unwrap();
        assert!(dir.path().join("tmp").is_dir());
        assert!(dir.path().join("final").join(".staging").is_dir());
    }

    #[tokio::test]
    async fn test_same_roots_rejected() {
        let dir = tempdir().unwrap();
        let config = Config::with_roots(dir.path(), dir.path());
        assert!(create_stores(&config).await.is_err());
    }
}
