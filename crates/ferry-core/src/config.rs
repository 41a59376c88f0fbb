//! Configuration module
//!
//! Settings for the HTTP server, the two storage roots, session locking, upload
//! limits, credentials and retention. Loaded from the environment (optionally a
//! `.env` file) with defaults for everything except the cleanup token.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::BYTES_PER_MB;

const SERVER_PORT: u16 = 5000;
const TEMP_UPLOAD_DIR: &str = "temp_uploads";
const UPLOAD_DIR: &str = "uploads";
const LOCK_STALE_SECS: u64 = 30;
const LOCK_MAX_ATTEMPTS: u32 = 10;
const LOCK_RETRY_BASE_MS: u64 = 25;
const LOCK_RETRY_MAX_MS: u64 = 1000;
const MAX_CHUNK_SIZE_MB: u64 = 10;
const MAX_FILE_SIZE_MB: u64 = 4096;
const MAX_TOTAL_CHUNKS: u32 = 10_000;
const MAX_RETENTION_HOURS: u32 = 24;
const CREDENTIAL_LENGTH: usize = 4;
const CREDENTIAL_MAX_FAILURES: u32 = 5;
const CREDENTIAL_FAILURE_WINDOW_SECS: u64 = 300;
const CLEANUP_INTERVAL_SECS: u64 = 900;
const ORPHAN_STALE_HOURS: u64 = 24;
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;
const MIN_PRODUCTION_TOKEN_LEN: usize = 16;

/// Which named-lock implementation guards session metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockBackend {
    /// In-process mutex map. Single process only.
    Memory,
    /// Lock files next to the temporary root. Safe across processes on one host.
    File,
}

impl std::str::FromStr for LockBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Ok(LockBackend::Memory),
            "file" | "fs" => Ok(LockBackend::File),
            other => Err(anyhow::anyhow!(
                "LOCK_BACKEND must be 'memory' or 'file', got '{}'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LockSettings {
    pub backend: LockBackend,
    pub dir: PathBuf,
    pub stale_after: Duration,
    pub max_attempts: u32,
    pub retry_base: Duration,
    pub retry_max: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_chunk_bytes: u64,
    pub max_file_bytes: u64,
    pub max_total_chunks: u32,
    pub max_retention_hours: u32,
    pub credential_length: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_chunk_bytes: MAX_CHUNK_SIZE_MB * BYTES_PER_MB,
            max_file_bytes: MAX_FILE_SIZE_MB * BYTES_PER_MB,
            max_total_chunks: MAX_TOTAL_CHUNKS,
            max_retention_hours: MAX_RETENTION_HOURS,
            credential_length: CREDENTIAL_LENGTH,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetentionSettings {
    pub enabled: bool,
    pub interval: Duration,
    pub orphan_stale_after: chrono::Duration,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub temp_root: PathBuf,
    pub final_root: PathBuf,
    pub locks: LockSettings,
    pub limits: UploadLimits,
    pub credential_max_failures: u32,
    pub credential_failure_window: Duration,
    pub retention: RetentionSettings,
    pub cleanup_token: Option<String>,
    pub http_concurrency_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_roots(TEMP_UPLOAD_DIR, UPLOAD_DIR)
    }
}

impl Config {
    /// Default settings rooted at the given temporary and final directories.
    pub fn with_roots(temp_root: impl Into<PathBuf>, final_root: impl Into<PathBuf>) -> Self {
        let temp_root = temp_root.into();
        Self {
            server_port: SERVER_PORT,
            environment: "development".to_string(),
            cors_origins: vec!["*".to_string()],
            locks: LockSettings {
                backend: LockBackend::Memory,
                dir: temp_root.join(".locks"),
                stale_after: Duration::from_secs(LOCK_STALE_SECS),
                max_attempts: LOCK_MAX_ATTEMPTS,
                retry_base: Duration::from_millis(LOCK_RETRY_BASE_MS),
                retry_max: Duration::from_millis(LOCK_RETRY_MAX_MS),
            },
            temp_root,
            final_root: final_root.into(),
            limits: UploadLimits::default(),
            credential_max_failures: CREDENTIAL_MAX_FAILURES,
            credential_failure_window: Duration::from_secs(CREDENTIAL_FAILURE_WINDOW_SECS),
            retention: RetentionSettings {
                enabled: true,
                interval: Duration::from_secs(CLEANUP_INTERVAL_SECS),
                orphan_stale_after: chrono::Duration::hours(ORPHAN_STALE_HOURS as i64),
            },
            cleanup_token: None,
            http_concurrency_limit: HTTP_CONCURRENCY_LIMIT,
        }
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins: Vec<String> = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let temp_root = PathBuf::from(
            env::var("TEMP_UPLOAD_DIR").unwrap_or_else(|_| TEMP_UPLOAD_DIR.to_string()),
        );
        let final_root =
            PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| UPLOAD_DIR.to_string()));

        let locks = LockSettings {
            backend: env::var("LOCK_BACKEND")
                .unwrap_or_else(|_| "memory".to_string())
                .parse()?,
            dir: env::var("LOCK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| temp_root.join(".locks")),
            stale_after: Duration::from_secs(env_or("LOCK_STALE_SECS", LOCK_STALE_SECS)),
            max_attempts: env_or("LOCK_MAX_ATTEMPTS", LOCK_MAX_ATTEMPTS),
            retry_base: Duration::from_millis(env_or("LOCK_RETRY_BASE_MS", LOCK_RETRY_BASE_MS)),
            retry_max: Duration::from_millis(env_or("LOCK_RETRY_MAX_MS", LOCK_RETRY_MAX_MS)),
        };

        let limits = UploadLimits {
            max_chunk_bytes: env_or("MAX_CHUNK_SIZE_MB", MAX_CHUNK_SIZE_MB) * BYTES_PER_MB,
            max_file_bytes: env_or("MAX_FILE_SIZE_MB", MAX_FILE_SIZE_MB) * BYTES_PER_MB,
            max_total_chunks: env_or("MAX_TOTAL_CHUNKS", MAX_TOTAL_CHUNKS),
            max_retention_hours: env_or("MAX_RETENTION_HOURS", MAX_RETENTION_HOURS),
            credential_length: env_or("CREDENTIAL_LENGTH", CREDENTIAL_LENGTH),
        };

        let retention = RetentionSettings {
            enabled: env::var("CLEANUP_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(true),
            interval: Duration::from_secs(env_or("CLEANUP_INTERVAL_SECS", CLEANUP_INTERVAL_SECS)),
            orphan_stale_after: chrono::Duration::hours(
                env_or("ORPHAN_STALE_HOURS", ORPHAN_STALE_HOURS) as i64,
            ),
        };

        let config = Config {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            cors_origins,
            temp_root,
            final_root,
            locks,
            limits,
            credential_max_failures: env_or("CREDENTIAL_MAX_FAILURES", CREDENTIAL_MAX_FAILURES),
            credential_failure_window: Duration::from_secs(env_or(
                "CREDENTIAL_FAILURE_WINDOW_SECS",
                CREDENTIAL_FAILURE_WINDOW_SECS,
            )),
            retention,
            cleanup_token: env::var("CLEANUP_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            http_concurrency_limit: env_or("HTTP_CONCURRENCY_LIMIT", HTTP_CONCURRENCY_LIMIT),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.temp_root == self.final_root {
            return Err(anyhow::anyhow!(
                "TEMP_UPLOAD_DIR and UPLOAD_DIR must be different directories"
            ));
        }

        if self.locks.max_attempts == 0 {
            return Err(anyhow::anyhow!("LOCK_MAX_ATTEMPTS must be at least 1"));
        }

        if self.locks.retry_base > self.locks.retry_max {
            return Err(anyhow::anyhow!(
                "LOCK_RETRY_BASE_MS must not exceed LOCK_RETRY_MAX_MS"
            ));
        }

        if self.locks.stale_after.is_zero() {
            return Err(anyhow::anyhow!("LOCK_STALE_SECS must be greater than 0"));
        }

        if self.limits.max_chunk_bytes == 0
            || self.limits.max_file_bytes == 0
            || self.limits.max_total_chunks == 0
        {
            return Err(anyhow::anyhow!(
                "MAX_CHUNK_SIZE_MB, MAX_FILE_SIZE_MB and MAX_TOTAL_CHUNKS must be greater than 0"
            ));
        }

        if self.limits.max_retention_hours == 0 {
            return Err(anyhow::anyhow!("MAX_RETENTION_HOURS must be at least 1"));
        }

        if self.limits.credential_length == 0 {
            return Err(anyhow::anyhow!("CREDENTIAL_LENGTH must be at least 1"));
        }

        if self.retention.interval.is_zero() {
            return Err(anyhow::anyhow!("CLEANUP_INTERVAL_SECS must be greater than 0"));
        }

        if self.http_concurrency_limit == 0 {
            return Err(anyhow::anyhow!("HTTP_CONCURRENCY_LIMIT must be greater than 0"));
        }

        if self.is_production() {
            if self.cors_origins.iter().any(|o| o == "*") {
                return Err(anyhow::anyhow!(
                    "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
                ));
            }
            if let Some(token) = &self.cleanup_token {
                if token.len() < MIN_PRODUCTION_TOKEN_LEN {
                    return Err(anyhow::anyhow!(
                        "CLEANUP_TOKEN must be at least {} characters long in production",
                        MIN_PRODUCTION_TOKEN_LEN
                    ));
                }
            }
        }

        Ok(())
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
