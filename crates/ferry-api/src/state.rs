//! Application state shared by all handlers.

use std::sync::Arc;

use ferry_core::Config;
use ferry_services::{DownloadGate, RetentionManager, UploadService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub upload: Arc<UploadService>,
    pub gate: Arc<DownloadGate>,
    pub retention: Arc<RetentionManager>,
}

impl AppState {
    /// Admin token for the cleanup endpoints; `None` disables them.
    pub fn cleanup_token(&self) -> Option<&str> {
        self.config
            .cleanup_token
            .as_deref()
            .filter(|token| !token.is_empty())
    }
}
