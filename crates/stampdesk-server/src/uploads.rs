//! File upload acceptance.
//!
//! A file is stored only when it has a non-empty filename with an
//! allow-listed extension; the stored name is a freshly generated opaque
//! name, never the client's. Any rejection or filesystem failure yields
//! "no file" so uploads remain optional everywhere.

use crate::config::UploadConfig;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::warn;
use uuid::Uuid;

#[async_trait]
pub trait UploadStore: Send + Sync + 'static {
    /// Returns the stored reference name, or `None` when rejected.
    async fn save(&self, original_name: &str, bytes: &[u8]) -> Option<String>;

    fn root(&self) -> &PathBuf;
}

pub(crate) fn allowed_extension(name: &str, allowed: &HashSet<String>) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }
    let ext = trimmed.rsplit_once('.')?.1.to_ascii_lowercase();
    if allowed.contains(&ext) {
        Some(ext)
    } else {
        None
    }
}

pub struct LocalFsUploads {
    config: UploadConfig,
}

impl LocalFsUploads {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl UploadStore for LocalFsUploads {
    async fn save(&self, original_name: &str, bytes: &[u8]) -> Option<String> {
        if bytes.is_empty() {
            return None;
        }
        let ext = allowed_extension(original_name, &self.config.allowed_extensions)?;
        let stored_name = format!("{}.{ext}", Uuid::new_v4().simple());
        let path = self.config.dir.join(&stored_name);
        if let Err(e) = tokio::fs::create_dir_all(&self.config.dir).await {
            warn!("upload dir unavailable: {e}");
            return None;
        }
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => Some(stored_name),
            Err(e) => {
                warn!(name = %original_name, "upload save failed: {e}");
                None
            }
        }
    }

    fn root(&self) -> &PathBuf {
        &self.config.dir
    }
}
