//! Artifact removal.
//!
//! Everything here is best effort: a failure to delete is logged and
//! swallowed, and deleting something that is already gone is fine. Cleanup
//! runs while a job may already be failing and must never make it worse.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::infrastructure::storage::{DeleteOutcome, ObjectStore};

/// Local copy of the input object.
///
/// Removal is idempotent. Dropping the artifact also removes the file, so a
/// job that unwinds before reaching cleanup still leaves nothing behind.
#[derive(Debug)]
pub struct TransferArtifact {
    path: PathBuf,
    removed: AtomicBool,
}

impl TransferArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            removed: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether a file was actually removed.
    pub async fn remove(&self) -> bool {
        match tokio::fs::try_exists(&self.path).await {
            Ok(true) => {}
            Ok(false) => {
                info!("File not found: {}", self.path.display());
                self.removed.store(true, Ordering::Release);
                return false;
            }
            Err(e) => {
                warn!("Could not check {}: {}", self.path.display(), e);
                return false;
            }
        }

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("File deleted: {}", self.path.display());
                self.removed.store(true, Ordering::Release);
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("File not found: {}", self.path.display());
                self.removed.store(true, Ordering::Release);
                false
            }
            Err(e) => {
                warn!("Failed to delete {}: {}", self.path.display(), e);
                false
            }
        }
    }
}

impl Drop for TransferArtifact {
    // Only reached with work left when the job unwound before `remove`, or
    // `remove` failed. Blocking fs calls are acceptable on that path.
    fn drop(&mut self) {
        if self.removed.load(Ordering::Acquire) {
            return;
        }
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("Failed to delete {} on drop: {}", self.path.display(), e);
            }
        }
    }
}

/// Deletes remote objects, swallowing every error.
#[derive(Clone)]
pub struct Cleanup {
    store: Arc<dyn ObjectStore>,
}

impl Cleanup {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Returns `None` when the delete request itself failed.
    pub async fn remove_remote(&self, bucket: &str, key: &str) -> Option<DeleteOutcome> {
        match self.store.delete(bucket, key).await {
            Ok(DeleteOutcome::Deleted) => {
                info!("Object '{}' deleted from bucket '{}'", key, bucket);
                Some(DeleteOutcome::Deleted)
            }
            Ok(DeleteOutcome::NotFound) => {
                info!("Object '{}' was already absent from bucket '{}'", key, bucket);
                Some(DeleteOutcome::NotFound)
            }
            Err(e) => {
                warn!("Error deleting object '{}' from bucket '{}': {}", key, bucket, e);
                None
            }
        }
    }
}
