//! Per-run scratch directory.
//!
//! Every target in a run writes its credential files and artifacts here.
//! The directory is removed recursively when the run ends, on success and on
//! every error path, because `TempDir` removes itself on drop.

use std::path::Path;
use tempfile::TempDir;
use tracing::{info, warn};

pub struct ScratchDir {
    inner: TempDir,
}

impl ScratchDir {
    /// Create a fresh directory under `root`, or under the system temp dir.
    pub fn create(root: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("etcd-backup-");

        let inner = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        info!("Created temporary directory: {}", inner.path().display());
        Ok(Self { inner })
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    #[cfg(test)]
    pub fn join(&self, name: &str) -> std::path::PathBuf {
        self.inner.path().join(name)
    }

    /// Remove the directory now, logging instead of failing if removal errors.
    pub fn release(self) {
        let path = self.inner.path().to_path_buf();
        match self.inner.close() {
            Ok(()) => info!("Removed temporary directory: {}", path.display()),
            Err(e) => warn!("Failed to remove temporary directory {}: {}", path.display(), e),
        }
    }
}
