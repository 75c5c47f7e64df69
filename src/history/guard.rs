use crate::Result;
use fs2::FileExt;
use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};
use tracing::{trace, warn};

/// Cross-process mutual exclusion around a message store file.
///
/// The lock is an advisory `flock`-style lock on a sidecar `<db>.lock` file.
/// Every acquisition opens its own handle, so two guards for the same store
/// exclude each other whether they live in the same process, in different
/// threads, or in different processes.
#[derive(Debug, Clone)]
pub struct StorageGuard {
    lock_path: PathBuf,
}

/// Held lock. Released when dropped.
#[derive(Debug)]
pub struct GuardLease {
    file: File,
}

impl StorageGuard {
    pub fn for_store(db_path: &Path) -> Self {
        let name = db_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store".to_string());
        Self {
            lock_path: db_path.with_file_name(format!("{name}.lock")),
        }
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Blocks the calling thread until the lock is free. Async callers run
    /// this on the blocking pool.
    pub fn acquire_blocking(&self) -> Result<GuardLease> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        file.lock_exclusive()?;
        trace!("Acquired storage guard: {}", self.lock_path.display());
        Ok(GuardLease { file })
    }

    /// Non-blocking attempt; `None` when another holder has the lock.
    pub fn try_acquire(&self) -> Result<Option<GuardLease>> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(GuardLease { file })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for GuardLease {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release storage guard: {}", e);
        }
    }
}
