//! Cross-process lock files
//!
//! A lock is a file created with create-new semantics; whoever creates it owns
//! the model until the guard is dropped. Acquisition never blocks in the OS:
//! contention is retried with exponential backoff and surfaces as
//! `LockContended` once the attempts run out.
//!
//! Abandoned locks are broken only by the holder of a second, short-lived
//! `<model>.lock.break` file, and only after re-checking the lock's age while
//! holding it. Nobody else ever removes a lock file it does not own.

use crate::error::{Result, StoreError};
use crate::file::LockOptions;
use modelreg_types::ModelName;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Held lock; the file is removed on drop
#[derive(Debug)]
pub(crate) struct LockFile {
    path: PathBuf,
}

impl LockFile {
    pub(crate) async fn acquire(path: PathBuf, model: &ModelName, options: &LockOptions) -> Result<Self> {
        let mut delay = options.initial_delay;

        for attempt in 1..=options.max_attempts {
            match Self::try_create(&path).await {
                Ok(lock) => return Ok(lock),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if let Some(stale_after) = options.stale_after {
                        if break_if_stale(&path, model, stale_after).await? {
                            continue;
                        }
                    }
                    debug!(model = %model, attempt, "lock held, backing off");
                    if attempt < options.max_attempts {
                        tokio::time::sleep(delay).await;
                        delay = (delay * 2).min(options.max_delay);
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::LockContended {
            model: model.clone(),
            attempts: options.max_attempts,
        })
    }

    /// Create the lock file, recording the owning process.
    async fn try_create(path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;
        // The guard exists before the write so a failed write still releases.
        let lock = Self {
            path: path.to_path_buf(),
        };
        let owner = format!("{}\n", std::process::id());
        file.write_all(owner.as_bytes()).await?;
        file.flush().await?;
        Ok(lock)
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to release lock");
            }
        }
    }
}

/// Remove `path` if it is older than `stale_after`.
///
/// Returns `true` when the caller should retry creating the lock right away.
async fn break_if_stale(path: &Path, model: &ModelName, stale_after: Duration) -> Result<bool> {
    if !is_stale(path, stale_after).await {
        return Ok(false);
    }

    let breaker_path = breaker_path(path);
    let _breaker = match LockFile::try_create(&breaker_path).await {
        Ok(breaker) => breaker,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            // Another writer is breaking this lock. A breaker left behind by a
            // crashed process ages out like any other lock.
            if is_stale(&breaker_path, stale_after.max(Duration::from_secs(1))).await {
                warn!(model = %model, path = %breaker_path.display(), "removing abandoned lock breaker");
                remove_if_present(&breaker_path).await?;
            }
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };

    // Between the first check and taking the breaker the lock may have been
    // broken and re-taken by a live writer.
    if !is_stale(path, stale_after).await {
        return Ok(false);
    }
    warn!(model = %model, path = %path.display(), "breaking stale lock");
    remove_if_present(path).await?;
    Ok(true)
}

fn breaker_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".break");
    PathBuf::from(name)
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn is_stale(path: &Path, stale_after: Duration) -> bool {
    let modified = match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(_) => return false,
    };
    SystemTime::now()
        .duration_since(modified)
        .map(|age| age > stale_after)
        .unwrap_or(false)
}
