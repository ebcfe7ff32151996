//! Inter-process lock built on an exclusive create-new marker file.
//!
//! The marker's existence is the lock. Contenders retry at a fixed interval
//! until a timeout; a marker older than the staleness threshold is presumed to
//! belong to a crashed holder and is removed. The guard deletes the marker on
//! drop, so every exit path releases it.

use std::fs;
use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use crate::config::LockConfig;
use crate::error::{Error, Result};

/// Held lock. Dropping it removes the marker file.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    held: bool,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Releases the lock now instead of at drop.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the marker exists but cannot be removed.
    pub fn release(mut self) -> Result<()> {
        self.remove()
    }

    fn remove(&mut self) -> Result<()> {
        if !self.held {
            return Ok(());
        }
        self.held = false;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.remove();
    }
}

/// Acquires the lock marker at `path`, blocking the calling thread for at
/// most `config.timeout()`.
///
/// # Errors
///
/// Returns `Error::LockTimeout` when the lock stays held past the timeout and
/// `Error::Io` for any filesystem failure other than contention.
pub fn acquire(path: &Path, config: &LockConfig) -> Result<LockGuard> {
    let start = Instant::now();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    loop {
        match fs::OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                // Owner info is diagnostic only; the marker itself is the lock.
                let _ = writeln!(file, "{} {}", std::process::id(), crate::now_iso());
                return Ok(LockGuard {
                    path: path.to_owned(),
                    held: true,
                });
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if remove_if_stale(path, config.stale_after())? {
                    continue;
                }
                let waited = start.elapsed();
                if waited >= config.timeout() {
                    return Err(Error::LockTimeout {
                        path: path.to_owned(),
                        waited,
                    });
                }
                std::thread::sleep(config.retry_interval());
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Removes the marker if its mtime is older than `stale_after`.
///
/// Returns `true` when the caller should retry immediately: either the stale
/// marker was removed, or it vanished between the create attempt and the check.
fn remove_if_stale(path: &Path, stale_after: Duration) -> Result<bool> {
    let modified = match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    };
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or_default();
    if age <= stale_after {
        return Ok(false);
    }

    tracing::info!(path = %path.display(), age_ms = age.as_millis() as u64, "removing stale lock");
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick() -> LockConfig {
        LockConfig {
            timeout_ms: 150,
            retry_interval_ms: 10,
            stale_after_ms: 60_000,
        }
    }

    #[test]
    fn second_acquire_times_out_while_held() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("store.lock");
        let guard = acquire(&path, &quick()).unwrap();
        assert!(path.exists());

        let err = acquire(&path, &quick()).unwrap_err();
        assert!(matches!(err, Error::LockTimeout { .. }));
        assert!(err.is_retryable());

        drop(guard);
        assert!(!path.exists(), "drop releases the marker");
        acquire(&path, &quick()).unwrap();
    }

    #[test]
    fn stale_marker_is_taken_over() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("store.lock");
        std::fs::write(&path, "12345 crashed").unwrap();
        std::thread::sleep(Duration::from_millis(30));

        let config = LockConfig {
            stale_after_ms: 10,
            ..quick()
        };
        let guard = acquire(&path, &config).unwrap();
        assert!(guard.path().exists());
        guard.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn creates_missing_parent_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("store.lock");
        let _guard = acquire(&path, &quick()).unwrap();
        assert!(path.exists());
    }
}
