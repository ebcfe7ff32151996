use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::store::Revision;

/// Every failure the store, reconciler, and shared actions can surface.
///
/// `LockTimeout` and `Conflict` are transient: the caller should report them
/// and let the user (or agent) retry. `VersionMismatch` needs a migration.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store schema version mismatch: found {found:?}, expected {expected}")]
    VersionMismatch { found: Option<u64>, expected: u64 },

    #[error("timed out after {:.2}s waiting for lock {}", waited.as_secs_f64(), path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("store changed since it was read (expected revision {expected}, found {actual})")]
    Conflict { expected: Revision, actual: Revision },

    #[error("comment not found: {0}")]
    NotFound(String),

    #[error("invalid anchor: {0}")]
    InvalidAnchor(String),
}

impl Error {
    /// True for conditions that clear up on their own once the other writer is done.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::LockTimeout { .. } | Error::Conflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
