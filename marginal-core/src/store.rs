//! The on-disk comment store: `.marginal/comments.json`.
//!
//! Every write goes through the lock in [`crate::lock`] and lands via
//! write-to-temp-then-rename in the same directory, so readers never observe
//! a partially written document. [`Store::mutate`] is the read-modify-write
//! primitive; [`Store::read`] / [`Store::write`] serve snapshot use cases and
//! carry an optional optimistic-concurrency check.

use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::config::LockConfig;
use crate::error::{Error, Result};
use crate::lock::{self, LockGuard};
use crate::schema::{self, CURRENT_VERSION};
use crate::types::Document;

/// Marker directory at the project root.
pub const STORE_DIR: &str = ".marginal";
pub const STORE_FILE: &str = "comments.json";
pub const LOCK_FILE: &str = "comments.json.lock";
pub const CONFIG_FILE: &str = "config.toml";

/// Digest of the raw store bytes at read time.
///
/// `Missing` is the sentinel for "no store file existed".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Revision {
    #[default]
    Missing,
    Digest(String),
}

impl Revision {
    pub fn of(bytes: &[u8]) -> Self {
        Revision::Digest(hex::encode(Sha256::digest(bytes)))
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::Missing => f.write_str("missing"),
            Revision::Digest(d) => f.write_str(&d[..d.len().min(12)]),
        }
    }
}

/// What a mutator did to the document it was handed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation<T> {
    /// The document changed and must be written back.
    Changed(T),
    /// Nothing changed; skip the write.
    Unchanged(T),
}

/// Result of [`Store::mutate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutated<T> {
    pub value: T,
    /// Revision of the store after the call: the written bytes, or the
    /// bytes read under the lock when nothing was written.
    pub revision: Revision,
    pub written: bool,
}

/// Handle to a project's comment store. Cheap to construct; holds no open files.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    path: PathBuf,
    lock_path: PathBuf,
    lock: LockConfig,
}

impl Store {
    /// Store for the project rooted at `project_root`, with default lock timing.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let root = project_root.into();
        let dir = root.join(STORE_DIR);
        Self {
            path: dir.join(STORE_FILE),
            lock_path: dir.join(LOCK_FILE),
            root,
            lock: LockConfig::default(),
        }
    }

    pub fn with_lock_config(mut self, lock: LockConfig) -> Self {
        self.lock = lock;
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and migrates the store. A missing file yields an empty document
    /// whose revision is [`Revision::Missing`].
    ///
    /// # Errors
    ///
    /// Returns `Error::VersionMismatch` for a foreign schema version,
    /// `Error::Json` for a malformed file, and `Error::Io` otherwise.
    pub fn read(&self) -> Result<Document> {
        let Some(bytes) = self.read_bytes()? else {
            return Ok(Document::default());
        };
        let mut doc = schema::migrate(&bytes)?;
        doc.revision = Revision::of(&bytes);
        Ok(doc)
    }

    /// Revision of the bytes currently on disk, without parsing them.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file exists but cannot be read.
    pub fn current_revision(&self) -> Result<Revision> {
        Ok(self
            .read_bytes()?
            .map(|b| Revision::of(&b))
            .unwrap_or(Revision::Missing))
    }

    /// Writes `doc` under the lock and returns the revision of the new bytes.
    ///
    /// When `expected` is given and differs from the on-disk revision, nothing
    /// is written.
    ///
    /// # Errors
    ///
    /// Returns `Error::Conflict` on a revision mismatch, `Error::LockTimeout`
    /// if the lock cannot be taken, and `Error::Io` / `Error::Json` otherwise.
    pub fn write(&self, doc: &Document, expected: Option<&Revision>) -> Result<Revision> {
        let _guard = self.acquire_lock()?;
        if let Some(expected) = expected {
            let actual = self.current_revision()?;
            if &actual != expected {
                return Err(Error::Conflict {
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        self.write_unlocked(doc)
    }

    /// Runs `mutator` on the freshest on-disk state while holding the lock and
    /// writes the result back unless it reports [`Mutation::Unchanged`].
    ///
    /// The lock is released on every exit path. Errors from `mutator`
    /// propagate after release and leave the store untouched.
    ///
    /// # Errors
    ///
    /// Returns whatever `mutator` returns, plus the errors of [`Store::read`]
    /// and `Error::LockTimeout`.
    pub fn mutate<T, F>(&self, mutator: F) -> Result<Mutated<T>>
    where
        F: FnOnce(&mut Document) -> Result<Mutation<T>>,
    {
        let _guard = self.acquire_lock()?;
        let mut doc = self.read()?;
        match mutator(&mut doc)? {
            Mutation::Changed(value) => {
                let revision = self.write_unlocked(&doc)?;
                Ok(Mutated {
                    value,
                    revision,
                    written: true,
                })
            }
            Mutation::Unchanged(value) => Ok(Mutated {
                value,
                revision: doc.revision,
                written: false,
            }),
        }
    }

    /// Takes the store lock with this store's timing.
    ///
    /// # Errors
    ///
    /// Returns `Error::LockTimeout` or `Error::Io`.
    pub fn acquire_lock(&self) -> Result<LockGuard> {
        lock::acquire(&self.lock_path, &self.lock)
    }

    fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_unlocked(&self, doc: &Document) -> Result<Revision> {
        let bytes = serialize(doc)?;
        atomic_write(&self.path, &bytes)?;
        Ok(Revision::of(&bytes))
    }
}

/// Deterministic serialization: struct field order, two-space indent, trailing newline.
pub fn serialize(doc: &Document) -> Result<Vec<u8>> {
    #[derive(serde::Serialize)]
    struct OnDisk<'a> {
        version: u64,
        comments: &'a [crate::types::Comment],
    }
    let mut bytes = serde_json::to_vec_pretty(&OnDisk {
        version: CURRENT_VERSION,
        comments: &doc.comments,
    })?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Writes `data` to a temp file next to `path`, syncs it, and renames it into
/// place. The temp file is removed on every failure path when it drops.
fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{STORE_FILE}.tmp-"))
        .tempfile_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_data()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
