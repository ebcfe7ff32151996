//! Project root discovery and per-project paths.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::store::{Store, CONFIG_FILE, STORE_DIR};

/// Walks up from `start` to the nearest directory containing `.marginal/`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(STORE_DIR).is_dir())
        .map(Path::to_path_buf)
}

/// Path of the project config file under `project_root`.
pub fn config_path(project_root: &Path) -> PathBuf {
    project_root.join(STORE_DIR).join(CONFIG_FILE)
}

/// A discovered project: its root, its loaded config, and a store handle
/// configured with the project's lock timing.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: Config,
    pub store: Store,
}

impl Project {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let config = Config::load(&config_path(&root));
        let store = Store::new(root.clone()).with_lock_config(config.lock.clone());
        Self {
            root,
            config,
            store,
        }
    }

    /// Converts `path` (absolute or relative to `cwd`) into the project-relative,
    /// forward-slash form stored in comments. Returns `None` if it lies outside
    /// the project.
    pub fn relative_path(&self, cwd: &Path, path: &Path) -> Option<String> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            cwd.join(path)
        };
        let normalized = normalize(&absolute);
        let root = normalize(&self.root);
        let relative = normalized.strip_prefix(&root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        (!parts.is_empty()).then(|| parts.join("/"))
    }
}

/// Lexically resolves `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
