//! Project-level tuning loaded from `.marginal/config.toml`.
//!
//! Every field has a default, so a missing file or a missing section simply
//! yields the defaults. A file that fails to parse is a soft failure: it is
//! logged and the defaults are used.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Scoring weights and acceptance thresholds for fuzzy re-anchoring.
///
/// The defaults are empirically chosen characterization constants; they are
/// exposed here so a project can tune them without a rebuild.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Weight of token Jaccard similarity inside the target score.
    pub jaccard_weight: f64,
    /// Weight of length similarity inside the target score.
    pub length_weight: f64,
    pub context_weight: f64,
    pub target_weight: f64,
    pub proximity_weight: f64,
    pub target_weight_without_context: f64,
    pub proximity_weight_without_context: f64,
    pub threshold_with_context: f64,
    pub threshold_without_context: f64,
    /// Minimum score gap between the best and second-best candidates.
    pub min_gap: f64,
    /// Line distance at which the proximity score reaches zero.
    pub proximity_span: usize,
    /// Context lines captured on each side when a comment is created.
    pub context_window: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            jaccard_weight: 0.7,
            length_weight: 0.3,
            context_weight: 0.65,
            target_weight: 0.25,
            proximity_weight: 0.10,
            target_weight_without_context: 0.85,
            proximity_weight_without_context: 0.15,
            threshold_with_context: 0.55,
            threshold_without_context: 0.72,
            min_gap: 0.03,
            proximity_span: 200,
            context_window: 3,
        }
    }
}

/// Timing for the inter-process store lock.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub timeout_ms: u64,
    pub retry_interval_ms: u64,
    pub stale_after_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            retry_interval_ms: 25,
            stale_after_ms: 30_000,
        }
    }
}

impl LockConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub reconcile: ReconcileConfig,
    pub lock: LockConfig,
}

impl Config {
    /// Loads the config file at `path`, falling back to defaults when the file
    /// is absent or unparseable.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(_) => return Self::default(),
        };
        match toml::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "config parse error, using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            "[reconcile]\nmin_gap = 0.1\n\n[lock]\ntimeout_ms = 250\n",
        )
        .unwrap();
        assert_eq!(config.reconcile.min_gap, 0.1);
        assert_eq!(config.reconcile.threshold_with_context, 0.55);
        assert_eq!(config.lock.timeout(), Duration::from_millis(250));
        assert_eq!(config.lock.retry_interval_ms, 25);
    }

    #[test]
    fn unparseable_file_yields_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "reconcile = [not toml").unwrap();
        assert_eq!(Config::load(&path), Config::default());
        assert_eq!(Config::load(&dir.path().join("absent.toml")), Config::default());
    }
}
