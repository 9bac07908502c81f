//! Node configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{PeerbookError, Result, constants};

/// Configuration for a single PeerBook node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Path to the data directory (retry journal, admission overrides).
    pub data_dir: PathBuf,
    /// Explicit admission overrides file. When unset, a
    /// `ratemeters.json` in the data directory is used if present.
    pub admission_overrides: Option<PathBuf>,
    /// Milliseconds between background reconciliation passes. Zero
    /// disables the background pass.
    pub retry_interval_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(constants::DEFAULT_DATA_DIR),
            admission_overrides: None,
            retry_interval_ms: constants::DEFAULT_RETRY_INTERVAL_MS,
        }
    }
}

impl NodeConfig {
    /// Create a config rooted at `data_dir`.
    #[must_use]
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Read a JSON config file.
    ///
    /// # Errors
    /// Returns `Io` if the file can't be read and `Configuration` if it
    /// isn't valid config JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            PeerbookError::Configuration(format!("invalid node config {}: {e}", path.display()))
        })
    }

    /// The admission overrides file to load, if any.
    #[must_use]
    pub fn admission_overrides_path(&self) -> Option<PathBuf> {
        if let Some(explicit) = &self.admission_overrides {
            return Some(explicit.clone());
        }
        let implicit = self.data_dir.join(constants::ADMISSION_OVERRIDES_FILE);
        implicit.is_file().then_some(implicit)
    }

    #[must_use]
    pub fn retry_journal_path(&self) -> PathBuf {
        self.data_dir.join(constants::RETRY_JOURNAL_FILE)
    }

    /// Interval of the background reconciliation pass, if enabled.
    #[must_use]
    pub fn retry_interval(&self) -> Option<Duration> {
        (self.retry_interval_ms > 0).then(|| Duration::from_millis(self.retry_interval_ms))
    }
}
