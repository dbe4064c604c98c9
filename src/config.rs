use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cache::DEFAULT_MAX_SCOPES;
use crate::data::loader::DEFAULT_HINTS;
use crate::data::reader::FormatHint;

// ---------------------------------------------------------------------------
// Engine configuration
// ---------------------------------------------------------------------------

/// Engine settings, read from a TOML file. Every field has a default, so
/// an empty file (or no file) is a valid configuration.
///
/// ```toml
/// [files]
/// data_dir = "sample_data"
/// user_root = "user_data"
///
/// [cache]
/// mode = "multi_user"
/// max_scopes = 10
/// session_hours = 3
///
/// [loader]
/// hints = ["auto", "emd", "eds_tem", "eds_sem"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub files: FilesConfig,
    pub cache: CacheConfig,
    pub loader: LoaderConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Root for the legacy single-user mode.
    pub data_dir: PathBuf,
    /// Parent of the per-user directories in multi-user mode.
    pub user_root: PathBuf,
    /// Extensions accepted by `list_files`, lowercase and without the dot.
    pub extensions: Vec<String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("sample_data"),
            user_root: PathBuf::from("user_data"),
            extensions: ["emd", "tif", "dm3", "dm4", "ser", "emi", "json", "csv", "parquet"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// One global slot shared by every request.
    SingleUser,
    /// One slot per user, up to `max_scopes`.
    MultiUser,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub mode: CacheMode,
    pub max_scopes: usize,
    pub session_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mode: CacheMode::SingleUser,
            max_scopes: DEFAULT_MAX_SCOPES,
            session_hours: 3,
        }
    }
}

impl CacheConfig {
    /// Scope ceiling actually applied: always 1 in single-user mode.
    pub fn effective_max_scopes(&self) -> usize {
        match self.mode {
            CacheMode::SingleUser => 1,
            CacheMode::MultiUser => self.max_scopes.max(1),
        }
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_hours.saturating_mul(3600))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Decode strategies, tried in order.
    pub hints: Vec<FormatHint>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            hints: DEFAULT_HINTS.to_vec(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("parsing engine configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Whether `file_name` carries one of the configured extensions.
    pub fn is_supported(&self, file_name: &str) -> bool {
        Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.files.extensions.iter().any(|e| *e == ext)
            })
            .unwrap_or(false)
    }
}
