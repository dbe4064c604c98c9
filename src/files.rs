use std::path::{Path, PathBuf};

use log::warn;

use crate::cache::ScopeKey;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

// ---------------------------------------------------------------------------
// User ids
// ---------------------------------------------------------------------------

const RESERVED_PREFIXES: [&str; 10] = [
    "con", "prn", "aux", "nul", "com", "lpt", "admin", "root", "system", "user",
];

const MIN_USER_ID_LEN: usize = 3;
const MAX_USER_ID_LEN: usize = 50;

/// Reduce a raw identity to a directory-safe user id.
///
/// Lowercases, keeps `[a-z0-9_-]`, trims leading/trailing `_`/`-`, prefixes
/// reserved names with `usr_` and truncates long ids to 47 chars + `_tr`.
pub fn sanitize_user_id(raw: &str) -> Result<String> {
    let kept: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    let mut id = kept.trim_matches(|c| c == '_' || c == '-').to_string();

    if RESERVED_PREFIXES.iter().any(|p| id.starts_with(p)) {
        id = format!("usr_{id}");
    }
    if id.len() < MIN_USER_ID_LEN {
        warn!("Rejected user id shorter than {MIN_USER_ID_LEN} characters after sanitizing");
        return Err(EngineError::InvalidUser(format!(
            "'{raw}' is shorter than {MIN_USER_ID_LEN} characters after sanitizing"
        )));
    }
    if id.len() > MAX_USER_ID_LEN {
        id.truncate(MAX_USER_ID_LEN - 3);
        id.push_str("_tr");
    }
    Ok(id)
}

// ---------------------------------------------------------------------------
// File resolution
// ---------------------------------------------------------------------------

/// Maps a (user, file name) request onto a cache scope and a path on disk.
#[derive(Debug, Clone)]
pub struct FileResolver {
    config: EngineConfig,
}

impl FileResolver {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Cache scope for a request: the global slot without a user, the
    /// sanitized user id otherwise.
    pub fn scope(&self, user: Option<&str>) -> Result<ScopeKey> {
        match user {
            None => Ok(ScopeKey::Global),
            Some(raw) => Ok(ScopeKey::User(sanitize_user_id(raw)?)),
        }
    }

    /// Directory holding the files visible to `scope`.
    pub fn directory(&self, scope: &ScopeKey) -> PathBuf {
        match scope {
            ScopeKey::Global => self.config.files.data_dir.clone(),
            ScopeKey::User(id) => self.config.files.user_root.join(id),
        }
    }

    /// Full path of `file_name` in `scope`. The name must be a bare file
    /// name with a supported extension, and the file must exist.
    pub fn resolve(&self, scope: &ScopeKey, file_name: &str) -> Result<PathBuf> {
        check_bare_name(file_name)?;
        if !self.config.is_supported(file_name) {
            return Err(EngineError::UnsupportedFile(file_name.to_string()));
        }
        let path = self.directory(scope).join(file_name);
        if !path.is_file() {
            return Err(EngineError::NotFound(file_name.to_string()));
        }
        Ok(path)
    }

    /// Sorted names of the supported files in `scope`'s directory. A
    /// missing directory lists as empty.
    pub fn list_files(&self, scope: &ScopeKey) -> Result<Vec<String>> {
        let dir = self.directory(scope);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if self.config.is_supported(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

fn check_bare_name(file_name: &str) -> Result<()> {
    let bare = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n == file_name);
    if !bare || file_name.contains("..") || file_name.contains('\\') {
        return Err(EngineError::NotFound(file_name.to_string()));
    }
    Ok(())
}
