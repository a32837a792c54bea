//! Persisted local state: the applied map and its fingerprint.
//!
//! Both files are replaced atomically (temp file in the same directory, then
//! rename). The map is always committed before the fingerprint, so a recorded
//! fingerprint never describes a map that was not written.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::AgentError;

/// The agent's on-disk artifacts.
#[derive(Debug, Clone)]
pub struct LocalState {
    map_path: PathBuf,
    hash_path: PathBuf,
}

impl LocalState {
    pub const fn new(map_path: PathBuf, hash_path: PathBuf) -> Self {
        Self {
            map_path,
            hash_path,
        }
    }

    pub fn map_path(&self) -> &Path {
        &self.map_path
    }

    pub fn hash_path(&self) -> &Path {
        &self.hash_path
    }

    /// Fingerprint of the last applied map, or `None` if nothing has been
    /// applied yet.
    pub fn load_fingerprint(&self) -> Result<Option<String>, AgentError> {
        match std::fs::read_to_string(&self.hash_path) {
            Ok(contents) => {
                let hash = contents.trim();
                Ok((!hash.is_empty()).then(|| hash.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the map, then its fingerprint.
    pub fn commit(&self, map: &str, fingerprint: &str) -> Result<(), AgentError> {
        write_atomic(&self.map_path, map.as_bytes(), 0o644)?;
        write_atomic(&self.hash_path, format!("{fingerprint}\n").as_bytes(), 0o644)?;
        info!(
            map = %self.map_path.display(),
            config_hash = %fingerprint,
            "Committed proxy map"
        );
        Ok(())
    }
}

/// Write a secret (such as an issued node token) readable only by its owner.
pub fn write_secret_file(path: &Path, contents: &str) -> Result<(), AgentError> {
    write_atomic(path, contents.as_bytes(), 0o600)
}

/// Writes content to a file atomically using tempfile + rename.
#[cfg_attr(not(unix), allow(unused_variables))]
fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> Result<(), AgentError> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
    temp_file.write_all(contents)?;
    temp_file.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp_file
            .as_file()
            .set_permissions(std::fs::Permissions::from_mode(mode))?;
    }

    temp_file.persist(path).map_err(|e| AgentError::Io(e.error))?;
    debug!(path = %path.display(), bytes = contents.len(), "Wrote file");
    Ok(())
}
