use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use super::CredentialStore;
use crate::auth::credential::CredentialRecord;
use crate::auth::error::AuthError;

/// File-backed credential store holding a single TOML record.
///
/// Writes go through a temp file in the same directory followed by a rename,
/// so readers observe either the previous record or the new one.
///
/// # Example
/// ```no_run
/// use copilot_auth::auth::{CredentialRecord, CredentialStore, FileCredentialStore};
///
/// let store = FileCredentialStore::new("/tmp/copilot-auth/credentials.toml");
/// store.save(&CredentialRecord::new("gho_provider"))?;
/// # Ok::<(), copilot_auth::auth::AuthError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn name(&self) -> &str {
        "file"
    }

    fn load(&self) -> Result<Option<CredentialRecord>, AuthError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AuthError::Io(err.to_string())),
        };
        let record: CredentialRecord = match toml::from_str(&raw) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "ignoring corrupt credential file");
                return Ok(None);
            }
        };
        if !record.is_valid() {
            tracing::warn!(path = %self.path.display(), "ignoring credential file with inconsistent fields");
            return Ok(None);
        }
        Ok(Some(record))
    }

    fn save(&self, record: &CredentialRecord) -> Result<(), AuthError> {
        if !record.is_valid() {
            return Err(AuthError::Serialization(
                "refusing to persist an inconsistent credential record".to_string(),
            ));
        }
        let serialized = toml::to_string(record)?;
        write_replacing(&self.path, serialized.as_bytes())
    }

    fn delete(&self) -> Result<(), AuthError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Io(err.to_string())),
        }
    }
}

/// Replace `path` with `data` in one rename, creating parent directories.
fn write_replacing(path: &Path, data: &[u8]) -> Result<(), AuthError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    // Staged beside the target: the rename must stay on one filesystem.
    let mut staged = tempfile::Builder::new()
        .prefix(".credentials")
        .suffix(".partial")
        .tempfile_in(dir)?;
    #[cfg(unix)]
    staged
        .as_file()
        .set_permissions(fs::Permissions::from_mode(0o600))?;
    staged.write_all(data)?;
    staged.as_file().sync_all()?;

    staged.persist(path).map_err(|err| AuthError::Io(err.error.to_string()))?;
    Ok(())
}
