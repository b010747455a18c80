use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::Utc;

use super::types::*;
use crate::error::{ExportError, Result};

/// File-per-secret store under `<base_dir>/<namespace>/`.
///
/// Single-process use only: there is no locking between writers.
pub struct CredentialStore {
    dir: PathBuf,
}

impl CredentialStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self { dir: config.dir() }
    }

    pub fn now() -> u64 {
        u64::try_from(Utc::now().timestamp()).unwrap_or_default()
    }

    fn secret_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    fn storage_err(path: PathBuf) -> impl FnOnce(std::io::Error) -> ExportError {
        move |source| ExportError::Storage { path, source }
    }

    /// Returns `None` when the secret was never stored or its file does not
    /// hold a valid secret. Any other I/O failure is an error.
    pub fn get(&self, name: &str) -> Result<Option<CachedSecret>> {
        let path = self.secret_path(name);
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::storage_err(path)(e)),
        };

        match serde_json::from_str::<CachedSecret>(&contents) {
            Ok(secret) => Ok(Some(secret)),
            Err(e) => {
                tracing::debug!("Ignoring unreadable secret file {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    pub fn set(&self, name: &str, value: &str, value2: &str) -> Result<CachedSecret> {
        fs::create_dir_all(&self.dir).map_err(Self::storage_err(self.dir.clone()))?;

        let secret = CachedSecret {
            value: value.to_string(),
            value2: value2.to_string(),
            time: Self::now(),
        };
        let contents = serde_json::to_string(&secret)?;

        let path = self.secret_path(name);
        fs::write(&path, contents).map_err(Self::storage_err(path.clone()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
                .map_err(Self::storage_err(path.clone()))?;
        }

        Ok(secret)
    }

    /// Deletes a secret. Removing a missing secret is not an error.
    pub fn remove(&self, name: &str) -> Result<bool> {
        let path = self.secret_path(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::storage_err(path)(e)),
        }
    }

    /// Stored secrets among `names`, in the given order.
    pub fn entries(&self, names: &[&str]) -> Result<Vec<(String, CachedSecret)>> {
        let mut found = Vec::new();
        for name in names {
            if let Some(secret) = self.get(name)? {
                found.push((name.to_string(), secret));
            }
        }
        Ok(found)
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}
