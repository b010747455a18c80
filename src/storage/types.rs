use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One cached secret. Stored as `<name>.json` with 0600 perms.
///
/// `value`/`value2` hold the two halves of a token pair, or a single
/// authorization code with `value2` left empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedSecret {
    pub value: String,
    #[serde(default)]
    pub value2: String,
    /// Issue time, unix seconds.
    pub time: u64,
}

/// Where the secret files live. Resolved once by the caller.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub base_dir: PathBuf,
    pub namespace: String,
}

impl StorageConfig {
    pub fn new(base_dir: impl Into<PathBuf>, namespace: &str) -> Self {
        Self {
            base_dir: base_dir.into(),
            namespace: namespace.to_string(),
        }
    }

    pub fn dir(&self) -> PathBuf {
        self.base_dir.join(&self.namespace)
    }
}
