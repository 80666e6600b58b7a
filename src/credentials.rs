//! Credential cache - persistent JSON storage for saved logins
//!
//! The file is a JSON object keyed by user id. It is always read whole and written
//! whole; a missing, blank or unparseable file counts as empty and is replaced on
//! the next write.

use crate::config::Config;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::warn;

/// Saved login for one user
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SavedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SavedCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Lookup of saved logins, at most one per user
#[async_trait]
pub trait CredentialCache: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<SavedCredentials>>;

    async fn set(&self, user_id: &str, credentials: SavedCredentials) -> Result<()>;

    /// Returns the removed entry, if any
    async fn remove(&self, user_id: &str) -> Result<Option<SavedCredentials>>;

    /// User ids with a saved login
    async fn users(&self) -> Result<Vec<String>>;
}

/// File-backed cache
pub struct JsonCredentialCache {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl JsonCredentialCache {
    pub fn new(config: &Config) -> Self {
        Self::at(&config.credentials_file)
    }

    pub fn at(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, SavedCredentials>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        match serde_json::from_str(&content) {
            Ok(data) => Ok(data),
            Err(e) => {
                warn!(
                    "Ignoring unreadable credentials file {}: {}",
                    self.path.display(),
                    e
                );
                Ok(BTreeMap::new())
            }
        }
    }

    /// Save the whole map atomically
    fn write_all(&self, data: &BTreeMap<String, SavedCredentials>) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(parent)?;

        // Temp file in the same directory so the rename stays on one filesystem
        let mut temp = NamedTempFile::new_in(parent)?;
        let json = serde_json::to_string_pretty(data)?;
        temp.write_all(json.as_bytes())?;
        temp.as_file().sync_all()?;

        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

#[async_trait]
impl CredentialCache for JsonCredentialCache {
    async fn get(&self, user_id: &str) -> Result<Option<SavedCredentials>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all()?.remove(user_id))
    }

    async fn set(&self, user_id: &str, credentials: SavedCredentials) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut data = self.read_all()?;
        data.insert(user_id.to_string(), credentials);
        self.write_all(&data)
    }

    async fn remove(&self, user_id: &str) -> Result<Option<SavedCredentials>> {
        let _guard = self.lock.lock().await;
        let mut data = self.read_all()?;
        let removed = data.remove(user_id);
        if removed.is_some() {
            self.write_all(&data)?;
        }
        Ok(removed)
    }

    async fn users(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all()?.into_keys().collect())
    }
}
