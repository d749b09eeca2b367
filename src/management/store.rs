use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{error::StoreError, types::UserCredentials};

/// Persists user credentials as JSON so a session survives restarts.
pub struct CredentialStore {
    path: PathBuf,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::at(Self::default_path())
    }
}

impl CredentialStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<UserCredentials, StoreError> {
        let content = async_fs::read_to_string(&self.path).await?;
        let creds: UserCredentials = serde_json::from_str(&content)?;
        debug!("Loaded user credentials from {}", self.path.display());
        Ok(creds)
    }

    pub async fn persist(&self, creds: &UserCredentials) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(creds)?;
        async_fs::write(&self.path, json).await?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        match async_fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn default_path() -> PathBuf {
        let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("sporlclient/cache/user_creds.json");
        path
    }
}
