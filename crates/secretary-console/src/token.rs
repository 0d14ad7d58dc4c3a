//! Bearer token persistence between console runs.

use crate::error::AppResult;
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Token kept in a plain file next to the operator.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored token, `None` if the file is missing or blank.
    pub async fn load(&self) -> AppResult<Option<SecretString>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| SecretString::new(token.to_string())))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, token: &SecretString) -> AppResult<()> {
        tokio::fs::write(&self.path, token.expose_secret()).await?;
        debug!("Token saved to {}", self.path.display());
        Ok(())
    }

    pub async fn clear(&self) -> AppResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token"));

        assert!(store.load().await.unwrap().is_none());

        store.save(&SecretString::new("abc".into())).await.unwrap();
        let token = store.load().await.unwrap().unwrap();
        assert_eq!(token.expose_secret(), "abc");

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        tokio_test::assert_ok!(store.clear().await);
    }

    #[tokio::test]
    async fn test_blank_file_is_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "\n").unwrap();

        assert!(TokenStore::new(path).load().await.unwrap().is_none());
    }
}
