use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::SecretSource;
use crate::errors::SecretError;

/// Where the function runtime mounts secrets.
pub const DEFAULT_SECRETS_DIR: &str = "/var/openfaas/secrets";

/// Reads each secret from `<dir>/<name>`.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Secret names are single path components.
    fn path_for(&self, name: &str) -> Option<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains('/')
            && !name.contains('\\');
        valid.then(|| self.dir.join(name))
    }
}

impl Default for FileSecretStore {
    fn default() -> Self {
        Self::new(DEFAULT_SECRETS_DIR)
    }
}

#[async_trait]
impl SecretSource for FileSecretStore {
    async fn read(&self, name: &str) -> Result<String, SecretError> {
        let path = self.path_for(name).ok_or_else(|| SecretError::Unavailable {
            name: name.to_string(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "invalid secret name"),
        })?;

        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| SecretError::Unavailable {
                name: name.to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_secret_file_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("vault-token"), "s.abc123\n").unwrap();

        let store = FileSecretStore::new(dir.path());
        assert_eq!(store.read("vault-token").await.unwrap(), "s.abc123\n");
    }

    #[tokio::test]
    async fn test_missing_file_yields_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(dir.path());

        let err = store.read("vault-uri").await.unwrap_err();
        assert_eq!(err.to_string(), "ERROR: on getting secret vault-uri");
        assert_eq!(store.get("vault-uri").await, "ERROR: on getting secret vault-uri");
    }

    #[tokio::test]
    async fn test_rejects_names_escaping_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("outside"), "nope").unwrap();
        let nested = dir.path().join("secrets");
        std::fs::create_dir(&nested).unwrap();

        let store = FileSecretStore::new(&nested);
        assert!(store.read("../outside").await.is_err());
        assert!(store.read("..").await.is_err());
        assert!(store.read("").await.is_err());
    }
}
