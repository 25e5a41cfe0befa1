pub mod file;
pub mod memory;

pub use file::FileSecretStore;
pub use memory::StaticSecretStore;

use async_trait::async_trait;

use crate::errors::SecretError;

/// Marker carried by every failed lookup's text.
pub const ERROR_MARKER: &str = "ERROR";

/// Abstraction over local secret storage.
/// Implementations: FileSecretStore (one file per secret), StaticSecretStore (in memory).
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Read the secret stored under `name`.
    async fn read(&self, name: &str) -> Result<String, SecretError>;

    /// Read the secret stored under `name`, substituting the failure text
    /// (`ERROR: on getting secret <name>`) when it is unavailable.
    async fn get(&self, name: &str) -> String {
        match self.read(name).await {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(secret = name, error = ?e, "secret unavailable");
                e.to_string()
            }
        }
    }
}

/// Whether a value returned by [`SecretSource::get`] is a failure text.
pub fn is_error_sentinel(text: &str) -> bool {
    text.contains(ERROR_MARKER)
}
