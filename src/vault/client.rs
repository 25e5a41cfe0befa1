use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::{VAULT_TOKEN_SECRET, VAULT_URI_SECRET};
use crate::errors::VaultError;
use crate::secrets::{is_error_sentinel, SecretSource};

/// KV v2 responses wrap the stored payload as `{"data": {"data": <payload>, "metadata": ...}}`.
const PAYLOAD_POINTER: &str = "/data/data";

/// Vault REST client for KV reads.
#[derive(Clone)]
pub struct VaultClient {
    secrets: Arc<dyn SecretSource>,
    http: reqwest::Client,
}

impl VaultClient {
    pub fn new(secrets: Arc<dyn SecretSource>, http: reqwest::Client) -> Self {
        Self { secrets, http }
    }

    /// Read the payload stored at `name` under the configured vault prefix.
    ///
    /// Returns [`VaultError::CredentialsNotSet`] without touching the network
    /// when either credential secret is unavailable.
    pub async fn get_secret(&self, name: &str) -> Result<Value, VaultError> {
        let uri = self.secrets.get(VAULT_URI_SECRET).await;
        let token = self.secrets.get(VAULT_TOKEN_SECRET).await;

        if is_error_sentinel(&uri) || is_error_sentinel(&token) {
            warn!(secret = name, "vault credentials not set, skipping lookup");
            return Err(VaultError::CredentialsNotSet);
        }

        let url = format!("{}{}", uri.trim(), name);
        match self.fetch(&url, token.trim()).await {
            Ok(payload) => {
                debug!(secret = name, "vault secret resolved");
                Ok(payload)
            }
            Err(reason) => {
                warn!(secret = name, %reason, "vault lookup failed");
                Err(VaultError::Request {
                    name: name.to_string(),
                    reason,
                })
            }
        }
    }

    /// Like [`get_secret`](Self::get_secret), but failures come back as their
    /// text in a JSON string so the result can be stored wherever a payload would be.
    pub async fn get_secret_value(&self, name: &str) -> Value {
        self.get_secret(name)
            .await
            .unwrap_or_else(|e| Value::String(e.to_string()))
    }

    /// Expand function for `ParamTester`: treats the current value as a vault path.
    pub async fn expand(&self, value: Value) -> anyhow::Result<Value> {
        let name = value
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("cannot expand non-string value {}", value))?;
        Ok(self.get_secret_value(name).await)
    }

    async fn fetch(&self, url: &str, token: &str) -> Result<Value, String> {
        let resp = self
            .http
            .get(url)
            .header("X-Vault-Token", token)
            .header("X-Vault-Request", "true")
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| format!("vault request error: {e}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("vault HTTP {status}: {body}"));
        }

        let mut body: Value = resp
            .json()
            .await
            .map_err(|e| format!("vault json parse error: {e}"))?;

        body.pointer_mut(PAYLOAD_POINTER)
            .map(Value::take)
            .ok_or_else(|| "vault response has no data.data payload".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::StaticSecretStore;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(secrets: StaticSecretStore) -> VaultClient {
        VaultClient::new(Arc::new(secrets), reqwest::Client::new())
    }

    #[tokio::test]
    async fn test_reads_kv_v2_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/data/erp-token"))
            .and(header("X-Vault-Token", "s.token"))
            .and(header("X-Vault-Request", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "data": { "token": "abc" }, "metadata": { "version": 3 } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let vault = client_for(
            StaticSecretStore::new()
                .with("vault-uri", format!("{}/v1/secret/data/\n", server.uri()))
                .with("vault-token", "s.token\n"),
        );

        let payload = vault.get_secret("erp-token").await.unwrap();
        assert_eq!(payload, json!({ "token": "abc" }));
    }

    #[tokio::test]
    async fn test_missing_token_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let vault = client_for(
            StaticSecretStore::new().with("vault-uri", format!("{}/v1/secret/data/", server.uri())),
        );

        let err = vault.get_secret("erp-token").await.unwrap_err();
        assert!(matches!(err, VaultError::CredentialsNotSet));
        assert_eq!(
            vault.get_secret_value("erp-token").await,
            json!("VAULT credentials not set")
        );
    }

    #[tokio::test]
    async fn test_server_error_becomes_lookup_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
            .mount(&server)
            .await;

        let vault = client_for(
            StaticSecretStore::new()
                .with("vault-uri", format!("{}/v1/secret/data/", server.uri()))
                .with("vault-token", "bad"),
        );

        let err = vault.get_secret("erp-token").await.unwrap_err();
        assert_eq!(err.to_string(), "ERROR: on getting VAULT secret erp-token");
        match err {
            VaultError::Request { reason, .. } => assert!(reason.contains("403")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_expand_rejects_non_string_values() {
        let vault = client_for(StaticSecretStore::new());
        assert!(vault.expand(json!({ "nested": true })).await.is_err());
        assert_eq!(
            vault.expand(json!("anything")).await.unwrap(),
            json!("VAULT credentials not set")
        );
    }
}
