use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::errors::{status_error, EventError};
use crate::secrets::{is_error_sentinel, SecretSource};

/// Secret holding the event sink URL when none is configured.
pub const EVENTS_URL_SECRET: &str = "events-save-url";

// ── Event Sink ────────────────────────────────────────────────

/// Posts event payloads to an event-saving function or webhook.
///
/// The target URL is the configured override if set, else the
/// `events-save-url` secret, read on every delivery.
#[derive(Clone)]
pub struct EventSink {
    secrets: Arc<dyn SecretSource>,
    url: Option<String>,
    client: reqwest::Client,
}

impl EventSink {
    pub fn new(secrets: Arc<dyn SecretSource>, client: reqwest::Client) -> Self {
        Self {
            secrets,
            url: None,
            client,
        }
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    async fn resolve_url(&self) -> Result<String, EventError> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        let url = self.secrets.get(EVENTS_URL_SECRET).await;
        if is_error_sentinel(&url) {
            return Err(EventError::Url(url));
        }
        Ok(url.trim().to_string())
    }

    /// Deliver `data` and return the sink's response body.
    pub async fn try_save(&self, data: &Value) -> Result<Value, EventError> {
        let url = self.resolve_url().await?;
        let event_id = uuid::Uuid::new_v4().to_string();

        let resp = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .header("x-event-id", &event_id)
            .json(data)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            warn!(url = %url, event_id = %event_id, status = %status, body = %body, "event sink rejected event");
            return Err(EventError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!(url = %url, event_id = %event_id, status = %status, "event saved");
        if body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }

    /// Deliver `data`; failures come back as `{"status": "error", "message": ...}`.
    pub async fn save(&self, data: &Value) -> Value {
        match self.try_save(data).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "event delivery failed");
                status_error(e.to_string())
            }
        }
    }

    /// Deliver `data` on a background task (fire-and-forget).
    ///
    /// The handle may be awaited for the result or dropped.
    pub fn spawn_save(&self, data: Value) -> JoinHandle<Value> {
        let sink = self.clone();
        tokio::spawn(async move { sink.save(&data).await })
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::StaticSecretStore;
    use serde_json::json;
    use wiremock::matchers::{body_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_posts_to_secret_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/function/events"))
            .and(body_json(json!({ "kind": "signup", "user": 7 })))
            .and(header_exists("x-event-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "saved": true })))
            .expect(1)
            .mount(&server)
            .await;

        let secrets = StaticSecretStore::new()
            .with(EVENTS_URL_SECRET, format!("{}/function/events\n", server.uri()));
        let sink = EventSink::new(Arc::new(secrets), reqwest::Client::new());

        let result = sink.save(&json!({ "kind": "signup", "user": 7 })).await;
        assert_eq!(result, json!({ "saved": true }));
    }

    #[tokio::test]
    async fn test_configured_url_wins() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
            .expect(1)
            .mount(&server)
            .await;

        let sink = EventSink::new(Arc::new(StaticSecretStore::new()), reqwest::Client::new())
            .with_url(Some(format!("{}/hook", server.uri())));

        assert_eq!(sink.save(&json!({})).await, json!("accepted"));
    }

    #[tokio::test]
    async fn test_missing_url_secret_is_status_error() {
        let sink = EventSink::new(Arc::new(StaticSecretStore::new()), reqwest::Client::new());
        let result = sink.save(&json!({ "kind": "x" })).await;
        assert_eq!(result["status"], "error");
        assert!(result["message"]
            .as_str()
            .unwrap()
            .contains("ERROR: on getting secret events-save-url"));
    }

    #[tokio::test]
    async fn test_non_2xx_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let sink = EventSink::new(Arc::new(StaticSecretStore::new()), reqwest::Client::new())
            .with_url(Some(server.uri()));

        let result = sink.save(&json!({})).await;
        assert_eq!(result["status"], "error");
        assert!(result["message"].as_str().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_spawn_save_delivers_in_background() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
            .expect(1)
            .mount(&server)
            .await;

        let sink = EventSink::new(Arc::new(StaticSecretStore::new()), reqwest::Client::new())
            .with_url(Some(server.uri()));

        let handle = sink.spawn_save(json!({ "kind": "async" }));
        assert_eq!(handle.await.unwrap(), json!({ "id": 1 }));
    }
}
