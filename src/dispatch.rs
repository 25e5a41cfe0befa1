//! Outbound service calls described by vault-stored descriptors.
//!
//! A descriptor is stored in the vault under the service name:
//!
//! ```json
//! {
//!   "method": "post",
//!   "url": "https://myserver.com/function/send-sms",
//!   "headers": { "Content-Type": "application/json" },
//!   "data": { "hasura": { "action": "send_sms" }, "to": "{{ to }}", "msg": "{{ msg }}" }
//! }
//! ```
//!
//! At call time `data` is serialized, rendered against the caller's data and
//! parsed back, so the rendered text must remain valid JSON.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::errors::DispatchError;
use crate::template::TemplateEngine;
use crate::vault::VaultClient;

/// HTTP call shape stored as a vault secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub data: Value,
}

impl ServiceDescriptor {
    pub fn to_value(&self) -> Value {
        json!({
            "method": self.method,
            "url": self.url,
            "headers": self.headers,
            "data": self.data,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Body returned by the service; non-JSON bodies become a JSON string.
    Response(Value),
    /// Dry run: the resolved descriptor, no request issued.
    DryRun(ServiceDescriptor),
}

impl DispatchOutcome {
    pub fn into_value(self) -> Value {
        match self {
            DispatchOutcome::Response(body) => body,
            DispatchOutcome::DryRun(descriptor) => descriptor.to_value(),
        }
    }
}

pub struct ServiceDispatcher {
    vault: Arc<VaultClient>,
    templates: TemplateEngine,
    http: reqwest::Client,
    dry_run: bool,
}

impl ServiceDispatcher {
    pub fn new(vault: Arc<VaultClient>, http: reqwest::Client) -> Self {
        Self {
            vault,
            templates: TemplateEngine::new(),
            http,
            dry_run: false,
        }
    }

    /// Resolve descriptors without sending requests.
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Fetch the descriptor for `service` and render its data with `template_data`.
    pub async fn resolve(
        &self,
        service: &str,
        template_data: &Value,
    ) -> Result<ServiceDescriptor, DispatchError> {
        let config = self.vault.get_secret(service).await?;
        let mut descriptor: ServiceDescriptor =
            serde_json::from_value(config).map_err(DispatchError::Descriptor)?;

        let raw = serde_json::to_string(&descriptor.data).map_err(DispatchError::Serialize)?;
        let rendered = self.templates.render(&raw, template_data).await?;
        descriptor.data = serde_json::from_str(&rendered).map_err(DispatchError::Parse)?;

        Ok(descriptor)
    }

    pub async fn try_call_service(
        &self,
        service: &str,
        template_data: &Value,
    ) -> Result<DispatchOutcome, DispatchError> {
        let descriptor = self.resolve(service, template_data).await?;

        if self.dry_run {
            info!(service, method = %descriptor.method, url = %descriptor.url, "dry run, not sending");
            return Ok(DispatchOutcome::DryRun(descriptor));
        }

        let body = self.send(&descriptor).await?;
        debug!(service, "service call completed");
        Ok(DispatchOutcome::Response(body))
    }

    /// Call `service`. Every failure, whatever the stage, yields
    /// `{"error": "invalid http call"}`.
    pub async fn call_service(&self, service: &str, template_data: &Value) -> Value {
        match self.try_call_service(service, template_data).await {
            Ok(outcome) => outcome.into_value(),
            Err(e) => {
                warn!(service, code = e.code(), error = %e, "service call failed");
                e.to_value()
            }
        }
    }

    async fn send(&self, descriptor: &ServiceDescriptor) -> Result<Value, DispatchError> {
        let method = Method::from_bytes(descriptor.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| DispatchError::Method(descriptor.method.clone()))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &descriptor.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| DispatchError::Header(name.clone()))?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_| DispatchError::Header(name.clone()))?;
            headers.insert(header_name, header_value);
        }

        let mut req = self.http.request(method, &descriptor.url).headers(headers);
        if !descriptor.data.is_null() {
            req = req.json(&descriptor.data);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(DispatchError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}
