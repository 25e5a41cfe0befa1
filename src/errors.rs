use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

/// Body every failed service dispatch collapses to.
pub const INVALID_HTTP_CALL: &str = "invalid http call";

/// `{"status": "error", "message": ...}`: the shape validation and event
/// failures are reported with.
pub fn status_error(message: impl Into<String>) -> Value {
    json!({
        "status": "error",
        "message": message.into(),
    })
}

#[derive(Debug, Error)]
pub enum SecretError {
    /// Display text doubles as the sentinel returned by `SecretSource::get`.
    #[error("ERROR: on getting secret {name}")]
    Unavailable {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("VAULT credentials not set")]
    CredentialsNotSet,

    #[error("ERROR: on getting VAULT secret {name}")]
    Request { name: String, reason: String },
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template render failed: {0}")]
    Render(#[from] minijinja::Error),
}

#[derive(Debug, Error)]
pub enum ParamError {
    #[error("missing parameter(s): {}", missing_json(.missing))]
    MissingParameters { missing: Vec<String> },
}

impl ParamError {
    pub fn to_value(&self) -> Value {
        status_error(self.to_string())
    }
}

fn missing_json(missing: &[String]) -> String {
    serde_json::to_string(missing).unwrap_or_default()
}

/// Failure at one stage of the vault → template → request pipeline.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("service lookup failed: {0}")]
    Vault(#[from] VaultError),

    #[error("service descriptor is invalid: {0}")]
    Descriptor(#[source] serde_json::Error),

    #[error("service data could not be serialized: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("rendered service data is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("invalid http method: {0}")]
    Method(String),

    #[error("invalid header: {0}")]
    Header(String),

    #[error("service request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },
}

impl DispatchError {
    /// Stable identifier of the failing stage, for logs.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::Vault(_) => "vault_lookup_failed",
            DispatchError::Descriptor(_) => "invalid_descriptor",
            DispatchError::Serialize(_) => "serialize_failed",
            DispatchError::Template(_) => "template_failed",
            DispatchError::Parse(_) => "rendered_json_invalid",
            DispatchError::Method(_) => "invalid_method",
            DispatchError::Header(_) => "invalid_header",
            DispatchError::Request(_) => "request_failed",
            DispatchError::Status { .. } => "upstream_status",
        }
    }

    pub fn to_value(&self) -> Value {
        json!({ "error": INVALID_HTTP_CALL })
    }
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("events url unavailable: {0}")]
    Url(String),

    #[error("event request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("event sink returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Errors surfaced by the function host.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error(transparent)]
    Params(#[from] ParamError),

    #[error("{0}")]
    Expand(String),

    #[error("expansion failed: {0}")]
    Expansion(#[source] anyhow::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::InvalidBody(msg) => (StatusCode::BAD_REQUEST, status_error(msg.clone())),
            AppError::Params(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_value()),
            AppError::Expand(msg) => (StatusCode::UNPROCESSABLE_ENTITY, status_error(msg.clone())),
            AppError::Expansion(e) => {
                tracing::warn!("Expansion error: {:#}", e);
                (StatusCode::BAD_GATEWAY, status_error(self.to_string()))
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    status_error("internal server error"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_parameters_message_is_json_array() {
        let err = ParamError::MissingParameters {
            missing: vec!["foo".into(), "bar".into()],
        };
        assert_eq!(err.to_string(), r#"missing parameter(s): ["foo","bar"]"#);
        assert_eq!(err.to_value()["status"], "error");
    }

    #[test]
    fn test_vault_errors_keep_sentinel_text() {
        assert_eq!(
            VaultError::CredentialsNotSet.to_string(),
            "VAULT credentials not set"
        );
        let err = VaultError::Request {
            name: "erp-token".into(),
            reason: "connection refused".into(),
        };
        assert_eq!(err.to_string(), "ERROR: on getting VAULT secret erp-token");
    }

    #[test]
    fn test_dispatch_errors_collapse_to_invalid_http_call() {
        let err = DispatchError::Method("FETCH!".into());
        assert_eq!(err.code(), "invalid_method");
        assert_eq!(err.to_value(), json!({ "error": "invalid http call" }));
    }
}
