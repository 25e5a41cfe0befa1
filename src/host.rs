//! HTTP function host.
//!
//! Runs the request pipeline for one downstream service per call:
//! normalize the inbound body, expand vault-backed fields, validate required
//! fields, then dispatch.
//!
//! - `POST /call/:service?require=a,b&expand=token`: dispatch `service`
//! - `POST /events`: forward the body to the event sink
//! - `GET /healthz`

use std::sync::Arc;

use axum::extract::{FromRequest, Path, Query, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{async_trait, Json, Router};
use serde::Deserialize;
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::dispatch::ServiceDispatcher;
use crate::errors::AppError;
use crate::events::EventSink;
use crate::params::{normalize, type_check, ParamBag, ParamTester};
use crate::secrets::{FileSecretStore, SecretSource};
use crate::vault::VaultClient;

/// Shared application state passed to handlers.
pub struct AppState {
    pub secrets: Arc<dyn SecretSource>,
    pub vault: Arc<VaultClient>,
    pub dispatcher: ServiceDispatcher,
    pub events: EventSink,
}

impl AppState {
    /// Wire every client over `secrets` with the timeouts from `cfg`.
    pub fn with_secrets(cfg: &Config, secrets: Arc<dyn SecretSource>) -> anyhow::Result<Self> {
        let vault = Arc::new(VaultClient::new(
            Arc::clone(&secrets),
            crate::http::client(cfg.vault_timeout)?,
        ));
        let dispatcher =
            ServiceDispatcher::new(Arc::clone(&vault), crate::http::client(cfg.http_timeout)?)
                .dry_run(cfg.dry_run);
        let events = EventSink::new(Arc::clone(&secrets), crate::http::client(cfg.events_timeout)?)
            .with_url(cfg.events_url.clone());

        Ok(Self {
            secrets,
            vault,
            dispatcher,
            events,
        })
    }

    /// State backed by the secret files under `cfg.secrets_dir`.
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let secrets: Arc<dyn SecretSource> = Arc::new(FileSecretStore::new(&cfg.secrets_dir));
        Self::with_secrets(cfg, secrets)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/call/:service", post(call_service))
        .route("/events", post(save_event))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
}

/// JSON body decoded into canonical parameters, whichever calling
/// convention the caller used.
#[derive(Debug)]
pub struct FunctionParams(pub ParamBag);

#[async_trait]
impl<S> FromRequest<S> for FunctionParams
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|e| AppError::InvalidBody(e.body_text()))?;

        match normalize(body) {
            Value::Object(params) => Ok(Self(params)),
            other => Err(AppError::InvalidBody(format!(
                "expected a JSON object, got {}",
                type_check(Some(&other))
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CallQuery {
    /// Comma-separated required parameters.
    #[serde(default)]
    pub require: Option<String>,
    /// Comma-separated parameters whose values are vault paths to expand.
    #[serde(default)]
    pub expand: Option<String>,
}

async fn call_service(
    State(state): State<Arc<AppState>>,
    Path(service): Path<String>,
    Query(query): Query<CallQuery>,
    FunctionParams(params): FunctionParams,
) -> Result<Json<Value>, AppError> {
    let mut tester = ParamTester::new(params);

    if let Some(expand) = query.expand.as_deref().filter(|s| !s.trim().is_empty()) {
        let vault = Arc::clone(&state.vault);
        tester.set_expand_function(move |value| {
            let vault = Arc::clone(&vault);
            async move { vault.expand(value).await }
        });
        tester.expand(expand).await.map_err(AppError::Expansion)?;

        if !tester.missing().is_empty() {
            let message = tester
                .get_params()
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("expand error")
                .to_string();
            return Err(AppError::Expand(message));
        }
    }

    let required = query.require.as_deref().unwrap_or_default();
    let result = tester
        .check_and_eval_with(required, move |params| {
            let state = Arc::clone(&state);
            let service = service.clone();
            async move {
                state
                    .dispatcher
                    .call_service(&service, &Value::Object(params))
                    .await
            }
        })
        .await?;

    Ok(Json(result))
}

async fn save_event(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Json<Value> {
    Json(state.events.save(&body).await)
}

/// Middleware: injects a unique X-Request-Id into every response.
async fn request_id_middleware(req: Request, next: Next) -> Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}
