use std::path::PathBuf;
use std::time::Duration;

use crate::secrets::file::DEFAULT_SECRETS_DIR;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Directory the secret files are mounted under.
    pub secrets_dir: PathBuf,
    /// Event sink URL. When unset the `events-save-url` secret is used.
    /// Set via FAAS_EVENTS_URL.
    pub events_url: Option<String>,
    /// Total timeout for vault reads. FAAS_VAULT_TIMEOUT_SECS, default 10.
    /// Zero or unparseable timeouts fall back to their default.
    pub vault_timeout: Duration,
    /// Total timeout for dispatched service calls. FAAS_HTTP_TIMEOUT_SECS, default 30.
    pub http_timeout: Duration,
    /// Total timeout for event deliveries. FAAS_EVENTS_TIMEOUT_SECS, default 10.
    pub events_timeout: Duration,
    /// Resolve service descriptors without sending requests.
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        from_lookup(|_| None)
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let cfg = from_lookup(|key| std::env::var(key).ok());

    if let Some(url) = &cfg.events_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("FAAS_EVENTS_URL must be an http(s) URL, got '{}'", url);
        }
    }

    Ok(cfg)
}

/// Build a config from an arbitrary variable source.
pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Config {
    let secs = |key: &str, default: u64| {
        let secs = get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(default);
        Duration::from_secs(secs)
    };

    Config {
        port: get("FAAS_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080),
        secrets_dir: get("FAAS_SECRETS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRETS_DIR)),
        events_url: get("FAAS_EVENTS_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
        vault_timeout: secs("FAAS_VAULT_TIMEOUT_SECS", 10),
        http_timeout: secs("FAAS_HTTP_TIMEOUT_SECS", 30),
        events_timeout: secs("FAAS_EVENTS_TIMEOUT_SECS", 10),
        dry_run: get("FAAS_DRY_RUN")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(false),
    }
}
