//! Outbound HTTP client construction shared by the vault, service and event clients.

use std::time::Duration;

/// Connection establishment budget, independent of the per-client total timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Build a client with the crate user agent and a total request `timeout`.
pub fn client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .user_agent(concat!("faas-kit/", env!("CARGO_PKG_VERSION")))
        .build()
}
