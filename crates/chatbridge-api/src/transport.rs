// Shared transport configuration for building the backend reqwest::Client.
//
// The long-poll observe call gets its own, much longer, per-request timeout;
// every other call uses `request_timeout`.

use std::time::Duration;

/// Default timeout for ordinary backend calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for `event/observe`; the backend holds the request open.
pub const DEFAULT_OBSERVE_TIMEOUT: Duration = Duration::from_secs(100);

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub request_timeout: Duration,
    pub observe_timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            observe_timeout: DEFAULT_OBSERVE_TIMEOUT,
            user_agent: concat!("chatbridge/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    ///
    /// No client-wide timeout is set: timeouts are applied per request so the
    /// observe call can outlive ordinary calls.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .connect_timeout(self.request_timeout)
            .build()
            .map_err(crate::error::Error::Transport)
    }
}
