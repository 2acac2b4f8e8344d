// ── Runtime connection configuration ──
//
// These types describe *how* to reach the chat backend and *who* to log in
// as. They carry credential data and connection tuning, but never touch
// disk. The binary builds a `BackendConfig` and hands it in.

use std::time::Duration;

use chatbridge_api::TransportConfig;
use chatbridge_api::transport::{DEFAULT_OBSERVE_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
use secrecy::SecretString;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://lingr.com/api/";
pub const DEFAULT_OBSERVE_URL: &str = "http://lingr.com:8080/api/";
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// Number of messages `room/show` returns per room.
pub const DEFAULT_BACKLOG_WINDOW: usize = 30;

/// Account id and secret, accumulated by the IRC side from PASS/NICK.
///
/// Immutable once a connection starts.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub account: String,
    pub secret: SecretString,
}

impl Credentials {
    pub fn new(account: impl Into<String>, secret: SecretString) -> Self {
        Self {
            account: account.into(),
            secret,
        }
    }
}

/// Configuration for one backend connection.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL for ordinary calls (e.g., `http://lingr.com/api/`).
    pub api_url: Url,
    /// Base URL for `event/observe`.
    pub observe_url: Url,
    /// Optional application key sent on session creation.
    pub api_key: Option<SecretString>,
    /// Timeout for every call except observe.
    pub request_timeout: Duration,
    /// Timeout for the held observe call.
    pub observe_timeout: Duration,
    /// Sleep between a failed cycle and the next session attempt.
    pub retry_interval: Duration,
    /// Restart from session creation after a transient failure.
    pub auto_reconnect: bool,
    /// Desired number of backlog messages per room.
    pub backlog_depth: usize,
    /// Number of backlog messages the backend returns by itself.
    pub backlog_window: usize,
}

impl BackendConfig {
    /// Config with default tuning for the given endpoints.
    pub fn new(api_url: Url, observe_url: Url) -> Self {
        Self {
            api_url,
            observe_url,
            api_key: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            observe_timeout: DEFAULT_OBSERVE_TIMEOUT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            auto_reconnect: true,
            backlog_depth: DEFAULT_BACKLOG_WINDOW,
            backlog_window: DEFAULT_BACKLOG_WINDOW,
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            request_timeout: self.request_timeout,
            observe_timeout: self.observe_timeout,
            ..TransportConfig::default()
        }
    }
}
