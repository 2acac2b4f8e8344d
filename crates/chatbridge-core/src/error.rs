// ── Core error types ──
//
// Errors surfaced by a backend connection. The `From<chatbridge_api::Error>`
// impl folds transport-layer failures into the gateway's taxonomy:
// transport, parse, and API envelope errors, plus the credential rejection
// that must never be retried.

use chatbridge_api::error::INVALID_USER_CREDENTIALS;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Backend errors ───────────────────────────────────────────────
    #[error("Cannot reach backend: {reason}")]
    Transport { reason: String },

    #[error("Backend request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Malformed backend response: {message}")]
    Parse { message: String },

    #[error("API error ({code}): {detail}")]
    Api { code: String, detail: String },

    #[error("Invalid user credentials: {detail}")]
    InvalidCredentials { detail: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("No backend session")]
    NoSession,

    #[error("Unknown room: {room}")]
    UnknownRoom { room: String },

    #[error("{hook} hook failed: {message}")]
    Hook { hook: &'static str, message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` if the connection must stop instead of reconnecting.
    ///
    /// Rejected credentials, failing hooks and bad configuration; everything
    /// else restarts the session cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials { .. } | Self::Hook { .. } | Self::Config { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<chatbridge_api::Error> for CoreError {
    fn from(err: chatbridge_api::Error) -> Self {
        match err {
            chatbridge_api::Error::Transport(e) => CoreError::Transport {
                reason: e.to_string(),
            },
            chatbridge_api::Error::Timeout { timeout_secs, .. } => {
                CoreError::Timeout { timeout_secs }
            }
            chatbridge_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            chatbridge_api::Error::Deserialization { message, body: _ } => {
                CoreError::Parse { message }
            }
            chatbridge_api::Error::Api { code, detail } if code == INVALID_USER_CREDENTIALS => {
                CoreError::InvalidCredentials { detail }
            }
            chatbridge_api::Error::Api { code, detail } => CoreError::Api { code, detail },
        }
    }
}
