use thiserror::Error;

/// Envelope error code the backend uses for a rejected login.
pub const INVALID_USER_CREDENTIALS: &str = "invalid_user_credentials";

/// Top-level error type for the `chatbridge-api` crate.
///
/// Covers every failure mode of a backend call: the HTTP transport,
/// malformed payloads, and envelopes whose `status` is not `"ok"`.
/// `chatbridge-core` decides which of these are worth a reconnect.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, reset, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A non-observe request exceeded its timeout.
    #[error("Request to {path} timed out after {timeout_secs}s")]
    Timeout { path: String, timeout_secs: u64 },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Data ────────────────────────────────────────────────────────
    /// The body was not a JSON object, or did not match the expected shape.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Envelope ────────────────────────────────────────────────────
    /// The envelope's `status` was not `"ok"`.
    #[error("API error ({code}): {detail}")]
    Api { code: String, detail: String },
}

impl Error {
    /// Returns `true` when the backend rejected the account/secret pair.
    ///
    /// This is the only failure a connection must never retry.
    pub fn is_invalid_credentials(&self) -> bool {
        matches!(self, Self::Api { code, .. } if code == INVALID_USER_CREDENTIALS)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        !self.is_invalid_credentials()
    }

    /// Extract the API error code, if available.
    pub fn api_error_code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}
