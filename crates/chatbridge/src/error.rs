//! CLI error types with miette diagnostics.

use std::net::SocketAddr;

use miette::Diagnostic;
use thiserror::Error;

use chatbridge_config::ConfigError;
use chatbridge_irc::GatewayError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const BIND: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────

    #[error("Config file not found: {path}")]
    #[diagnostic(
        code(chatbridge::no_config),
        help("Create the file, or drop --config to use the default location.")
    )]
    NoConfig { path: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(
        code(chatbridge::validation),
        help("Fix the value in the config file, the CHATBRIDGE_* environment, or the flag.")
    )]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(
        code(chatbridge::config),
        help("Check the config file syntax. Run with --print-config to see the defaults.")
    )]
    Config(ConfigError),

    // ── Listener ─────────────────────────────────────────────────────

    #[error("Cannot listen on {addr}")]
    #[diagnostic(
        code(chatbridge::bind),
        help("Another process may hold the port. Pick one with --port.")
    )]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(chatbridge::gateway))]
    Gateway(GatewayError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } => exit_code::USAGE,
            Self::NoConfig { .. } | Self::Config(_) => exit_code::CONFIG,
            Self::Bind { .. } => exit_code::BIND,
            Self::Gateway(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

impl From<GatewayError> for CliError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Bind { addr, source } => Self::Bind { addr, source },
            other => Self::Gateway(other),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_map_to_exit_codes() {
        let err = CliError::from(ConfigError::Validation {
            field: "port".into(),
            reason: "bad".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
        assert_eq!(err.to_string(), "Invalid value for port: bad");

        let err = CliError::NoConfig {
            path: "/nowhere.toml".into(),
        };
        assert_eq!(err.exit_code(), exit_code::CONFIG);
    }

    #[test]
    fn bind_failures_keep_the_address() {
        let addr: SocketAddr = "127.0.0.1:26667".parse().unwrap();
        let err = CliError::from(GatewayError::Bind {
            addr,
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        });
        assert_eq!(err.exit_code(), exit_code::BIND);
        assert_eq!(err.to_string(), "Cannot listen on 127.0.0.1:26667");
    }
}
