//! Configuration for the chatbridge gateway.
//!
//! A flat TOML file merged over built-in defaults and `CHATBRIDGE_*`
//! environment variables, and translation to `chatbridge_irc::GatewayConfig`.
//! The binary layers its CLI flags on top before translating.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use chatbridge_core::BackendConfig;
use chatbridge_core::config::{DEFAULT_API_URL, DEFAULT_BACKLOG_WINDOW, DEFAULT_OBSERVE_URL};
use chatbridge_irc::GatewayConfig;
use chatbridge_irc::config::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SERVER_NAME};

/// Prefix of environment variables that override file values.
pub const ENV_PREFIX: &str = "CHATBRIDGE_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── TOML config ─────────────────────────────────────────────────────

/// Gateway configuration as written in `config.toml`. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Address the IRC listener binds.
    pub listen: String,
    pub port: u16,

    /// Backlog messages wanted per room on join.
    pub backlog_depth: usize,
    /// Backlog messages the backend sends without an archive call.
    pub backlog_window: usize,

    /// Application key sent on session creation (plaintext; prefer the env var).
    pub api_key: Option<String>,
    pub auto_reconnect: bool,

    pub api_url: String,
    /// Base URL for the long-poll endpoint.
    pub observe_url: String,

    /// Seconds.
    pub request_timeout: u64,
    /// Seconds the backend may hold an observe request.
    pub observe_timeout: u64,
    /// Seconds between a failed backend cycle and the next attempt.
    pub retry_interval: u64,

    /// Source name on numeric replies.
    pub server_name: String,
    /// Host part of `nick!nick@host` prefixes.
    pub host: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            backlog_depth: DEFAULT_BACKLOG_WINDOW,
            backlog_window: DEFAULT_BACKLOG_WINDOW,
            api_key: None,
            auto_reconnect: true,
            api_url: DEFAULT_API_URL.into(),
            observe_url: DEFAULT_OBSERVE_URL.into(),
            request_timeout: 30,
            observe_timeout: 100,
            retry_interval: 60,
            server_name: DEFAULT_SERVER_NAME.into(),
            host: DEFAULT_HOST.into(),
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "chatbridge", "chatbridge").map_or_else(
        || PathBuf::from("chatbridge.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from the default path + environment. A missing file is not an error.
pub fn load_config() -> Result<Config, ConfigError> {
    load_from(&config_path())
}

/// Load from `path` + environment, over defaults.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX))
        .extract()?;
    Ok(config)
}

impl Config {
    /// The effective configuration rendered back to TOML, with the API key
    /// masked.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        if shown.api_key.is_some() {
            shown.api_key = Some("********".into());
        }
        Ok(toml::to_string_pretty(&shown)?)
    }

    /// Validate and translate into the gateway's runtime configuration.
    pub fn to_gateway_config(&self) -> Result<GatewayConfig, ConfigError> {
        let ip: IpAddr = self
            .listen
            .parse()
            .map_err(|_| ConfigError::validation("listen", format!("not an IP address: {}", self.listen)))?;

        let api_url = parse_url("api_url", &self.api_url)?;
        let observe_url = parse_url("observe_url", &self.observe_url)?;

        if self.backlog_window == 0 {
            return Err(ConfigError::validation("backlog_window", "must be at least 1"));
        }

        let mut backend = BackendConfig::new(api_url, observe_url);
        backend.api_key = self.api_key.clone().map(SecretString::from);
        backend.request_timeout = seconds("request_timeout", self.request_timeout)?;
        backend.observe_timeout = seconds("observe_timeout", self.observe_timeout)?;
        backend.retry_interval = seconds("retry_interval", self.retry_interval)?;
        backend.auto_reconnect = self.auto_reconnect;
        backend.backlog_depth = self.backlog_depth;
        backend.backlog_window = self.backlog_window;

        let mut gateway = GatewayConfig::new(SocketAddr::new(ip, self.port), backend);
        gateway.server_name.clone_from(&self.server_name);
        gateway.host.clone_from(&self.host);
        Ok(gateway)
    }
}

fn parse_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    let url: Url = value
        .parse()
        .map_err(|e| ConfigError::validation(field, format!("invalid URL {value}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::validation(field, format!("unsupported scheme '{other}'"))),
    }
}

fn seconds(field: &str, value: u64) -> Result<Duration, ConfigError> {
    if value == 0 {
        return Err(ConfigError::validation(field, "must be at least 1 second"));
    }
    Ok(Duration::from_secs(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn defaults_match_the_public_backend() {
        let gateway = Config::default().to_gateway_config().unwrap();
        assert_eq!(gateway.listen.to_string(), "127.0.0.1:26667");
        assert_eq!(gateway.server_name, "lingr");
        assert_eq!(gateway.host, "lingr.com");
        assert_eq!(gateway.backend.api_url.as_str(), "http://lingr.com/api/");
        assert_eq!(gateway.backend.observe_url.as_str(), "http://lingr.com:8080/api/");
        assert_eq!(gateway.backend.observe_timeout, Duration::from_secs(100));
        assert_eq!(gateway.backend.retry_interval, Duration::from_secs(60));
        assert_eq!(gateway.backend.backlog_depth, 30);
        assert!(gateway.backend.auto_reconnect);
        assert!(gateway.backend.api_key.is_none());
    }

    #[test]
    fn file_then_env_override_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "chatbridge.toml",
                r#"
                    port = 6667
                    backlog_depth = 100
                    auto_reconnect = false
                    api_key = "from-file"
                "#,
            )?;
            jail.set_env("CHATBRIDGE_PORT", "7000");
            jail.set_env("CHATBRIDGE_API_KEY", "from-env");

            let config = load_from(Path::new("chatbridge.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.port, 7000);
            assert_eq!(config.backlog_depth, 100);
            assert!(!config.auto_reconnect);
            assert_eq!(config.server_name, "lingr");

            let gateway = config.to_gateway_config().map_err(|e| e.to_string())?;
            let key = gateway.backend.api_key.ok_or("api key missing")?;
            assert_eq!(key.expose_secret(), "from-env");
            Ok(())
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_| {
            let config = load_from(Path::new("absent.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config, Config::default());
            Ok(())
        });
    }

    #[test]
    fn invalid_values_name_the_field() {
        let config = Config {
            listen: "localhost".into(),
            ..Config::default()
        };
        assert!(matches!(
            config.to_gateway_config(),
            Err(ConfigError::Validation { ref field, .. }) if field == "listen"
        ));

        let config = Config {
            observe_url: "ftp://lingr.com/".into(),
            ..Config::default()
        };
        assert!(matches!(
            config.to_gateway_config(),
            Err(ConfigError::Validation { ref field, .. }) if field == "observe_url"
        ));

        let config = Config {
            retry_interval: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.to_gateway_config(),
            Err(ConfigError::Validation { ref field, .. }) if field == "retry_interval"
        ));
    }

    #[test]
    fn rendered_toml_masks_the_api_key() {
        let config = Config {
            api_key: Some("hunter2".into()),
            ..Config::default()
        };
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("port = 26667"));
        assert!(!rendered.contains("hunter2"));
    }
}
