// Backend HTTP client
//
// Wraps `reqwest::Client` with backend URL construction, key-value request
// encoding, and `{ "status": "ok" | ... }` envelope unwrapping. Endpoint
// wrappers live in sibling modules as inherent methods so this file stays
// focused on transport mechanics.

use std::time::Duration;

use reqwest::Method;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Path of the long-poll endpoint, served from the observe host.
pub const OBSERVE_PATH: &str = "event/observe";

/// Raw HTTP client for the chat backend.
///
/// Cheap to clone: the underlying `reqwest::Client` is reference counted.
/// Every method returns the decoded envelope; callers never see a payload
/// whose `status` is not `"ok"`.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    api_url: Url,
    observe_url: Url,
    request_timeout: Duration,
    observe_timeout: Duration,
    app_key: Option<SecretString>,
}

impl BackendClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `api_url` serves every endpoint except `event/observe`, which goes to
    /// `observe_url` so the backend can hold it open on a separate port.
    pub fn new(api_url: Url, observe_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            api_url: with_trailing_slash(api_url),
            observe_url: with_trailing_slash(observe_url),
            request_timeout: transport.request_timeout,
            observe_timeout: transport.observe_timeout,
            app_key: None,
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    ///
    /// Handy in tests, where both URLs usually point at one mock server.
    pub fn from_reqwest(
        api_url: &str,
        observe_url: &str,
        http: reqwest::Client,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self {
            http,
            api_url: with_trailing_slash(Url::parse(api_url)?),
            observe_url: with_trailing_slash(Url::parse(observe_url)?),
            request_timeout: transport.request_timeout,
            observe_timeout: transport.observe_timeout,
            app_key: None,
        })
    }

    /// Attach the application key sent on `session/create`.
    pub fn with_app_key(mut self, app_key: Option<SecretString>) -> Self {
        self.app_key = app_key;
        self
    }

    pub(crate) fn app_key(&self) -> Option<&SecretString> {
        self.app_key.as_ref()
    }

    /// The base URL for ordinary calls.
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// The base URL for the long-poll call.
    pub fn observe_url(&self) -> &Url {
        &self.observe_url
    }

    // ── Generic call ─────────────────────────────────────────────────

    /// Issue one backend call and return the decoded envelope.
    ///
    /// GET parameters travel in the query string, POST parameters in a
    /// form-encoded body. A client-side timeout on `event/observe` is not an
    /// error: it yields `{"status": "ok"}` with no events so the caller simply
    /// observes again. A timeout on any other path is [`Error::Timeout`].
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, Error> {
        let observe = path == OBSERVE_PATH;
        let (base, timeout) = if observe {
            (&self.observe_url, self.observe_timeout)
        } else {
            (&self.api_url, self.request_timeout)
        };
        let url = base.join(path)?;

        debug!(%method, path, "backend request");

        let request = self.http.request(method.clone(), url).timeout(timeout);
        let request = if method == Method::GET {
            request.query(params)
        } else {
            request.form(params)
        };

        let body = match send_and_read(request).await {
            Ok(body) => body,
            Err(e) if e.is_timeout() && observe => {
                debug!("observe request held past the client timeout, folding into empty response");
                return Ok(serde_json::json!({ "status": "ok" }));
            }
            Err(e) if e.is_timeout() => {
                return Err(Error::Timeout {
                    path: path.to_owned(),
                    timeout_secs: timeout.as_secs(),
                });
            }
            Err(e) => return Err(Error::Transport(e)),
        };

        trace!(path, %body, "backend response");
        parse_envelope(body)
    }

    // ── Typed helpers ────────────────────────────────────────────────

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, Error> {
        let value = self.call(Method::GET, path, params).await?;
        decode(&value)
    }

    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, Error> {
        let value = self.call(Method::POST, path, params).await?;
        decode(&value)
    }

    /// POST whose response carries nothing beyond the envelope status.
    pub(crate) async fn post_unit(&self, path: &str, params: &[(&str, &str)]) -> Result<(), Error> {
        self.call(Method::POST, path, params).await.map(|_| ())
    }
}

async fn send_and_read(request: reqwest::RequestBuilder) -> Result<String, reqwest::Error> {
    request.send().await?.text().await
}

/// Parse the `{ status, code, detail, ... }` envelope.
///
/// Returns the whole object on `status == "ok"`, otherwise an
/// [`Error::Api`] carrying the envelope's code and detail.
fn parse_envelope(body: String) -> Result<Value, Error> {
    let value: Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => {
            return Err(Error::Deserialization {
                message: e.to_string(),
                body,
            });
        }
    };

    let Some(envelope) = value.as_object() else {
        return Err(Error::Deserialization {
            message: "expected a JSON object".into(),
            body,
        });
    };

    if envelope.get("status").and_then(Value::as_str) == Some("ok") {
        return Ok(value);
    }

    let field = |name: &str| envelope.get(name).and_then(Value::as_str).map(str::to_owned);
    Err(Error::Api {
        code: field("code").unwrap_or_else(|| "unknown".into()),
        detail: field("detail").unwrap_or_default(),
    })
}

fn decode<T: DeserializeOwned>(value: &Value) -> Result<T, Error> {
    T::deserialize(value).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: value.to_string(),
    })
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn envelope_ok_returns_whole_object() {
        let value = parse_envelope(r#"{"status":"ok","counter":7}"#.into()).unwrap();
        assert_eq!(value["counter"], 7);
    }

    #[test]
    fn envelope_error_carries_code_and_detail() {
        let err = parse_envelope(
            r#"{"status":"error","code":"invalid_user_credentials","detail":"nope"}"#.into(),
        )
        .unwrap_err();
        assert!(err.is_invalid_credentials());
        assert!(matches!(err, Error::Api { ref detail, .. } if detail == "nope"));
    }

    #[test]
    fn envelope_without_code_is_unknown() {
        let err = parse_envelope(r#"{"status":"error"}"#.into()).unwrap_err();
        assert_eq!(err.api_error_code(), Some("unknown"));
    }

    #[test]
    fn non_object_payload_is_parse_error() {
        assert!(matches!(
            parse_envelope("[1,2]".into()),
            Err(Error::Deserialization { .. })
        ));
        assert!(matches!(
            parse_envelope("<html>".into()),
            Err(Error::Deserialization { ref body, .. }) if body == "<html>"
        ));
    }

    #[test]
    fn base_urls_gain_trailing_slash() {
        let url = with_trailing_slash(Url::parse("http://example.com/api").unwrap());
        assert_eq!(url.join("room/show").unwrap().path(), "/api/room/show");
    }
}
