// Session endpoints
//
// session/create, session/destroy, session/set_presence.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::client::BackendClient;
use crate::error::Error;
use crate::models::SessionInfo;

impl BackendClient {
    /// Log in and obtain a session token.
    ///
    /// `POST session/create` with `user`, `password` and, when configured,
    /// `app_key`.
    pub async fn create_session(
        &self,
        user: &str,
        password: &SecretString,
    ) -> Result<SessionInfo, Error> {
        debug!(user, "creating session");
        let mut params = vec![("user", user), ("password", password.expose_secret())];
        if let Some(key) = self.app_key() {
            params.push(("app_key", key.expose_secret()));
        }
        self.post("session/create", &params).await
    }

    /// Invalidate a session token.
    ///
    /// `POST session/destroy`
    pub async fn destroy_session(&self, session: &str) -> Result<(), Error> {
        debug!("destroying session");
        self.post_unit("session/destroy", &[("session", session)])
            .await
    }

    /// Change the presence shown to other room members.
    ///
    /// `POST session/set_presence`
    pub async fn set_presence(
        &self,
        session: &str,
        presence: &str,
        nickname: &str,
    ) -> Result<(), Error> {
        debug!(presence, "setting presence");
        self.post_unit(
            "session/set_presence",
            &[
                ("session", session),
                ("presence", presence),
                ("nickname", nickname),
            ],
        )
        .await
    }
}
