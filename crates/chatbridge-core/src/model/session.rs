use std::fmt;

use chatbridge_api::models::SessionInfo;

/// A live backend session. Exactly one per connection, owned by it.
#[derive(Clone)]
pub struct Session {
    /// Opaque token sent with every call after `session/create`.
    pub token: String,
    pub nickname: String,
    /// Compared against each message's `public_session_id` to spot echoes.
    pub public_id: String,
    pub presence: Option<String>,
    pub display_name: String,
    pub username: String,
}

impl From<SessionInfo> for Session {
    fn from(info: SessionInfo) -> Self {
        let (username, display_name) = info
            .user
            .map(|u| (u.username, u.name))
            .unwrap_or_default();
        Self {
            token: info.session,
            nickname: info.nickname,
            public_id: info.public_id,
            presence: info.presence,
            display_name,
            username,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("nickname", &self.nickname)
            .field("public_id", &self.public_id)
            .field("presence", &self.presence)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
