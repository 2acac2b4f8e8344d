// Backend wire models
//
// Payload shapes for the session, room, and event endpoints. Fields use
// `#[serde(default)]` where the backend is known to omit them, and a few
// entries accept both the wrapped (`{"room": {...}}`) and bare shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Session ──────────────────────────────────────────────────────────

/// Response of `session/create`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    pub session: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub public_id: String,
    #[serde(default)]
    pub presence: Option<String>,
    #[serde(default)]
    pub user: Option<UserInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub username: String,
    #[serde(default)]
    pub name: String,
}

// ── Rooms ────────────────────────────────────────────────────────────

/// Response of `user/get_rooms`.
#[derive(Debug, Deserialize)]
pub struct RoomList {
    #[serde(default)]
    pub rooms: Vec<String>,
}

/// Response of `room/show`.
#[derive(Debug, Deserialize)]
pub struct RoomShow {
    #[serde(default)]
    pub rooms: Vec<RoomEntry>,
}

/// A room as listed by `room/show`, wrapped or bare.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RoomEntry {
    Wrapped { room: RoomInfo },
    Bare(RoomInfo),
}

impl RoomEntry {
    pub fn into_inner(self) -> RoomInfo {
        match self {
            Self::Wrapped { room } | Self::Bare(room) => room,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub blurb: Option<String>,
    #[serde(default, alias = "public")]
    pub is_public: bool,
    #[serde(default)]
    pub messages: Vec<MessageEntry>,
    #[serde(default)]
    pub roster: Option<Roster>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Roster {
    #[serde(default)]
    pub members: Vec<MemberInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberInfo {
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default, alias = "owner")]
    pub is_owner: bool,
    #[serde(default, alias = "presence")]
    pub is_online: bool,
}

/// Response of `room/get_archives`.
#[derive(Debug, Deserialize)]
pub struct Archive {
    #[serde(default)]
    pub messages: Vec<MessageEntry>,
}

// ── Messages ─────────────────────────────────────────────────────────

/// A message as listed in a backlog or archive, wrapped or bare.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageEntry {
    Wrapped { message: MessagePayload },
    Bare(MessagePayload),
}

impl MessageEntry {
    pub fn into_inner(self) -> MessagePayload {
        match self {
            Self::Wrapped { message } | Self::Bare(message) => message,
        }
    }
}

/// Speaker category of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    User,
    Bot,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagePayload {
    pub id: String,
    /// Present on observed events, absent on backlog entries.
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default, rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub speaker_id: String,
    #[serde(default)]
    pub public_session_id: Option<String>,
    #[serde(default)]
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

// ── Events ───────────────────────────────────────────────────────────

/// Response of `room/subscribe`.
#[derive(Debug, Deserialize)]
pub struct Subscription {
    pub counter: u64,
}

/// Response of `event/observe`.
///
/// Both fields are optional: a held request that times out on the client
/// side is folded into an empty response.
#[derive(Debug, Default, Deserialize)]
pub struct ObserveResponse {
    #[serde(default)]
    pub counter: Option<u64>,
    #[serde(default)]
    pub events: Vec<EventEntry>,
}

/// One observed event; exactly one of the fields is expected to be set.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEntry {
    #[serde(default)]
    pub message: Option<MessagePayload>,
    #[serde(default)]
    pub presence: Option<PresencePayload>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresencePayload {
    pub room: String,
    pub username: String,
    pub status: PresenceStatus,
    #[serde(default)]
    pub public_session_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon_url: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn room_entry_accepts_wrapped_and_bare() {
        let wrapped: RoomEntry =
            serde_json::from_value(serde_json::json!({ "room": { "id": "a", "name": "A" } }))
                .unwrap();
        let bare: RoomEntry =
            serde_json::from_value(serde_json::json!({ "id": "b", "public": true })).unwrap();

        assert_eq!(wrapped.into_inner().name, "A");
        let bare = bare.into_inner();
        assert_eq!(bare.id, "b");
        assert!(bare.is_public);
    }

    #[test]
    fn unknown_message_type_is_other() {
        let msg: MessagePayload = serde_json::from_value(serde_json::json!({
            "id": "1",
            "type": "system",
            "timestamp": "2011-02-15T07:52:17Z"
        }))
        .unwrap();
        assert_eq!(msg.message_type, MessageType::Other);
        assert_eq!(msg.room, None);
    }

    #[test]
    fn presence_status_parses_lowercase() {
        let p: PresencePayload = serde_json::from_value(serde_json::json!({
            "room": "r",
            "username": "bob",
            "status": "offline"
        }))
        .unwrap();
        assert_eq!(p.status, PresenceStatus::Offline);
    }
}
