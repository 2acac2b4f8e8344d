use chrono::{DateTime, Utc};

use chatbridge_api::models::{MessagePayload, MessageType};

/// A chat message, from a backlog, an archive, or an observed event.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub kind: MessageType,
    pub nickname: String,
    pub speaker_id: String,
    pub public_session_id: Option<String>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    is_mine: bool,
}

impl Message {
    /// Build a message, deciding once whether our own session sent it.
    pub fn new(payload: MessagePayload, my_public_id: &str) -> Self {
        let is_mine = !my_public_id.is_empty()
            && payload.public_session_id.as_deref() == Some(my_public_id);
        Self {
            id: payload.id,
            kind: payload.message_type,
            nickname: payload.nickname,
            speaker_id: payload.speaker_id,
            public_session_id: payload.public_session_id,
            text: payload.text,
            timestamp: payload.timestamp,
            is_mine,
        }
    }

    /// Whether the connection's own session posted this message.
    pub fn is_mine(&self) -> bool {
        self.is_mine
    }

    pub fn is_bot(&self) -> bool {
        self.kind == MessageType::Bot
    }

    /// Text split on `\n`, `\r\n` and lone `\r`. Empty segments are skipped.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text
            .split('\n')
            .flat_map(|line| line.strip_suffix('\r').unwrap_or(line).split('\r'))
            .filter(|line| !line.is_empty())
    }
}
