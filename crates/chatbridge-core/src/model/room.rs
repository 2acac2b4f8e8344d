use indexmap::IndexMap;

use chatbridge_api::models::{MemberInfo, PresencePayload, RoomInfo};

use super::Message;

/// Rooms keyed by id, in discovery order.
pub type RoomMap = IndexMap<String, Room>;

/// A room member. Created from the roster or on a first "online" event and
/// never removed; only presence changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub username: String,
    pub display_name: String,
    pub icon_url: Option<String>,
    pub is_owner: bool,
    pub is_present: bool,
}

impl From<MemberInfo> for Member {
    fn from(info: MemberInfo) -> Self {
        Self {
            username: info.username,
            display_name: info.name,
            icon_url: info.icon_url,
            is_owner: info.is_owner,
            is_present: info.is_online,
        }
    }
}

impl Member {
    fn from_presence(presence: &PresencePayload) -> Self {
        Self {
            username: presence.username.clone(),
            display_name: presence.name.clone(),
            icon_url: presence.icon_url.clone(),
            is_owner: false,
            is_present: false,
        }
    }
}

/// What a presence event did to a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceChange {
    /// The member did not exist before this event.
    pub first_seen: bool,
    /// The member's presence flag flipped.
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct Room {
    pub id: String,
    pub display_name: String,
    pub blurb: Option<String>,
    pub is_public: bool,
    /// Oldest first. Drained once replayed to the client.
    pub backlog: Vec<Message>,
    pub members: IndexMap<String, Member>,
}

impl Room {
    /// Build a room snapshot from `room/show`, deciding `is_mine` for every
    /// backlog message against `my_public_id`.
    pub fn from_info(info: RoomInfo, my_public_id: &str) -> Self {
        let backlog = info
            .messages
            .into_iter()
            .map(|entry| Message::new(entry.into_inner(), my_public_id))
            .collect();

        let mut members = IndexMap::new();
        for member in info.roster.unwrap_or_default().members {
            let member = Member::from(member);
            members.insert(member.username.clone(), member);
        }

        Self {
            id: info.id,
            display_name: info.name,
            blurb: info.blurb,
            is_public: info.is_public,
            backlog,
            members,
        }
    }

    /// Id of the oldest held message, the anchor for archive fetches.
    pub fn oldest_message_id(&self) -> Option<&str> {
        self.backlog.first().map(|m| m.id.as_str())
    }

    /// Put older messages in front of the backlog, oldest first.
    pub fn prepend_backlog(&mut self, mut older: Vec<Message>) {
        older.retain(|m| !self.backlog.iter().any(|held| held.id == m.id));
        older.sort_by_key(|m| m.timestamp);
        self.backlog.splice(0..0, older);
    }

    /// Remove and return the backlog so it is never replayed twice.
    pub fn take_backlog(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.backlog)
    }

    /// Apply an "online" event: create the member if unknown, mark present.
    pub fn member_online(&mut self, presence: &PresencePayload) -> PresenceChange {
        let first_seen = !self.members.contains_key(&presence.username);
        let member = self
            .members
            .entry(presence.username.clone())
            .or_insert_with(|| Member::from_presence(presence));
        let changed = !member.is_present;
        member.is_present = true;
        PresenceChange {
            first_seen,
            changed,
        }
    }

    /// Apply an "offline" event. Unknown members are left alone.
    pub fn member_offline(&mut self, username: &str) -> Option<PresenceChange> {
        let member = self.members.get_mut(username)?;
        let changed = member.is_present;
        member.is_present = false;
        Some(PresenceChange {
            first_seen: false,
            changed,
        })
    }
}
