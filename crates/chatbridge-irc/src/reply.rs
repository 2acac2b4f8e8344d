// ── Outbound line rendering ──
//
// Pure formatting of IRC lines for one client. Lines carry no terminator;
// the writer adds `\r\n`.

use std::borrow::Cow;
use std::fmt::Display;

use chatbridge_core::{Member, Message, Room};
use chrono::Local;

/// Placeholder WHOIS server location; the backend exposes none.
const WHOIS_LOCATION: &str = "San Francisco, US";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Verb {
    Privmsg,
    Notice,
    Join,
    Part,
}

/// Replace the characters that would end or corrupt an IRC line. Applied
/// to every backend-supplied field.
fn clean(text: &str) -> Cow<'_, str> {
    const BREAKS: [char; 3] = ['\r', '\n', '\0'];
    if text.contains(BREAKS) {
        Cow::Owned(text.replace(BREAKS, " "))
    } else {
        Cow::Borrowed(text)
    }
}

/// Renders lines addressed to one client nickname.
#[derive(Debug, Clone)]
pub struct Replies {
    server_name: String,
    host: String,
    nick: String,
}

impl Replies {
    pub fn new(server_name: impl Into<String>, host: impl Into<String>, nick: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            host: host.into(),
            nick: nick.into(),
        }
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// `:user!user@host`
    pub fn user_prefix(&self, user: &str) -> String {
        let user = clean(user);
        format!(":{user}!{user}@{}", self.host)
    }

    /// `:server NNN nick text`
    pub fn numeric(&self, code: u16, text: impl Display) -> String {
        let text = text.to_string();
        format!(":{} {code:03} {} {}", self.server_name, self.nick, clean(&text))
    }

    // ── Registration ─────────────────────────────────────────────

    pub fn welcome(&self) -> Vec<String> {
        vec![
            self.numeric(1, ":Welcome to Lingr!"),
            self.numeric(376, ":End of MOTD."),
        ]
    }

    pub fn not_registered(&self, command: &str) -> String {
        self.numeric(451, format_args!("{command} :You have not registered"))
    }

    pub fn already_registered(&self) -> String {
        self.numeric(462, ":You may not reregister")
    }

    pub fn password_mismatch(&self) -> String {
        self.numeric(464, ":Password incorrect")
    }

    // ── Rooms and messages ───────────────────────────────────────

    /// JOIN, topic, names and end-of-names for one room.
    pub fn room_block(&self, room: &Room) -> Vec<String> {
        let names = room
            .members
            .values()
            .map(|m| format!("{}{}", if m.is_owner { "@" } else { "" }, m.username))
            .collect::<Vec<_>>()
            .join(" ");
        vec![
            format!("{} JOIN #{}", self.user_prefix(&self.nick), clean(&room.id)),
            self.numeric(332, format_args!("#{} :{}", room.id, room.display_name)),
            self.numeric(353, format_args!("= #{} :{names}", room.id)),
            self.numeric(366, format_args!("#{} :End of NAMES list.", room.id)),
        ]
    }

    /// One line per text line of `message`, from its speaker to `#room_id`.
    /// Bot messages go out as NOTICE, everything else as PRIVMSG. With
    /// `with_time` each line ends with the local send time.
    pub fn message(&self, room_id: &str, message: &Message, with_time: bool) -> Vec<String> {
        let verb = if message.is_bot() { Verb::Notice } else { Verb::Privmsg };
        let prefix = self.user_prefix(&message.speaker_id);
        let room_id = clean(room_id);
        let time = if with_time {
            let local = message.timestamp.with_timezone(&Local);
            format!(" ({})", local.format("%m/%d %H:%M"))
        } else {
            String::new()
        };
        message
            .lines()
            .map(|line| format!("{prefix} {verb} #{room_id} :{}{time}", clean(line)))
            .collect()
    }

    /// JOIN or PART of another member, for presence rendering.
    pub fn presence(&self, verb: Verb, room_id: &str, member: &Member) -> String {
        format!("{} {verb} #{}", self.user_prefix(&member.username), clean(room_id))
    }

    // ── Queries ──────────────────────────────────────────────────

    /// WHOIS reply series for `target`. `memberships` lists every room the
    /// target belongs to; empty means no such nick.
    pub fn whois(&self, target: &str, memberships: &[(&Room, &Member)]) -> Vec<String> {
        let end = self.numeric(318, format_args!("{target} {} :End of WHOIS list.", self.host));
        let Some((_, member)) = memberships.first() else {
            return vec![self.numeric(401, format_args!("{target} :No such nick/channel")), end];
        };

        let channels = memberships
            .iter()
            .map(|(room, m)| format!("{}#{}", if m.is_owner { "@" } else { "" }, room.id))
            .collect::<Vec<_>>()
            .join(" ");
        vec![
            self.numeric(
                311,
                format_args!("{target} {target} {} * :{}", self.host, member.display_name),
            ),
            self.numeric(319, format_args!("{target} :{channels}")),
            self.numeric(312, format_args!("{target} {} :{WHOIS_LOCATION}", self.host)),
            end,
        ]
    }

    pub fn pong(&self, argument: &str) -> String {
        format!("{} PONG {}", self.user_prefix(&self.nick), clean(argument))
    }

    /// The last line a client sees before the socket closes.
    pub fn closing(&self, reason: &str) -> String {
        format!(
            "ERROR :Closing Link: {nick}!{nick}@{host} (\"{reason}\")",
            nick = self.nick,
            host = self.host,
            reason = clean(reason),
        )
    }
}
