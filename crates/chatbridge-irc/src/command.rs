// ── Inbound command parsing ──
//
// First-token dispatch, case-insensitive. Lines that do not parse are
// ignored by the session rather than treated as errors.

use std::str::FromStr;

use strum::EnumString;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
enum Keyword {
    Pass,
    Nick,
    User,
    Privmsg,
    Notice,
    Whois,
    Ping,
    Quit,
}

/// A client command the gateway understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Pass(String),
    Nick(String),
    /// Only the realname matters; it carries the feature tokens.
    User { realname: String },
    /// PRIVMSG and NOTICE alike. `target` has its channel prefix stripped.
    Privmsg { target: String, text: String },
    Whois(String),
    Ping(String),
    Quit,
}

impl Command {
    /// Parse one line (without its terminator). Returns `None` for unknown
    /// commands and for known commands missing a required parameter.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']).trim_start();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim_start()),
            None => (line, ""),
        };
        let keyword = Keyword::from_str(word).ok()?;

        if rest.is_empty() && keyword != Keyword::Quit {
            return None;
        }

        let command = match keyword {
            Keyword::Pass => Self::Pass(trailing(rest).to_owned()),
            Keyword::Nick => Self::Nick(first_token(rest).to_owned()),
            Keyword::User => Self::User {
                realname: skip_tokens(rest, 3).map(trailing).unwrap_or_default().to_owned(),
            },
            Keyword::Privmsg | Keyword::Notice => {
                let (target, text) = rest.split_once(char::is_whitespace)?;
                let target = target.strip_prefix('#').unwrap_or(target);
                Self::Privmsg {
                    target: target.to_owned(),
                    text: trailing(text.trim_start()).to_owned(),
                }
            }
            Keyword::Whois => Self::Whois(first_token(rest).to_owned()),
            Keyword::Ping => Self::Ping(rest.to_owned()),
            Keyword::Quit => Self::Quit,
        };
        Some(command)
    }
}

/// Drop the leading `:` marking an IRC trailing parameter.
fn trailing(s: &str) -> &str {
    s.strip_prefix(':').unwrap_or(s)
}

fn first_token(s: &str) -> &str {
    s.split_whitespace().next().unwrap_or_default()
}

/// The remainder after skipping `n` whitespace-separated tokens.
fn skip_tokens(s: &str, n: usize) -> Option<&str> {
    let mut rest = s.trim_start();
    for _ in 0..n {
        let (_, tail) = rest.split_once(char::is_whitespace)?;
        rest = tail.trim_start();
    }
    Some(rest)
}

// ── Realname features ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
enum Feature {
    Backlog,
    Time,
    Presence,
}

/// Rendering options requested through tokens in the USER realname,
/// e.g. `USER alice 0 * :Alice backlog time`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Features {
    /// Replay each room's backlog after joining.
    pub backlog: bool,
    /// Annotate replayed backlog lines with their local time.
    pub time: bool,
    /// Render presence changes as JOIN/PART.
    pub presence: bool,
}

impl Features {
    pub fn from_realname(realname: &str) -> Self {
        let mut features = Self::default();
        for token in realname.split_whitespace() {
            match Feature::from_str(token) {
                Ok(Feature::Backlog) => features.backlog = true,
                Ok(Feature::Time) => features.time = true,
                Ok(Feature::Presence) => features.presence = true,
                Err(_) => {}
            }
        }
        features
    }
}
