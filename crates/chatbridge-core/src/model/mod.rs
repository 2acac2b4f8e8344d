// ── Backend state model ──
//
// Value objects built from backend payloads, plus the mutation rules that
// observed events apply to them.

mod message;
mod room;
mod session;

pub use message::Message;
pub use room::{Member, PresenceChange, Room, RoomMap};
pub use session::Session;

pub use chatbridge_api::models::MessageType;
