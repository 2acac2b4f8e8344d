// chatbridge-core: Backend connection lifecycle and state model between
// chatbridge-api and the IRC front end.

pub mod config;
pub mod connection;
pub mod error;
pub mod hooks;
pub mod model;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{BackendConfig, Credentials};
pub use connection::{BackendState, Connection, ConnectionHandle, ConnectionStatus};
pub use error::CoreError;
pub use hooks::{HookError, HookResult, Hooks};

pub use model::{Member, Message, MessageType, PresenceChange, Room, RoomMap, Session};
