// chatbridge-irc: IRC front end. Parses client lines, drives a backend
// connection per client, and renders backend events as IRC lines.

pub mod command;
pub mod config;
pub mod error;
pub mod listener;
pub mod outbound;
pub mod reply;
pub mod session;

pub use command::{Command, Features};
pub use config::GatewayConfig;
pub use error::GatewayError;
pub use listener::Listener;
pub use session::ClientSession;
