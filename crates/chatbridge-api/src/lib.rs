// chatbridge-api: Async Rust client for the long-polling chat backend

pub mod client;
pub mod error;
pub mod events;
pub mod models;
pub mod rooms;
pub mod session;
pub mod transport;

pub use client::BackendClient;
pub use error::Error;
pub use transport::TransportConfig;
