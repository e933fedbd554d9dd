//! Parley chat relay.
//!
//! Accepts TCP connections speaking the Parley frame protocol, registers
//! clients under unique nicknames, and relays direct, broadcast and
//! channel messages plus file-transfer negotiation between them.
//!
//! All chat state lives in a single hub task; see [`hub`].

pub mod channels;
pub mod clients;
pub mod config;
mod connection;
pub mod dispatch;
pub mod hub;
pub mod negotiator;
mod server;
pub mod session;

pub use channels::{ChannelError, ChannelRegistry};
pub use clients::{ClientRegistry, RegistryError};
pub use config::ServerConfig;
pub use dispatch::{ChatState, DisconnectReason, Disposition};
pub use negotiator::NegotiationError;
pub use server::ChatServer;
pub use session::{Session, SessionId};

/// Outbound frames queued per connection.
pub const SEND_BUFFER_SIZE: usize = 256;

/// Events queued between the connection tasks and the hub.
pub const EVENT_BUFFER_SIZE: usize = 1024;

/// Errors produced by the chat server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("hub task failed: {0}")]
    Hub(#[from] tokio::task::JoinError),
}
