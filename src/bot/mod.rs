//! Chat-facing surface: command parsing and routing, message rendering,
//! and the transport seam to the remote chat service.

pub mod command;
pub mod handler;
pub mod render;
pub mod telegram;
pub mod transport;

pub use command::Command;
pub use handler::CommandHandler;
pub use transport::{connect_with_retry, BotIdentity, ChatTransport, IncomingMessage, TransportError};
