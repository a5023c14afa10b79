use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to connect to chat service: {0}")]
    Connect(String),
    #[error("Channel {0} not found")]
    ChannelNotFound(String),
    #[error("Failed to send message: {0}")]
    Send(String),
    #[error("Lookup failed: {0}")]
    Lookup(String),
}

// ============================================================================
// Messages & Identity
// ============================================================================

/// One inbound chat message as seen by the command router.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub author_id: String,
    pub channel_id: String,
    /// Owning server/guild of the channel; `None` for direct messages.
    pub server_id: Option<String>,
    pub content: String,
}

/// Who the bot is on the chat network, resolved after connecting.
#[derive(Debug, Clone)]
pub struct BotIdentity {
    pub id: String,
    pub name: String,
    /// The literal prefix that addresses the bot, e.g. `<@1234>` or `@name`.
    pub mention: String,
}

// ============================================================================
// Transport Seam
// ============================================================================

/// Boundary to the remote chat service. The ingestion pipeline only ever
/// talks to the network through this trait, which keeps delivery and
/// authorization testable with an in-memory double.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Establish (or verify) the connection and resolve the bot's own
    /// identity. Called through [`connect_with_retry`] as a startup gate.
    async fn connect(&self) -> Result<BotIdentity, TransportError>;

    /// Reply in the channel the message came from.
    async fn reply(&self, message: &IncomingMessage, text: &str) -> Result<(), TransportError>;

    /// Post a message into a channel by id.
    async fn send_to_channel(&self, channel_id: &str, text: &str) -> Result<(), TransportError>;

    /// User id of the server's owner, if the server is known.
    async fn server_owner(&self, server_id: &str) -> Result<Option<String>, TransportError>;
}

/// Startup gate: bounded connect attempts with a fixed delay. The chat
/// service gets fewer attempts and a longer delay than the store, since an
/// unreachable chat endpoint is less likely to be a boot-ordering race.
pub async fn connect_with_retry(
    transport: &dyn ChatTransport,
    max_attempts: u32,
    delay: Duration,
) -> Result<BotIdentity, TransportError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match transport.connect().await {
            Ok(identity) => {
                tracing::info!(attempt, bot = %identity.name, "Connected to chat service");
                return Ok(identity);
            }
            Err(e) if attempt < max_attempts => {
                tracing::warn!(
                    attempt,
                    max_attempts,
                    error = %e,
                    "Chat connection attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
