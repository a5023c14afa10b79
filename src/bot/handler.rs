use std::sync::Arc;

use crate::bot::command::Command;
use crate::bot::render::{render_feed_list, render_help};
use crate::bot::transport::{BotIdentity, ChatTransport, IncomingMessage, TransportError};
use crate::feed::detector;
use crate::service::{AddOutcome, IngestionService};

/// Routes inbound chat messages to the administrative operations.
///
/// Every message is handled inside its own error boundary: a failing
/// command is logged, answered with a generic failure reply, and never
/// affects other commands, the poller, or the process.
pub struct CommandHandler {
    service: IngestionService,
    transport: Arc<dyn ChatTransport>,
    client: reqwest::Client,
    identity: BotIdentity,
}

/// Internal command failure, answered with a generic reply at the boundary.
#[derive(Debug, thiserror::Error)]
enum HandlerError {
    #[error(transparent)]
    Store(#[from] crate::storage::StoreError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl CommandHandler {
    pub fn new(
        service: IngestionService,
        transport: Arc<dyn ChatTransport>,
        client: reqwest::Client,
        identity: BotIdentity,
    ) -> Self {
        Self {
            service,
            transport,
            client,
            identity,
        }
    }

    /// Top-level entry point for one inbound message.
    pub async fn handle_message(&self, message: &IncomingMessage) {
        // Never respond to ourselves
        if message.author_id == self.identity.id {
            return;
        }
        let Some(command) = Command::parse(&self.identity.mention, &message.content) else {
            return;
        };

        let result = match command {
            Command::Add { url } => self.handle_add(message, url).await,
            Command::Remove { url } => self.handle_remove(message, url).await,
            Command::Check { url } => self.handle_check(message, url).await,
            Command::List => self.handle_list(message).await,
            Command::Help => self.reply(message, &render_help(&self.identity.name)).await,
            Command::Unknown(_) => {
                let text = format!(
                    "That isn't a command. You can see the documentation with `@{} help`.",
                    self.identity.name
                );
                self.reply(message, &text).await
            }
        };

        if let Err(e) = result {
            tracing::error!(channel = %message.channel_id, error = %e, "Command failed");
            if let Err(reply_err) = self
                .transport
                .reply(message, "An error occurred while processing your command.")
                .await
            {
                tracing::error!(error = %reply_err, "Failed to send error reply");
            }
        }
    }

    async fn handle_add(
        &self,
        message: &IncomingMessage,
        url: Option<String>,
    ) -> Result<(), HandlerError> {
        if !self.is_server_owner(message).await {
            return self.reply(message, "Only moderators may add feeds.").await;
        }
        let Some(url) = url else {
            let usage = format!("Usage: `@{} add <url>`", self.identity.name);
            return self.reply(message, &usage).await;
        };
        let Some(server_id) = message.server_id.as_deref() else {
            return self
                .reply(message, "This command can only be used in server channels.")
                .await;
        };

        if url::Url::parse(&url).is_err() {
            return self
                .reply(message, "Invalid feed URL or unsupported feed format.")
                .await;
        }
        let Some(feed_type) = detector::detect(&self.client, &url).await else {
            return self
                .reply(message, "Invalid feed URL or unsupported feed format.")
                .await;
        };

        let outcome = self
            .service
            .add_feed(&url, &message.channel_id, server_id, feed_type)
            .await?;

        match outcome {
            AddOutcome::AlreadyRegistered => {
                self.reply(message, "This feed is already added to this channel.")
                    .await
            }
            AddOutcome::Added(registration) => {
                let confirmation = format!("✅ Added {} feed: {}", feed_type.tag(), url);
                self.reply(message, &confirmation).await?;

                // Silent seeding: current items become "seen" so only entries
                // published after registration are ever delivered
                if let Err(e) = self.service.initialise_feed(&registration).await {
                    tracing::warn!(url = %registration.url, error = %e, "Feed initialise pass failed");
                }
                Ok(())
            }
        }
    }

    async fn handle_remove(
        &self,
        message: &IncomingMessage,
        url: Option<String>,
    ) -> Result<(), HandlerError> {
        if !self.is_server_owner(message).await {
            return self
                .reply(message, "Only moderators may remove feeds.")
                .await;
        }
        let Some(url) = url else {
            let usage = format!("Usage: `@{} remove <url>`", self.identity.name);
            return self.reply(message, &usage).await;
        };

        if self.service.remove_feed(&url, &message.channel_id).await? {
            self.reply(message, "✅ Feed removed successfully.").await
        } else {
            self.reply(message, "Feed not found in this channel.").await
        }
    }

    async fn handle_check(
        &self,
        message: &IncomingMessage,
        url: Option<String>,
    ) -> Result<(), HandlerError> {
        let Some(url) = url else {
            let usage = format!("Usage: `@{} check <url>`", self.identity.name);
            return self.reply(message, &usage).await;
        };

        let Some(registration) = self.service.find_feed(&url, &message.channel_id).await else {
            return self.reply(message, "Feed not found in this channel.").await;
        };

        self.reply(message, "Checking feed...").await?;
        if let Err(e) = self.service.check_feed(&registration).await {
            tracing::warn!(url = %registration.url, error = %e, "Manual feed check failed");
        }
        Ok(())
    }

    async fn handle_list(&self, message: &IncomingMessage) -> Result<(), HandlerError> {
        let registrations = self.service.list_feeds(&message.channel_id).await?;
        if registrations.is_empty() {
            return self
                .reply(message, "No feeds configured for this channel.")
                .await;
        }
        self.reply(message, &render_feed_list(&registrations)).await
    }

    /// Sole authorization rule: the invoking user owns the channel's server.
    async fn is_server_owner(&self, message: &IncomingMessage) -> bool {
        let Some(server_id) = message.server_id.as_deref() else {
            return false;
        };
        match self.transport.server_owner(server_id).await {
            Ok(Some(owner_id)) => owner_id == message.author_id,
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(server = %server_id, error = %e, "Owner lookup failed");
                false
            }
        }
    }

    async fn reply(&self, message: &IncomingMessage, text: &str) -> Result<(), HandlerError> {
        self.transport.reply(message, text).await?;
        Ok(())
    }
}
