use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use autofeeds::bot::telegram::TelegramTransport;
use autofeeds::bot::{connect_with_retry, ChatTransport, CommandHandler};
use autofeeds::{Config, IngestionService, Poller, Store};

// Startup gates: the store gets many attempts with a short delay since it
// may still be booting alongside us; the chat service gets fewer, slower ones.
const STORE_CONNECT_ATTEMPTS: u32 = 30;
const STORE_CONNECT_DELAY: Duration = Duration::from_secs(2);
const CHAT_CONNECT_ATTEMPTS: u32 = 5;
const CHAT_CONNECT_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let store = Store::open_with_retry(
        &config.database_url,
        STORE_CONNECT_ATTEMPTS,
        STORE_CONNECT_DELAY,
    )
    .await
    .context("Failed to connect to the database")?;

    let client = autofeeds::feed::build_client().context("Failed to build HTTP client")?;
    let transport = Arc::new(TelegramTransport::new(client.clone(), &config.bot_token));
    let identity = connect_with_retry(
        transport.as_ref(),
        CHAT_CONNECT_ATTEMPTS,
        CHAT_CONNECT_DELAY,
    )
    .await
    .context("Failed to connect to the chat service")?;

    let service = IngestionService::new(
        store,
        client.clone(),
        transport.clone() as Arc<dyn ChatTransport>,
    );
    let hydrated = service
        .hydrate()
        .await
        .context("Failed to load feeds from the database")?;
    tracing::info!(feeds = hydrated, "Loaded feeds from database");

    // Scheduled polling runs independently of command handling; a failure in
    // either never reaches the other.
    let poller = Poller::new(service.clone(), config.poll_interval, config.feed_pacing);
    tokio::spawn(poller.run());

    let (message_tx, mut message_rx) = mpsc::channel(32);
    let update_transport = transport.clone();
    tokio::spawn(async move { update_transport.run_update_loop(message_tx).await });

    let handler = CommandHandler::new(service, transport as Arc<dyn ChatTransport>, client, identity);
    tracing::info!("autofeeds is running");
    while let Some(message) = message_rx.recv().await {
        handler.handle_message(&message).await;
    }

    Ok(())
}
