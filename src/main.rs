use anyhow::{Context, Result};
use tokio::time::Duration;
use tracing::info;

use risk_watch::config::Config;
use risk_watch::monitor::Monitor;
use risk_watch::notify::TelegramNotifier;
use risk_watch::scheduler::{shutdown_channel, Scheduler};
use risk_watch::source::DataSource;
use risk_watch::telegram::TelegramClient;

#[tokio::main]
async fn main() -> Result<()> {
    risk_watch::init_tracing();

    let config = Config::load().context("Failed to load config")?;

    let client = TelegramClient::new(&config.telegram.api_base, &config.telegram.token)?;
    let me = client
        .get_me()
        .await
        .context("Telegram rejected the bot token")?;
    info!(
        bot = me.username.as_deref().unwrap_or(&me.first_name),
        api_base = %config.telegram.api_base,
        "Authenticated with Telegram"
    );

    let source = DataSource::from_config(&config.source)
        .await
        .with_context(|| format!("Failed to start {} source", config.source.kind()))?;
    let notifier = TelegramNotifier::new(client, config.chat_id.clone());
    let mut monitor = Monitor::new(source, notifier);

    // Graceful shutdown
    let (trigger, token) = shutdown_channel();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
        trigger.cancel();
    });

    info!(
        source = %monitor.describe_source(),
        chat_id = %config.chat_id,
        interval_secs = config.monitor.interval_secs,
        "System is live"
    );

    let scheduler = Scheduler::new(
        Duration::from_secs(config.monitor.interval_secs),
        Duration::from_secs(config.monitor.first_delay_secs),
    );
    scheduler.run(&mut monitor, token).await;

    monitor.close().await;
    info!("Bot stopped");
    Ok(())
}
