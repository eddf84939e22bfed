//! Prints the id of every chat that messages (or adds) the bot.
//! Used once to discover the value for `CHAT_ID`.

use anyhow::{Context, Result};
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use risk_watch::config::TelegramConfig;
use risk_watch::scheduler::shutdown_channel;
use risk_watch::telegram::TelegramClient;

const LONG_POLL_SECS: u64 = 30;
const ERROR_PAUSE_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<()> {
    risk_watch::init_tracing();

    let telegram = TelegramConfig::load().context("Failed to load config")?;
    let client = TelegramClient::new(&telegram.api_base, &telegram.token)?;
    let me = client
        .get_me()
        .await
        .context("Telegram rejected the bot token")?;
    info!(
        bot = me.username.as_deref().unwrap_or(&me.first_name),
        "Waiting for messages; send anything to the bot"
    );

    let (trigger, mut token) = shutdown_channel();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        trigger.cancel();
    });

    let mut offset: Option<i64> = None;
    loop {
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            r = client.get_updates(offset, LONG_POLL_SECS) => r,
        };

        match result {
            Ok(updates) => {
                for update in updates {
                    offset = Some(update.update_id + 1);
                    if let Some(chat) = update.effective_chat() {
                        println!("{}", chat.id);
                        info!(
                            chat_id = chat.id,
                            chat_type = %chat.kind,
                            title = chat.title.as_deref().or(chat.username.as_deref()).unwrap_or("-"),
                            "Received update"
                        );
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "getUpdates failed");
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = sleep(Duration::from_secs(ERROR_PAUSE_SECS)) => {}
                }
            }
        }
    }

    info!("Stopped");
    Ok(())
}
