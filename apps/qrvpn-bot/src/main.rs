use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use qrvpn_db::Stores;
use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod bot;
mod config;
mod lexicon;
pub mod models;
mod services;
mod state;
#[cfg(test)]
mod testing;

use crate::bot::outbound::TelegramOutbox;
use crate::config::Config;
use crate::services::image_pool::{DirImagePool, ImagePool};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        println!("⚠️  Warning: Failed to load .env file: {}", e);
    }

    let config = Config::from_env().context("Invalid bot configuration")?;

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "bot.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qrvpn_bot=info,qrvpn_db=info,teloxide=warn,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stdout))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    info!("Starting QR VPN bot v{}...", env!("CARGO_PKG_VERSION"));

    let pool = qrvpn_db::init_db(&config.database_url).await?;
    let stores = Stores::postgres(pool);

    let images = DirImagePool::new(&config.qr_pool_dir);
    match images.remaining().await {
        Ok(left) => info!("Image pool {} holds {} unused images", images.dir().display(), left),
        Err(e) => error!("Image pool is not readable: {:#}", e),
    }

    let bot = Bot::new(&config.bot_token);
    let outbox = Arc::new(TelegramOutbox::new(bot.clone()));
    let state = AppState::new(config, stores, Arc::new(images), outbox)?;

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);

    let notifications = state.notifications.clone();
    let notifications_rx = shutdown_tx.subscribe();
    let notifier = tokio::spawn(async move { notifications.start(notifications_rx).await });

    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down...");
            let _ = ctrl_c_tx.send(());
        }
    });

    bot::run_bot(bot, shutdown_tx.subscribe(), state).await;

    // The dispatcher can also stop on its own; make sure the scheduler follows.
    let _ = shutdown_tx.send(());
    if let Err(e) = notifier.await {
        error!("Notification task ended abnormally: {}", e);
    }

    info!("Bot stopped");
    Ok(())
}
