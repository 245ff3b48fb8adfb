//! Goal bot entry point.
//!
//! Usage: `goal-bot [config.toml]`. Without an argument the default config
//! path is used. Secrets may come from `GOALBOT_TELEGRAM_TOKEN` and
//! `GOALBOT_SHEETS_TOKEN`. Logs go to stderr, filtered by `RUST_LOG`.

use anyhow::Context;
use goal_bot::channels::{ChannelAdapter, TelegramAdapter};
use goal_bot::store::{SheetsStore, TabularStore};
use goal_bot::{BotConfig, GoalBot, runtime};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(BotConfig::default_config_path);
    let mut config = if path.exists() {
        BotConfig::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?
    } else {
        tracing::warn!(path = %path.display(), "config file not found; using defaults");
        BotConfig::default()
    };
    config.apply_env_overrides();
    config.validate().context("invalid configuration")?;

    let store: Arc<dyn TabularStore> = Arc::new(SheetsStore::new(&config.sheets)?);
    let adapter: Arc<dyn ChannelAdapter> = Arc::new(TelegramAdapter::new(&config.telegram)?);
    match adapter.health_check().await {
        Ok(true) => tracing::info!("telegram token accepted"),
        Ok(false) => tracing::warn!("telegram getMe did not report a bot account"),
        Err(e) => tracing::warn!(error = %e, "telegram health check failed; continuing"),
    }

    let bot = Arc::new(GoalBot::new(store, Arc::clone(&adapter), &config)?);
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("shutdown requested");
                    shutdown.cancel();
                }
                Err(e) => tracing::error!(error = %e, "failed to listen for ctrl-c"),
            }
        }
    });

    runtime::run(bot, adapter, &config, shutdown)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "goal bot exited with error");
            e
        })?;

    tracing::info!("goal bot shut down cleanly");
    Ok(())
}
