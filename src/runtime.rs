//! Event loop tying a transport to the bot.
//!
//! The adapter's inbound loop is supervised and restarted with backoff,
//! every inbound event is handled in its own task, and a periodic sweep
//! drops users whose rows were deleted from the store.

use crate::bot::GoalBot;
use crate::channels::{ChannelAdapter, ChannelInboundMessage};
use crate::config::BotConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const INITIAL_BACKOFF_SECS: u64 = 2;
const MAX_BACKOFF_SECS: u64 = 60;

/// Run until `shutdown` is cancelled.
///
/// On shutdown, in-flight handlers are awaited and every reminder job is
/// cancelled.
///
/// # Errors
///
/// Currently only returns `Ok`; transport failures are retried.
pub async fn run(
    bot: Arc<GoalBot>,
    adapter: Arc<dyn ChannelAdapter>,
    config: &BotConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let queue_size = config.telegram.inbound_queue_size.max(8);
    let (inbound_tx, mut inbound_rx) = mpsc::channel::<ChannelInboundMessage>(queue_size);

    let mut workers = JoinSet::new();
    workers.spawn(supervise(Arc::clone(&adapter), inbound_tx));

    let sweep_secs = config.maintenance.sweep_interval_secs;
    if sweep_secs > 0 {
        workers.spawn(sweep_loop(Arc::clone(&bot), Duration::from_secs(sweep_secs)));
    } else {
        debug!("maintenance sweep disabled");
    }

    info!(channel = adapter.id(), "goal bot runtime started");

    let mut handlers = JoinSet::new();
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            message = inbound_rx.recv() => {
                let Some(message) = message else {
                    warn!("inbound queue closed");
                    break;
                };
                let bot = Arc::clone(&bot);
                handlers.spawn(async move { bot.handle(message).await });
            }
        }
        while handlers.try_join_next().is_some() {}
    }

    workers.abort_all();
    while workers.join_next().await.is_some() {}
    while handlers.join_next().await.is_some() {}

    let cancelled = bot.scheduler().cancel_all();
    info!(cancelled, "goal bot runtime stopped");
    Ok(())
}

/// Keep the adapter's inbound loop alive, doubling the pause after each
/// failure up to a minute.
async fn supervise(adapter: Arc<dyn ChannelAdapter>, inbound_tx: mpsc::Sender<ChannelInboundMessage>) {
    let mut backoff_secs = INITIAL_BACKOFF_SECS;
    loop {
        match adapter.run(inbound_tx.clone()).await {
            Ok(()) if inbound_tx.is_closed() => return,
            Ok(()) => {
                warn!(channel = adapter.id(), "channel stopped; restarting");
            }
            Err(err) => {
                warn!(
                    channel = adapter.id(),
                    error = %err,
                    "channel failed; retrying in {backoff_secs}s"
                );
            }
        }
        tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
        backoff_secs = backoff_secs.saturating_mul(2).min(MAX_BACKOFF_SECS);
    }
}

async fn sweep_loop(bot: Arc<GoalBot>, period: Duration) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    loop {
        interval.tick().await;
        match bot.sweep().await {
            Ok(evicted) if evicted.is_empty() => debug!("maintenance sweep found nothing"),
            Ok(evicted) => info!(count = evicted.len(), ?evicted, "maintenance sweep evicted users"),
            Err(e) => warn!(error = %e, "maintenance sweep failed"),
        }
    }
}
