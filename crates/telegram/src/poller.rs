use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::{BotHandle, Update};
use crate::dispatch::Dispatcher;

/// Pause after a failed `getUpdates` before asking again.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// The running long-poll loop.
///
/// Dropping it closes the shutdown channel, so the loop ends at its next
/// await point; [`Poller::stop`] additionally waits for that to happen.
pub struct Poller {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Poller {
    /// Spawns the loop on the current runtime.
    pub fn spawn(bot: BotHandle, dispatcher: Arc<Dispatcher>, long_poll: Duration) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run(bot, dispatcher, long_poll, shutdown_rx));
        tracing::info!("Telegram poller started");
        Self { shutdown, task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signals the loop and waits for it to finish its current step.
    pub async fn stop(self) {
        // The receiver is gone only if the loop already ended.
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Telegram poller task failed");
        }
        tracing::info!("Telegram poller stopped");
    }
}

async fn run(
    bot: BotHandle,
    dispatcher: Arc<Dispatcher>,
    long_poll: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut offset = 0;

    while !*shutdown.borrow() {
        let updates = tokio::select! {
            _ = shutdown.changed() => break,
            result = bot.get_updates(offset, long_poll) => result,
        };

        match updates {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    handle_update(&bot, &dispatcher, update).await;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "getUpdates failed, retrying");
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }
    }
}

async fn handle_update(bot: &BotHandle, dispatcher: &Dispatcher, update: Update) {
    let Some(message) = update.message else {
        return;
    };

    let username = bot.me().username.as_deref();
    let Some(reply) = dispatcher.reply_for(&message, username).await else {
        return;
    };

    if let Err(e) = bot.send_message(message.chat.id, &reply).await {
        tracing::error!(chat_id = message.chat.id, error = %e, "Failed to send reply");
    }
}
