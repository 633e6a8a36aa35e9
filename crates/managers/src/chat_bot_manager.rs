use std::sync::Arc;
use std::time::Duration;

use core_types::{ContextResult, ErrorContext, WrapErr};
use telegram::{BotHandle, CommandHandler, Dispatcher, Poller, TelegramBot};
use tokio::sync::Mutex;

/// Runs the chat bot: validates it, then serves commands from a background poller.
pub struct ChatBotManager {
    bot: BotHandle,
    dispatcher: Arc<Dispatcher>,
    poller: Mutex<Option<Poller>>,
    ctx: ErrorContext,
}

impl ChatBotManager {
    /// Creates the bot (one `getMe` round trip) and starts polling for updates.
    pub async fn start(telegram: &TelegramBot, ctx: &ErrorContext) -> ContextResult<Self> {
        let ew = ErrorContext::function("NewChatBotManager");
        let ctx = ctx.append("ChatBotManager");

        let bot = telegram
            .get_bot()
            .await
            .wrap_err(&ctx.method("CreateBot"))
            .wrap_err(&ew)?;

        let config = telegram.config();
        let dispatcher = Arc::new(Dispatcher::new(config.admins.clone(), &ctx));
        let long_poll = Duration::from_secs(config.long_poller.timeout);
        let poller = Poller::spawn(bot.clone(), Arc::clone(&dispatcher), long_poll);

        Ok(Self {
            bot,
            dispatcher,
            poller: Mutex::new(Some(poller)),
            ctx,
        })
    }

    pub fn context(&self) -> &ErrorContext {
        &self.ctx
    }

    pub fn bot(&self) -> &BotHandle {
        &self.bot
    }

    /// Adds a command everyone may run.
    pub async fn handle(&self, command: &str, handler: Arc<dyn CommandHandler>) {
        self.dispatcher.register(command, handler).await;
    }

    /// Adds a command only `telegram.admins` may run.
    pub async fn handle_admin(&self, command: &str, handler: Arc<dyn CommandHandler>) {
        self.dispatcher.register_admin(command, handler).await;
    }

    /// Sends a Markdown message to a chat.
    pub async fn send(&self, chat_id: i64, text: &str) -> ContextResult<()> {
        let ew = self.ctx.method("Send");
        self.bot.send_message(chat_id, text).await.wrap_err(&ew)?;
        Ok(())
    }

    pub async fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .await
            .as_ref()
            .is_some_and(Poller::is_running)
    }

    /// Stops the poller. Later calls are no-ops.
    pub async fn stop(&self) {
        let poller = self.poller.lock().await.take();
        if let Some(poller) = poller {
            poller.stop().await;
        }
    }
}
