use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use core_types::{ContextResult, ErrorContext};
use tokio::sync::RwLock;

use crate::api::{Message, escape_markdown};

/// Sent to the user whenever a handler fails; details only go to the log.
pub const GENERIC_ERROR_REPLY: &str = "An error occurred";

/// A parsed `/command arg1 arg2` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Lowercased name without the leading slash or `@botname` suffix.
    pub name: String,
    pub args: Vec<String>,
}

/// Parses a command message.
///
/// `/cmd@OtherBot` is treated as addressed to another bot and ignored when
/// `bot_username` is known.
pub fn parse_command(text: &str, bot_username: Option<&str>) -> Option<Command> {
    let mut parts = text.split_whitespace();
    let head = parts.next()?.strip_prefix('/')?;

    let name = match head.split_once('@') {
        Some((name, mention)) => {
            if bot_username.is_some_and(|username| !mention.eq_ignore_ascii_case(username)) {
                return None;
            }
            name
        }
        None => head,
    };

    if name.is_empty() {
        return None;
    }

    Some(Command {
        name: name.to_ascii_lowercase(),
        args: parts.map(str::to_string).collect(),
    })
}

/// Everything a handler knows about the message it was invoked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandContext {
    pub chat_id: i64,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub command: Command,
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Returns the reply text, or `None` to stay silent.
    async fn handle(&self, ctx: &CommandContext) -> ContextResult<Option<String>>;
}

struct Route {
    handler: Arc<dyn CommandHandler>,
    admin_only: bool,
}

/// Routes commands to their registered handlers.
pub struct Dispatcher {
    ctx: ErrorContext,
    admins: Vec<i64>,
    routes: RwLock<HashMap<String, Route>>,
}

impl Dispatcher {
    pub fn new(admins: Vec<i64>, ctx: &ErrorContext) -> Self {
        Self {
            ctx: ctx.append("Dispatcher"),
            admins,
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `handler` for `/command`, replacing any previous handler.
    pub async fn register(&self, command: &str, handler: Arc<dyn CommandHandler>) {
        self.insert(command, handler, false).await;
    }

    /// Like [`Dispatcher::register`], but only senders listed as admins may run it.
    pub async fn register_admin(&self, command: &str, handler: Arc<dyn CommandHandler>) {
        self.insert(command, handler, true).await;
    }

    async fn insert(&self, command: &str, handler: Arc<dyn CommandHandler>, admin_only: bool) {
        let name = command.trim_start_matches('/').to_ascii_lowercase();
        tracing::debug!(command = %name, admin_only, "Command handler registered");
        self.routes
            .write()
            .await
            .insert(name, Route { handler, admin_only });
    }

    pub fn is_admin(&self, user_id: Option<i64>) -> bool {
        user_id.is_some_and(|id| self.admins.contains(&id))
    }

    /// Works out the reply to one incoming message, if any.
    pub async fn reply_for(&self, message: &Message, bot_username: Option<&str>) -> Option<String> {
        let command = parse_command(message.text.as_deref()?, bot_username)?;

        let (handler, admin_only) = {
            let routes = self.routes.read().await;
            let route = routes.get(&command.name)?;
            (Arc::clone(&route.handler), route.admin_only)
        };

        let sender = message.from.as_ref();
        let ctx = CommandContext {
            chat_id: message.chat.id,
            user_id: sender.map(|u| u.id),
            username: sender.and_then(|u| u.username.clone()),
            command,
        };

        if admin_only && !self.is_admin(ctx.user_id) {
            tracing::warn!(
                command = %ctx.command.name,
                user_id = ?ctx.user_id,
                "Admin-only command rejected"
            );
            return Some(format!(
                "Command /{} is available to administrators only",
                escape_markdown(&ctx.command.name)
            ));
        }

        match handler.handle(&ctx).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(
                    path = %self.ctx.method("Handle").path(),
                    command = %ctx.command.name,
                    error = %e,
                    "Command handler failed"
                );
                Some(GENERIC_ERROR_REPLY.to_string())
            }
        }
    }
}
