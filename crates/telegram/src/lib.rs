//! Telegram Bot API transport: bot creation, the long-poll loop and command dispatch.

// Declare the modules that make up this crate.
pub mod api;
pub mod bot;
pub mod dispatch;
pub mod error;
pub mod poller;

// Re-export the core types to provide a clean public API.
pub use api::{BotHandle, Chat, Message, PARSE_MODE, Update, User, escape_markdown};
pub use bot::TelegramBot;
pub use dispatch::{
    Command, CommandContext, CommandHandler, Dispatcher, GENERIC_ERROR_REPLY, parse_command,
};
pub use error::TelegramError;
pub use poller::Poller;
