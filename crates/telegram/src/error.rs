use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram API request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Telegram API returned an error ({code}): {description}")]
    ApiError { code: i32, description: String },

    #[error("Telegram API did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Telegram bot is not configured. Missing token.")]
    NotConfigured,

    #[error("The Telegram bot has been closed")]
    Closed,
}

impl From<reqwest::Error> for TelegramError {
    /// Request URLs embed the bot token, so they are stripped before the error travels anywhere.
    fn from(err: reqwest::Error) -> Self {
        TelegramError::Request(err.without_url())
    }
}
