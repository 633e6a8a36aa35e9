use std::sync::atomic::{AtomicBool, Ordering};

use configuration::TelegramConfig;
use core_types::{ContextResult, ErrorContext, WrapErr};
use reqwest::Client;
use tokio::sync::OnceCell;

use crate::api::BotHandle;
use crate::error::TelegramError;

/// Owns the authorized bot. The bot is created and validated on first use.
pub struct TelegramBot {
    config: TelegramConfig,
    ctx: ErrorContext,
    handle: OnceCell<BotHandle>,
    closed: AtomicBool,
}

impl TelegramBot {
    pub fn new(config: TelegramConfig, ctx: &ErrorContext) -> Self {
        Self {
            config,
            ctx: ctx.append("Telegram"),
            handle: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn context(&self) -> &ErrorContext {
        &self.ctx
    }

    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    async fn create_bot(&self) -> Result<BotHandle, TelegramError> {
        if self.config.token.is_empty() {
            return Err(TelegramError::NotConfigured);
        }

        let client = Client::builder().build()?;
        BotHandle::open(client, &self.config.api_url, &self.config.token, self.config.timeout()).await
    }

    /// Returns the cached bot, creating it (one `getMe` round trip) first if needed.
    pub async fn get_bot(&self) -> ContextResult<BotHandle> {
        let ew = self.ctx.method("GetBot");

        if self.closed.load(Ordering::Acquire) {
            return Err(ew.wrap(TelegramError::Closed));
        }

        let handle = self
            .handle
            .get_or_try_init(|| self.create_bot())
            .await
            .wrap_err(&ew)?;

        Ok(handle.clone())
    }

    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> TelegramConfig {
        TelegramConfig {
            token: "123:abc".to_string(),
            api_url: server.uri(),
            timeout: 2,
            ..TelegramConfig::default()
        }
    }

    #[tokio::test]
    async fn bot_is_validated_once_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/getMe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {"id": 42, "is_bot": true, "first_name": "Launchpad", "username": "launchpad_bot"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let bot = TelegramBot::new(config_for(&server), &ErrorContext::new("Application"));
        let handle = bot.get_bot().await.unwrap();
        assert_eq!(handle.me().username.as_deref(), Some("launchpad_bot"));
        bot.get_bot().await.unwrap();

        server.verify().await;
    }

    #[tokio::test]
    async fn rejected_token_is_an_api_error_without_the_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "ok": false, "error_code": 401, "description": "Unauthorized"
            })))
            .mount(&server)
            .await;

        let bot = TelegramBot::new(config_for(&server), &ErrorContext::new("Application"));
        let err = bot.get_bot().await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Application.Telegram.GetBot: Telegram API returned an error (401): Unauthorized"
        );
        assert!(!err.to_string().contains("123:abc"));
    }

    #[tokio::test]
    async fn missing_token_and_closed_bot_are_errors() {
        let bot = TelegramBot::new(TelegramConfig::default(), &ErrorContext::default());
        let err = bot.get_bot().await.unwrap_err();
        assert!(matches!(err.find::<TelegramError>(), Some(TelegramError::NotConfigured)));

        bot.close().await;
        let err = bot.get_bot().await.unwrap_err();
        assert!(matches!(err.find::<TelegramError>(), Some(TelegramError::Closed)));
    }
}
