use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::TelegramError;

/// Replies are rendered with Telegram's legacy Markdown.
pub const PARSE_MODE: &str = "Markdown";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

/// The envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i32>,
}

/// The JSON payload for the Telegram `sendMessage` endpoint.
#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Debug, Serialize)]
struct GetUpdatesPayload {
    offset: i64,
    timeout: u64,
    allowed_updates: &'static [&'static str],
}

/// A validated bot: the HTTP client, the bot's own identity and the method base URL.
#[derive(Debug, Clone)]
pub struct BotHandle {
    client: Client,
    base_url: String,
    me: User,
    timeout: Duration,
}

impl BotHandle {
    /// Calls `getMe`; a bot that cannot identify itself is not handed out.
    pub async fn open(client: Client, api_url: &str, token: &str, timeout: Duration) -> Result<Self, TelegramError> {
        let base_url = format!("{}/bot{}", api_url.trim_end_matches('/'), token);
        let me: User = call(&client, &base_url, "getMe", &serde_json::json!({}), timeout).await?;

        tracing::info!(bot_id = me.id, username = ?me.username, "Telegram bot authorized");

        Ok(Self {
            client,
            base_url,
            me,
            timeout,
        })
    }

    /// The bot's own account.
    pub fn me(&self) -> &User {
        &self.me
    }

    /// Long-polls for updates newer than `offset`.
    ///
    /// The server may hold the request for `long_poll`; the local deadline
    /// adds the ordinary request timeout on top of that.
    pub async fn get_updates(&self, offset: i64, long_poll: Duration) -> Result<Vec<Update>, TelegramError> {
        let payload = GetUpdatesPayload {
            offset,
            timeout: long_poll.as_secs(),
            allowed_updates: &["message"],
        };
        call(&self.client, &self.base_url, "getUpdates", &payload, long_poll + self.timeout).await
    }

    /// Sends a Markdown text message to a chat.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message, TelegramError> {
        let payload = SendMessagePayload {
            chat_id,
            text,
            parse_mode: PARSE_MODE,
        };
        call(&self.client, &self.base_url, "sendMessage", &payload, self.timeout).await
    }
}

async fn call<P, T>(
    client: &Client,
    base_url: &str,
    method: &str,
    payload: &P,
    timeout: Duration,
) -> Result<T, TelegramError>
where
    P: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let url = format!("{base_url}/{method}");
    let request = client.post(&url).timeout(timeout).json(payload);

    let response = tokio::time::timeout(timeout, request.send())
        .await
        .map_err(|_| TelegramError::Timeout(timeout))??;

    // Failed calls still answer with the JSON envelope, whatever the status.
    let body: ApiResponse<T> = response.json().await?;
    if !body.ok {
        return Err(TelegramError::ApiError {
            code: body.error_code.unwrap_or_default(),
            description: body.description.unwrap_or_default(),
        });
    }

    body.result.ok_or_else(|| TelegramError::ApiError {
        code: 0,
        description: format!("{method} answered without a result"),
    })
}

/// Escapes the characters that have special meaning in legacy Markdown.
pub fn escape_markdown(text: &str) -> String {
    let special_chars = "_*`[";
    special_chars
        .chars()
        .fold(text.to_string(), |s, c| s.replace(c, &format!("\\{}", c)))
}
