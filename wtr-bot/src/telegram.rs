//! Telegram Bot API client (long polling)

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BotError, Result};

const USER_AGENT: &str = concat!("wtr-bot/", env!("CARGO_PKG_VERSION"));

/// Seconds Telegram holds a `getUpdates` request open
pub const LONG_POLL_SECS: u64 = 30;

/// Telegram rejects messages longer than this (characters)
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Every Bot API response is wrapped in this envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<T> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(BotError::Telegram(
                self.description
                    .unwrap_or_else(|| "no description".to_string()),
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

pub struct TelegramClient {
    http_client: reqwest::Client,
    /// `{api_base}/bot{token}`
    bot_url: String,
}

impl TelegramClient {
    pub fn new(api_base: &str, bot_token: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(LONG_POLL_SECS + 15))
            .build()?;

        Ok(Self {
            http_client,
            bot_url: format!("{}/bot{}", api_base.trim_end_matches('/'), bot_token),
        })
    }

    /// Wait for updates after `offset`
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let response = self
            .http_client
            .get(format!("{}/getUpdates", self.bot_url))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", LONG_POLL_SECS.to_string()),
                ("allowed_updates", r#"["message"]"#.to_string()),
            ])
            .send()
            .await?;

        let updates = Self::parse::<Vec<Update>>(response).await?;
        if !updates.is_empty() {
            debug!(count = updates.len(), "Received Telegram updates");
        }
        Ok(updates)
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let response = self
            .http_client
            .post(format!("{}/sendMessage", self.bot_url))
            .json(&SendMessage { chat_id, text })
            .send()
            .await?;

        Self::parse::<serde_json::Value>(response).await?;
        Ok(())
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(BotError::Api(status.as_u16(), error_text));
        }

        response.json::<Envelope<T>>().await?.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_updates_envelope() {
        let raw = r#"{
            "ok": true,
            "result": [
                {"update_id": 10, "message": {"message_id": 1, "chat": {"id": 42, "type": "private"}, "text": "/stats"}},
                {"update_id": 11, "edited_message": {"message_id": 1, "chat": {"id": 42}}}
            ]
        }"#;
        let envelope: Envelope<Vec<Update>> = serde_json::from_str(raw).unwrap();
        let updates = envelope.into_result().unwrap();

        assert_eq!(updates.len(), 2);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, 42);
        assert_eq!(message.text.as_deref(), Some("/stats"));
        assert!(updates[1].message.is_none());
    }

    #[test]
    fn test_error_envelope() {
        let raw = r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#;
        let envelope: Envelope<Vec<Update>> = serde_json::from_str(raw).unwrap();
        match envelope.into_result() {
            Err(BotError::Telegram(description)) => assert_eq!(description, "Unauthorized"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bot_url() {
        let client = TelegramClient::new("https://api.telegram.org/", "123:abc").unwrap();
        assert_eq!(client.bot_url, "https://api.telegram.org/bot123:abc");
    }
}
