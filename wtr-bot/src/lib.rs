//! wtr-bot library - Telegram operations chatbot
//!
//! Answers the team's questions about leads, orders and revenue from the
//! shared WipeThatRecord database, optionally through an LLM.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub mod error;
pub mod handler;
pub mod llm;
pub mod telegram;

pub use crate::error::{BotError, Result};
pub use crate::handler::Bot;

use crate::handler::split_message;
use crate::telegram::{TelegramClient, MAX_MESSAGE_CHARS};

/// Pause after a failed poll before trying again
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Long-poll Telegram and answer messages until `cancel` fires
pub async fn run_polling(bot: Bot, telegram: TelegramClient, cancel: CancellationToken) {
    let mut offset = 0_i64;
    info!("Polling Telegram for messages");

    loop {
        let updates = tokio::select! {
            _ = cancel.cancelled() => break,
            result = telegram.get_updates(offset) => result,
        };

        let updates = match updates {
            Ok(updates) => updates,
            Err(e) => {
                warn!("getUpdates failed: {}", e);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => continue,
                }
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);

            let Some(message) = update.message else {
                continue;
            };
            let Some(text) = message.text.as_deref() else {
                continue;
            };

            let Some(reply) = bot.respond(message.chat.id, text).await else {
                continue;
            };

            for chunk in split_message(&reply, MAX_MESSAGE_CHARS) {
                if let Err(e) = telegram.send_message(message.chat.id, &chunk).await {
                    error!(chat_id = message.chat.id, "sendMessage failed: {}", e);
                    break;
                }
            }
        }
    }

    info!("Telegram polling stopped");
}
