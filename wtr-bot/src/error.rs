//! Bot error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status from an upstream API
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Telegram answered `ok: false`
    #[error("Telegram error: {0}")]
    Telegram(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty completion")]
    EmptyCompletion,

    #[error(transparent)]
    Store(#[from] wtr_common::Error),
}

impl From<reqwest::Error> for BotError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BotError::Parse(e.to_string())
        } else {
            BotError::Network(e.to_string())
        }
    }
}
