//! WipeThatRecord operations bot (wtr-bot) - Main entry point
//!
//! Reads the same config file and database as wtr-web. Needs `[telegram]`
//! and `[llm]` sections.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wtr_bot::llm::LlmClient;
use wtr_bot::telegram::TelegramClient;
use wtr_bot::{run_polling, Bot};
use wtr_common::config::{self, ROOT_FOLDER_ENV};
use wtr_common::db::init_database;

#[derive(Parser, Debug)]
#[command(name = "wtr-bot")]
#[command(about = "WipeThatRecord Telegram operations bot")]
#[command(version)]
struct Args {
    /// Config file (default: ~/.config/wtr/config.toml, then /etc/wtr/config.toml)
    #[arg(short, long, env = "WTR_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the database (overrides WTR_ROOT_FOLDER and the config file)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Bot token (overrides [telegram] bot_token)
    #[arg(long, env = "WTR_TELEGRAM_TOKEN", hide_env_values = true)]
    telegram_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wtr_bot=info,wtr_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting WipeThatRecord operations bot v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let file_config =
        config::load_file_config(args.config.as_deref()).context("Failed to load config file")?;

    let mut telegram_config = file_config
        .telegram
        .clone()
        .ok_or_else(|| anyhow!("Missing [telegram] section in config"))?;
    if let Some(token) = args.telegram_token {
        telegram_config.bot_token = token;
    }
    let llm_config = file_config
        .llm
        .clone()
        .ok_or_else(|| anyhow!("Missing [llm] section in config"))?;

    if telegram_config.allowed_chat_ids.is_empty() {
        warn!("allowed_chat_ids is empty; every message will be ignored");
    }

    let root_folder =
        config::resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &file_config);
    let db_path = config::database_path(&root_folder);
    let db = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    info!("Database ready: {}", db_path.display());

    let llm = LlmClient::new(&llm_config).context("Failed to build LLM client")?;
    let telegram = TelegramClient::new(&telegram_config.api_base, &telegram_config.bot_token)
        .context("Failed to build Telegram client")?;
    let bot = Bot::new(db, Arc::new(llm), &telegram_config.allowed_chat_ids);

    let cancel = CancellationToken::new();
    let poller = tokio::spawn(run_polling(bot, telegram, cancel.clone()));

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }
    info!("Shutting down");
    cancel.cancel();

    if let Err(e) = poller.await {
        error!("Polling task ended abnormally: {}", e);
    }
    Ok(())
}
