//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration (paths, listen address, SMTP relay, third-party
//! credentials) comes from a TOML file. Runtime tunables live in the
//! database `settings` table (see [`crate::db::settings`]).

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "wtr.db";

/// Environment variable consulted for the root folder
pub const ROOT_FOLDER_ENV: &str = "WTR_ROOT_FOLDER";

/// Contents of `config.toml`
///
/// Every section is optional; missing sections fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub root_folder: Option<PathBuf>,
    pub server: ServerConfig,
    pub smtp: Option<SmtpConfig>,
    pub site: SiteConfig,
    pub webhook: WebhookConfig,
    pub telegram: Option<TelegramConfig>,
    pub llm: Option<LlmConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 5780,
        }
    }
}

/// SMTP relay settings
///
/// When this section is absent the web service logs emails instead of
/// sending them.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_name() -> String {
    "WipeThatRecord".to_string()
}

/// Public site settings used when rendering links in emails
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    /// Operations inbox for new-lead notifications (None disables them)
    pub ops_email: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://wipethatrecord.com".to_string(),
            ops_email: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Shared secret expected in `x-webhook-secret` (None rejects all webhooks)
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default)]
    pub allowed_chat_ids: Vec<i64>,
    #[serde(default = "default_telegram_api")]
    pub api_base: String,
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

/// OpenAI-compatible chat completion endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    pub api_key: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
}

fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Root folder resolution, in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. `root_folder` key of the TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    file_config: &FileConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(root) = &file_config.root_folder {
        return root.clone();
    }

    default_root_folder()
}

/// Load the TOML config file
///
/// An explicitly requested file must exist. Without one, the platform
/// locations are checked and a missing file yields the defaults.
pub fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match default_config_file() {
            Some(path) => path,
            None => return Ok(FileConfig::default()),
        },
    };

    let content = std::fs::read_to_string(&path)?;
    parse_file_config(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

/// Parse config file contents
pub fn parse_file_config(content: &str) -> Result<FileConfig> {
    toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
}

/// Database path under a resolved root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}

/// First existing platform config file
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("wtr").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/wtr/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/wtr (or /var/lib/wtr for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("wtr"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/wtr"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("wtr"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/wtr"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("wtr"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\wtr"))
    } else {
        PathBuf::from("./wtr_data")
    }
}
