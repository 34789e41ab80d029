//! # Configuration
//!
//! Manages the loading and parsing of the application's configuration file (`config.yaml`).
//! Defines the structs for the Matrix connection, monitored rooms, the command catalog
//! location, the AI endpoint, storage and system settings.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Command that is permitted in every room that has command handling enabled.
pub const ALWAYS_ALLOWED_COMMAND: &str = "hi";

/// Main application configuration structure.
/// Matches the layout of `data/config.yaml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub services: ServicesConfig,
    #[serde(default)]
    pub rooms: Vec<RoomEntry>,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub system: SystemConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context(crate::strings::logs::CONFIG_PARSE_ERROR)
    }

    /// Looks up a monitored room by its Matrix room id.
    pub fn find_room(&self, room_id: &str) -> Option<&RoomEntry> {
        self.rooms.iter().find(|r| r.id == room_id)
    }
}

/// Configuration for various connected services.
#[derive(Debug, Deserialize, Clone)]
pub struct ServicesConfig {
    pub matrix: MatrixConfig,
}

/// Specific configuration for the Matrix service.
#[derive(Debug, Deserialize, Clone)]
pub struct MatrixConfig {
    pub username: String,
    pub password: String,
    pub homeserver: String,
    #[serde(default = "default_device_name")]
    pub device_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

fn default_device_name() -> String {
    "ash".to_string()
}

/// A room the bot monitors, with its webhook and command policy.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct RoomEntry {
    pub id: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub hook: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub send_user: bool,
    #[serde(default)]
    pub send_topic: bool,
    /// `None` disables commands in this room, an empty list allows all of them.
    #[serde(default)]
    pub allowed_commands: Option<Vec<String>>,
}

impl RoomEntry {
    pub fn commands_enabled(&self) -> bool {
        self.allowed_commands.is_some()
    }

    pub fn is_command_allowed(&self, name: &str) -> bool {
        match &self.allowed_commands {
            None => false,
            Some(list) => {
                list.is_empty()
                    || name == ALWAYS_ALLOWED_COMMAND
                    || list.iter().any(|c| c == name)
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,
    /// Overrides the label declared in the catalog file.
    #[serde(default)]
    pub reply_label: Option<String>,
    #[serde(default = "default_linkstash_url")]
    pub linkstash_url: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            reply_label: None,
            linkstash_url: default_linkstash_url(),
        }
    }
}

fn default_catalog_path() -> String {
    "data/bot.yaml".to_string()
}

fn default_linkstash_url() -> String {
    "https://linkstash.hsp-ec.xyz".to_string()
}

/// OpenAI-compatible completion endpoint.
#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    #[serde(default = "default_ai_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_ai_timeout")]
    pub timeout: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ai_endpoint(),
            api_key: None,
            api_key_env: default_api_key_env(),
            timeout: default_ai_timeout(),
        }
    }
}

impl AiConfig {
    /// Explicit key first, then the environment. Empty values count as missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

fn default_ai_endpoint() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_ai_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "data/messages.db".to_string()
}

/// System-level settings for the bot.
#[derive(Debug, Deserialize, Clone)]
pub struct SystemConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub opt_out_tag: Option<String>,
    #[serde(default = "default_links_path")]
    pub links_path: String,
    #[serde(default = "default_blacklist_path")]
    pub blacklist_path: String,
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: String,
    #[serde(default = "default_exec_timeout")]
    pub exec_timeout: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            dry_run: false,
            debug: false,
            opt_out_tag: None,
            links_path: default_links_path(),
            blacklist_path: default_blacklist_path(),
            tmp_dir: default_tmp_dir(),
            exec_timeout: default_exec_timeout(),
        }
    }
}

impl SystemConfig {
    /// Parses the configured timezone, falling back to UTC.
    pub fn tz(&self) -> chrono_tz::Tz {
        match self.timezone.parse::<chrono_tz::Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                tracing::warn!("Invalid timezone '{}' in config, using UTC", self.timezone);
                chrono_tz::UTC
            }
        }
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_links_path() -> String {
    "data/links.json".to_string()
}

fn default_blacklist_path() -> String {
    "blacklist.json".to_string()
}

fn default_tmp_dir() -> String {
    "data/tmp".to_string()
}

fn default_exec_timeout() -> u64 {
    60
}
