//! Configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::catalog::{HOME_PAGE_SIZE, VIEW_PAGE_SIZE};
use crate::player::PlayerSettings;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum ConnectionQuality {
    Fast,
    #[default]
    Normal,
    Slow,
    VerySlow,
    Custom,
}

impl ConnectionQuality {
    pub fn buffer_seconds(&self, custom: u32) -> u32 {
        match self {
            ConnectionQuality::Fast => 2,
            ConnectionQuality::Normal => 5,
            ConnectionQuality::Slow => 15,
            ConnectionQuality::VerySlow => 30,
            ConnectionQuality::Custom => custom,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    // Account
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub auto_login: bool,
    // Player
    #[serde(default)]
    pub external_player: String,
    #[serde(default = "default_buffer")]
    pub buffer_seconds: u32,
    #[serde(default)]
    pub connection_quality: ConnectionQuality,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_true")]
    pub pass_user_agent_to_player: bool,
    // Catalog
    #[serde(default = "default_home_page_size")]
    pub home_page_size: usize,
    #[serde(default = "default_view_page_size")]
    pub view_page_size: usize,
    #[serde(default = "default_load_more_delay")]
    pub load_more_delay_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub dark_mode: bool,
}

fn default_buffer() -> u32 { 5 }
fn default_true() -> bool { true }
fn default_home_page_size() -> usize { HOME_PAGE_SIZE }
fn default_view_page_size() -> usize { VIEW_PAGE_SIZE }
fn default_load_more_delay() -> u64 { 500 }
fn default_request_timeout() -> u64 { 30 }
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            username: String::new(),
            password: String::new(),
            auto_login: false,
            external_player: String::new(),
            buffer_seconds: 5,
            connection_quality: ConnectionQuality::Normal,
            user_agent: default_user_agent(),
            pass_user_agent_to_player: true,
            home_page_size: HOME_PAGE_SIZE,
            view_page_size: VIEW_PAGE_SIZE,
            load_more_delay_ms: 500,
            request_timeout_secs: 30,
            dark_mode: true,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("xtream_vod");
        path.push("config.json");
        path
    }

    /// Load from `path`. A missing or unreadable file yields the defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("ignoring malformed config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                log::warn!("cannot read config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn load() -> Self {
        Self::load_from(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
    }

    pub fn has_credentials(&self) -> bool {
        !self.server.trim().is_empty() && !self.username.is_empty()
    }

    pub fn player_settings(&self) -> PlayerSettings {
        PlayerSettings {
            command: self.external_player.clone(),
            user_agent: self.user_agent.clone(),
            pass_user_agent: self.pass_user_agent_to_player,
            buffer_seconds: self.connection_quality.buffer_seconds(self.buffer_seconds),
        }
    }
}
