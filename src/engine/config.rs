// wabot Engine — Bot Configuration
//
// One JSON file, every key optional:
//
//   {
//     "prefix": "!",
//     "selection_ttl_secs": 600,
//     "lookup_timeout_ms": 3000,
//     "max_suggestions": 3,
//     "keyword_replies": true,
//     "commands_path": "/srv/wabot/commands.json",
//     "whatsapp": { "api_url": "http://127.0.0.1:8085", "api_key": "…" }
//   }
//
// Looked up at $WABOT_CONFIG, else <config_dir>/wabot/config.json.

use crate::atoms::constants::{
    DEFAULT_LOOKUP_TIMEOUT, DEFAULT_MAX_SUGGESTIONS, DEFAULT_PREFIX, DEFAULT_SELECTION_TTL,
};
use crate::atoms::error::{EngineError, EngineResult};
use crate::engine::dispatcher::DispatchConfig;
use crate::engine::whatsapp::WhatsAppConfig;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "WABOT_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub prefix: char,
    pub selection_ttl_secs: u64,
    pub lookup_timeout_ms: u64,
    pub max_suggestions: usize,
    /// Canned replies to greetings, thanks, jokes… in plain messages.
    pub keyword_replies: bool,
    /// Command snapshot file; defaults to `commands.json` beside the config.
    pub commands_path: Option<PathBuf>,
    pub whatsapp: WhatsAppConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        BotConfig {
            prefix: DEFAULT_PREFIX,
            selection_ttl_secs: DEFAULT_SELECTION_TTL.as_secs(),
            lookup_timeout_ms: DEFAULT_LOOKUP_TIMEOUT.as_millis() as u64,
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
            keyword_replies: true,
            commands_path: None,
            whatsapp: WhatsAppConfig::default(),
        }
    }
}

fn wabot_dir() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("wabot")
}

impl BotConfig {
    /// `$WABOT_CONFIG`, or the per-user config directory.
    pub fn default_path() -> PathBuf {
        match std::env::var_os(CONFIG_ENV) {
            Some(p) if !p.is_empty() => PathBuf::from(p),
            _ => wabot_dir().join("config.json"),
        }
    }

    /// Read `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> EngineResult<Self> {
        if !path.exists() {
            info!("[config] {} not found, using defaults", path.display());
            return Ok(BotConfig::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: BotConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        info!("[config] Loaded {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.prefix.is_whitespace() || self.prefix.is_alphanumeric() {
            return Err(EngineError::Config(format!(
                "prefix must be a symbol, got '{}'",
                self.prefix
            )));
        }
        if self.selection_ttl_secs == 0 {
            return Err(EngineError::Config("selection_ttl_secs must be positive".into()));
        }
        if self.lookup_timeout_ms == 0 {
            return Err(EngineError::Config("lookup_timeout_ms must be positive".into()));
        }
        self.whatsapp.validate()
    }

    pub fn selection_ttl(&self) -> Duration {
        Duration::from_secs(self.selection_ttl_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig { prefix: self.prefix, lookup_timeout: self.lookup_timeout() }
    }

    /// Where the command snapshot lives.
    pub fn commands_path(&self, config_path: &Path) -> PathBuf {
        if let Some(p) = &self.commands_path {
            return p.clone();
        }
        config_path
            .parent()
            .map(|dir| dir.join("commands.json"))
            .unwrap_or_else(|| wabot_dir().join("commands.json"))
    }
}
