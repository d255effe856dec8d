// Local configuration for the daemon.
//
// Global config: `~/.anggar/config.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use anggar_common::types::Surcharges;

/// Root directory for anggar global state: `~/.anggar/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".anggar"))
}

/// Path to the global config file: `~/.anggar/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

// ── Global config ──────────────────────────────────────────────────

/// Global daemon configuration at `~/.anggar/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[derive(Default)]
pub struct GlobalConfig {
    /// Price-assistant service settings.
    pub ai: AiConfig,
    /// Defaults applied when creating documents and work items.
    pub defaults: DefaultsConfig,
}


impl GlobalConfig {
    /// Load from `~/.anggar/config.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        global_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to `~/.anggar/config.toml`.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = global_config_path().ok_or_else(|| {
            ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine home directory",
            ))
        })?;
        self.save_to(&path)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Price-assistant service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AiConfig {
    /// Assistant base URL (e.g. `http://127.0.0.1:8787`). Unset disables
    /// automatic breakdown generation.
    pub endpoint: Option<String>,
    /// Model name forwarded to the assistant service.
    pub model: Option<String>,
    /// Per-request timeout in seconds. A hung request must never leave a
    /// row stuck in its loading state.
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self { endpoint: None, model: None, timeout_secs: 30 }
    }
}

/// Defaults for newly created rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[derive(Default)]
pub struct DefaultsConfig {
    /// Surcharge percentages stamped onto new work items.
    pub surcharges: Surcharges,
}


// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
