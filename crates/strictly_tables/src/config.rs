//! Host configuration.
//!
//! Loaded from a TOML file when present, otherwise defaulted, then
//! overridden by `STRICTLY_TABLES_*` environment variables.

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "STRICTLY_TABLES_";

/// Complete host configuration.
#[derive(Debug, Clone, Default, PartialEq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Network binding.
    server: ServerConfig,

    /// Per-session limits.
    session: SessionConfig,

    /// Per-connection operation budget.
    rate_limit: RateLimitConfig,

    /// Identity/stats collaborator settings.
    profiles: ProfilesConfig,

    /// Identities allowed to close any session.
    admins: Vec<String>,
}

/// Network binding.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    host: String,
    /// Port to bind to.
    port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Limits applied to every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Longest accepted chat message, in characters.
    max_chat_length: usize,
    /// Longest accepted player display name, in characters.
    max_display_name_length: usize,
    /// Longest accepted session name, in characters.
    max_session_name_length: usize,
    /// Number of recent chat messages included in each snapshot.
    chat_history_in_snapshot: usize,
    /// Maximum number of live sessions.
    max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_chat_length: 500,
            max_display_name_length: 32,
            max_session_name_length: 64,
            chat_history_in_snapshot: 50,
            max_sessions: 1000,
        }
    }
}

/// Fixed-window operation budget per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Window length in milliseconds.
    window_ms: u64,
    /// Operations allowed per window.
    max_ops: u32,
}

impl RateLimitConfig {
    /// Creates a rate limit configuration.
    pub fn new(window_ms: u64, max_ops: u32) -> Self {
        Self { window_ms, max_ops }
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 1000,
            max_ops: 30,
        }
    }
}

/// Identity/stats collaborator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilesConfig {
    /// Lookup timeout in milliseconds.
    timeout_ms: u64,
}

impl ProfilesConfig {
    /// Lookup timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self { timeout_ms: 250 }
    }
}

impl SessionConfig {
    /// Sets the live session cap.
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    /// Sets the chat length bound.
    pub fn with_max_chat_length(mut self, max_chat_length: usize) -> Self {
        self.max_chat_length = max_chat_length;
        self
    }
}

impl AppConfig {
    /// Loads configuration from TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(admins = config.admins.len(), "Config loaded successfully");
        Ok(config)
    }

    /// Loads the file if given and present, then applies environment overrides.
    ///
    /// A missing file falls back to defaults; an unreadable or malformed
    /// file is an error.
    #[instrument(skip(path))]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            Some(path) => {
                info!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        config.merge_env_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies `STRICTLY_TABLES_*` overrides using `lookup` to read variables.
    ///
    /// Values that fail to parse are ignored with a warning.
    pub fn merge_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            name: &str,
        ) -> Option<T> {
            let key = format!("{}{}", ENV_PREFIX, name);
            let raw = lookup(&key)?;
            match raw.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(key = %key, value = %raw, "Ignoring invalid environment override");
                    None
                }
            }
        }

        if let Some(host) = lookup(&format!("{}HOST", ENV_PREFIX)) {
            self.server.host = host;
        }
        if let Some(port) = parsed(&lookup, "PORT") {
            self.server.port = port;
        }
        if let Some(max_sessions) = parsed(&lookup, "MAX_SESSIONS") {
            self.session.max_sessions = max_sessions;
        }
        if let Some(window_ms) = parsed(&lookup, "RATE_LIMIT_WINDOW_MS") {
            self.rate_limit.window_ms = window_ms;
        }
        if let Some(max_ops) = parsed(&lookup, "RATE_LIMIT_MAX_OPS") {
            self.rate_limit.max_ops = max_ops;
        }
        if let Some(timeout_ms) = parsed(&lookup, "PROFILE_TIMEOUT_MS") {
            self.profiles.timeout_ms = timeout_ms;
        }
    }

    /// Overrides the network binding.
    pub fn with_binding(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        self
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::new(format!("Failed to render config: {}", e)))
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
