// crates/speedfog-config/src/config.rs
// ============================================================================
// Module: SpeedFog Process Configuration
// Description: `SpeedfogConfig` and its validation (SPEC_FULL.md section B).
// Purpose: Load bind address, storage, session-timeout, and monitor
// settings from TOML with an environment-variable path override, then
// validate every field before the process starts serving connections.
// Dependencies: speedfog-core, serde, toml, thiserror
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use speedfog_core::store_sqlite::JournalMode;

const DEFAULT_CONFIG_NAME: &str = "speedfog.toml";
const CONFIG_ENV_VAR: &str = "SPEEDFOG_CONFIG";
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_db_path() -> String {
    "speedfog.sqlite3".to_string()
}

const fn default_auth_timeout_ms() -> u64 {
    5_000
}

const fn default_spectator_grace_ms() -> u64 {
    2_000
}

const fn default_send_timeout_ms() -> u64 {
    5_000
}

const fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

const fn default_sweep_interval_ms() -> u64 {
    60_000
}

const fn default_inactivity_threshold_ms() -> u64 {
    15 * 60 * 1000
}

const fn default_no_show_threshold_ms() -> u64 {
    15 * 60 * 1000
}

/// Top-level process configuration (spec.md section B).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SpeedfogConfig {
    /// HTTP/WebSocket bind settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Per-connection session timeouts.
    #[serde(default)]
    pub session: SessionConfig,
    /// Background monitor cadence and thresholds.
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl SpeedfogConfig {
    /// Loads configuration from `path`, or from the `SPEEDFOG_CONFIG` env
    /// var, or from `speedfog.toml` in the current directory, in that
    /// order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file can't be read, isn't valid
    /// TOML, or fails [`SpeedfogConfig::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every sub-config for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when any field is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.storage.validate()?;
        self.session.validate()?;
        self.monitor.validate()?;
        Ok(())
    }
}

/// HTTP/WebSocket server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address `speedfog-server` binds `axum::serve` to.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("server.bind", &self.bind)?;
        self.bind
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid("server.bind must be a valid socket address".to_string()))?;
        Ok(())
    }

    /// The parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `bind` isn't a valid socket address (only
    /// reachable if `validate` was skipped).
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .parse()
            .map_err(|_| ConfigError::Invalid("server.bind must be a valid socket address".to_string()))
    }
}

/// SQLite storage settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Journal mode to open the database with.
    #[serde(default)]
    pub journal_mode: JournalModeConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { db_path: default_db_path(), journal_mode: JournalModeConfig::default() }
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("storage.db_path", &self.db_path)
    }

    /// The resolved path to the database file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.db_path)
    }

    /// The `speedfog-core` journal mode this config selects.
    #[must_use]
    pub const fn journal_mode(&self) -> JournalMode {
        self.journal_mode.to_core()
    }
}

/// Wire/TOML-facing journal mode selector, mirroring
/// [`speedfog_core::store_sqlite::JournalMode`] with `serde` support (the
/// core enum intentionally carries none, to keep that crate dependency-free
/// of serde's derive for a type with only two variants used here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalModeConfig {
    /// Write-ahead logging.
    #[default]
    Wal,
    /// Classic rollback journal.
    Delete,
}

impl JournalModeConfig {
    const fn to_core(self) -> JournalMode {
        match self {
            Self::Wal => JournalMode::Wal,
            Self::Delete => JournalMode::Delete,
        }
    }
}

/// Per-connection session timeouts (spec.md sections 4.6, 4.7).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SessionConfig {
    /// Mod session auth deadline: OPEN -> AUTHENTICATED (C6).
    #[serde(default = "default_auth_timeout_ms")]
    pub auth_timeout_ms: u64,
    /// Spectator optional-auth grace window (C7).
    #[serde(default = "default_spectator_grace_ms")]
    pub spectator_grace_ms: u64,
    /// Per-send timeout before a slow connection is dropped from a room
    /// broadcast (C2).
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    /// Heartbeat ping cadence.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auth_timeout_ms: default_auth_timeout_ms(),
            spectator_grace_ms: default_spectator_grace_ms(),
            send_timeout_ms: default_send_timeout_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
        }
    }
}

impl SessionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout_range("session.auth_timeout_ms", self.auth_timeout_ms, 100, 60_000)?;
        validate_timeout_range("session.spectator_grace_ms", self.spectator_grace_ms, 0, 60_000)?;
        validate_timeout_range("session.send_timeout_ms", self.send_timeout_ms, 100, 60_000)?;
        validate_timeout_range("session.heartbeat_interval_ms", self.heartbeat_interval_ms, 1_000, 300_000)?;
        Ok(())
    }

    /// `auth_timeout_ms` as a [`std::time::Duration`].
    #[must_use]
    pub const fn auth_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.auth_timeout_ms)
    }

    /// `spectator_grace_ms` as a [`std::time::Duration`].
    #[must_use]
    pub const fn spectator_grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.spectator_grace_ms)
    }

    /// `send_timeout_ms` as a [`std::time::Duration`].
    #[must_use]
    pub const fn send_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.send_timeout_ms)
    }

    /// `heartbeat_interval_ms` as a [`std::time::Duration`].
    #[must_use]
    pub const fn heartbeat_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.heartbeat_interval_ms)
    }
}

/// Background monitor cadence and thresholds (spec.md section 4.10, C10).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MonitorConfig {
    /// How often the sweep runs.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// A PLAYING participant idle longer than this is abandoned.
    #[serde(default = "default_inactivity_threshold_ms")]
    pub inactivity_threshold_ms: u64,
    /// A REGISTERED/READY participant in a race running longer than this
    /// is abandoned as a no-show.
    #[serde(default = "default_no_show_threshold_ms")]
    pub no_show_threshold_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: default_sweep_interval_ms(),
            inactivity_threshold_ms: default_inactivity_threshold_ms(),
            no_show_threshold_ms: default_no_show_threshold_ms(),
        }
    }
}

impl MonitorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout_range("monitor.sweep_interval_ms", self.sweep_interval_ms, 1_000, 3_600_000)?;
        validate_timeout_range(
            "monitor.inactivity_threshold_ms",
            self.inactivity_threshold_ms,
            1_000,
            24 * 3_600_000,
        )?;
        validate_timeout_range(
            "monitor.no_show_threshold_ms",
            self.no_show_threshold_ms,
            1_000,
            24 * 3_600_000,
        )?;
        Ok(())
    }

    /// Converts this into the `speedfog-race` monitor's runtime config
    /// type, which uses [`std::time::Duration`]/[`time::Duration`] rather
    /// than raw millisecond integers.
    #[must_use]
    pub fn to_race_monitor_config(self) -> speedfog_race::MonitorConfig {
        speedfog_race::MonitorConfig {
            sweep_interval: std::time::Duration::from_millis(self.sweep_interval_ms),
            inactivity_threshold: time::Duration::milliseconds(
                i64::try_from(self.inactivity_threshold_ms).unwrap_or(i64::MAX),
            ),
            no_show_threshold: time::Duration::milliseconds(
                i64::try_from(self.no_show_threshold_ms).unwrap_or(i64::MAX),
            ),
        }
    }
}

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let path = Path::new(trimmed);
    for component in path.components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

fn validate_timeout_range(field: &str, value_ms: u64, min_ms: u64, max_ms: u64) -> Result<(), ConfigError> {
    if value_ms < min_ms || value_ms > max_ms {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {min_ms} and {max_ms} milliseconds",
        )));
    }
    Ok(())
}
