//! Configuration module for SerialVis-RS
//!
//! This module handles application configuration including:
//! - The TOML configuration file (serial link, collection, recording, plot cadence)
//! - Application state persistence (last used port and recording file)
//! - Runtime plot settings fed to the renderer
//!
//! # Config Location
//!
//! The configuration file lives in the platform-appropriate config directory
//! under `serialvis-rs/config.toml`; application state is kept as JSON in the
//! data directory under `serialvis-rs/app_state.json`.
//!
//! # Example
//!
//! ```ignore
//! use serialvis_rs::config::AppConfig;
//!
//! let config = AppConfig::load_or_default(AppConfig::default_path());
//! config.validate()?;
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{Result, SerialVisError};
use crate::types::UserFields;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application directory name under the platform config/data dirs
pub const APP_ID: &str = "serialvis-rs";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// App state filename
pub const APP_STATE_FILE: &str = "app_state.json";

/// Maximum number of recent ports to remember
pub const MAX_RECENT_PORTS: usize = 10;

/// Baud rates the channel may be opened with
pub const SUPPORTED_BAUD_RATES: [u32; 12] = [
    300, 600, 1200, 2400, 4800, 9600, 14400, 19200, 38400, 57600, 115200, 230400,
];

/// Default baud rate
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default number of initial samples discarded per connection
pub const DEFAULT_WARMUP_SAMPLES: u32 = 100;

/// Default sliding window capacity (samples)
pub const DEFAULT_WINDOW_CAPACITY: usize = 300;

/// Default number of rows per recorded batch
pub const DEFAULT_FLUSH_THRESHOLD: usize = 100;

/// Default interval between flush attempts in milliseconds
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 100;

/// Default interval between snapshot deliveries while plotting
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 50;

// ==================== Directories ====================

/// Get the application config directory path
pub fn app_config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        SerialVisError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            SerialVisError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

// ==================== Baud Rate ====================

/// A baud rate restricted to [`SUPPORTED_BAUD_RATES`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BaudRate(u32);

impl BaudRate {
    /// Validate a raw rate
    pub fn new(rate: u32) -> Result<Self> {
        if SUPPORTED_BAUD_RATES.contains(&rate) {
            Ok(Self(rate))
        } else {
            Err(SerialVisError::Config(format!(
                "Unsupported baud rate {} (expected one of {:?})",
                rate, SUPPORTED_BAUD_RATES
            )))
        }
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl Default for BaudRate {
    fn default() -> Self {
        Self(DEFAULT_BAUD_RATE)
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = SerialVisError;

    fn try_from(rate: u32) -> Result<Self> {
        BaudRate::new(rate)
    }
}

impl From<BaudRate> for u32 {
    fn from(rate: BaudRate) -> u32 {
        rate.0
    }
}

impl std::fmt::Display for BaudRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ==================== Line Terminator ====================

/// Byte sequence that ends one telemetry line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LineTerminator {
    /// `\n`
    #[default]
    #[serde(rename = "LF")]
    Lf,
    /// `\r`
    #[serde(rename = "CR")]
    Cr,
    /// `\r\n`
    #[serde(rename = "CR/LF")]
    CrLf,
}

impl LineTerminator {
    /// The terminator bytes
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            LineTerminator::Lf => b"\n",
            LineTerminator::Cr => b"\r",
            LineTerminator::CrLf => b"\r\n",
        }
    }

    pub fn all() -> &'static [LineTerminator] {
        &[LineTerminator::Lf, LineTerminator::Cr, LineTerminator::CrLf]
    }
}

impl std::fmt::Display for LineTerminator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineTerminator::Lf => write!(f, "LF"),
            LineTerminator::Cr => write!(f, "CR"),
            LineTerminator::CrLf => write!(f, "CR/LF"),
        }
    }
}

impl std::str::FromStr for LineTerminator {
    type Err = SerialVisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LF" => Ok(LineTerminator::Lf),
            "CR" => Ok(LineTerminator::Cr),
            "CR/LF" | "CRLF" => Ok(LineTerminator::CrLf),
            other => Err(SerialVisError::Config(format!(
                "Unknown line terminator {:?} (expected LF, CR or CR/LF)",
                other
            ))),
        }
    }
}

// ==================== Serial Config ====================

/// Serial channel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port identifier (e.g. `/dev/ttyUSB0`, `COM3`)
    pub port: String,

    /// Baud rate
    pub baud_rate: BaudRate,

    /// Line terminator, fixed for the lifetime of a session
    pub terminator: LineTerminator,

    /// How long a single read may block waiting for bytes
    pub read_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: BaudRate::default(),
            terminator: LineTerminator::default(),
            read_timeout_ms: 10,
        }
    }
}

// ==================== Collection Config ====================

/// Data collection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Valid samples discarded after each connect
    pub warmup_samples: u32,

    /// Sliding window capacity in samples
    pub window_capacity: usize,

    /// Idle sleep between event loop iterations in milliseconds
    pub poll_interval_ms: u64,

    /// Interval between statistics reports in milliseconds
    pub stats_interval_ms: u64,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            warmup_samples: DEFAULT_WARMUP_SAMPLES,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            poll_interval_ms: 5,
            stats_interval_ms: 500,
        }
    }
}

// ==================== Recording Config ====================

/// Batch recording configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Default recording file
    pub file_path: Option<PathBuf>,

    /// Rows per batch
    pub flush_threshold: usize,

    /// Interval between flush attempts in milliseconds
    pub flush_interval_ms: u64,

    /// Initial values of the three user fields
    pub user_fields: UserFields,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            file_path: None,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            user_fields: UserFields::default(),
        }
    }
}

// ==================== Plot Config ====================

/// Cadence of snapshot delivery to the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    /// Interval between snapshots while plotting is on, in milliseconds
    pub refresh_interval_ms: u64,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
        }
    }
}

// ==================== App Config ====================

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Serial channel configuration
    pub serial: SerialConfig,

    /// Data collection configuration
    pub collection: CollectionConfig,

    /// Batch recording configuration
    pub recording: RecordingConfig,

    /// Snapshot refresh configuration
    pub plot: PlotConfig,
}

impl AppConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location
    pub fn default_path() -> PathBuf {
        app_config_dir()
            .map(|dir| dir.join(CONFIG_FILE))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
    }

    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SerialVisError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: AppConfig = toml::from_str(&content).map_err(|e| {
            SerialVisError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load a config file, returning defaults if it is missing or unreadable
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config file at {:?}, using defaults", path);
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config file as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SerialVisError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| SerialVisError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            SerialVisError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Check the configuration for values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.collection.window_capacity == 0 {
            errors.push("window_capacity must be at least 1".to_string());
        }
        if self.recording.flush_threshold == 0 {
            errors.push("flush_threshold must be at least 1".to_string());
        }
        if self.recording.flush_threshold > self.collection.window_capacity {
            errors.push(format!(
                "flush_threshold ({}) cannot exceed window_capacity ({})",
                self.recording.flush_threshold, self.collection.window_capacity
            ));
        }
        if self.recording.flush_interval_ms == 0 {
            errors.push("flush_interval_ms must be at least 1".to_string());
        }
        if self.plot.refresh_interval_ms == 0 {
            errors.push("refresh_interval_ms must be at least 1".to_string());
        }
        if !self.recording.user_fields.is_valid() {
            errors.push("user_fields must be finite numbers".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SerialVisError::Config(errors.join("; ")))
        }
    }
}

// ==================== App State ====================

/// Persistent application state
///
/// Remembers the last connection and recording target across runs,
/// separate from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppState {
    /// Version for future migration support
    #[serde(default = "default_app_state_version")]
    pub version: u32,

    /// Recently used ports, most recent first
    #[serde(default)]
    pub recent_ports: Vec<String>,

    /// Last used baud rate
    #[serde(default)]
    pub last_baud_rate: Option<u32>,

    /// Last recording file
    #[serde(default)]
    pub last_recording_path: Option<PathBuf>,
}

fn default_app_state_version() -> u32 {
    1
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            version: 1,
            recent_ports: Vec::new(),
            last_baud_rate: None,
            last_recording_path: None,
        }
    }
}

impl AppState {
    /// Get the path to the app state file
    pub fn path() -> Option<PathBuf> {
        app_data_dir().map(|p| p.join(APP_STATE_FILE))
    }

    /// Load app state from the default location
    pub fn load() -> Result<Self> {
        let path = Self::path().ok_or_else(|| {
            SerialVisError::Config("Could not determine app state path".to_string())
        })?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| SerialVisError::Config(format!("Failed to read app state: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| SerialVisError::Config(format!("Failed to parse app state: {}", e)))
    }

    /// Load app state, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load app state, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save app state to the default location
    pub fn save(&self) -> Result<()> {
        let dir = ensure_app_data_dir()?;
        let path = dir.join(APP_STATE_FILE);

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| SerialVisError::Config(format!("Failed to serialize app state: {}", e)))?;

        std::fs::write(&path, content)
            .map_err(|e| SerialVisError::Config(format!("Failed to write app state: {}", e)))
    }

    /// Record a successful connection
    pub fn remember_connection(&mut self, port: &str, baud_rate: u32) {
        self.recent_ports.retain(|p| p != port);
        self.recent_ports.insert(0, port.to_string());
        self.recent_ports.truncate(MAX_RECENT_PORTS);
        self.last_baud_rate = Some(baud_rate);
    }

    /// Most recently used port
    pub fn last_port(&self) -> Option<&str> {
        self.recent_ports.first().map(|s| s.as_str())
    }
}

// ==================== Tests ====================
