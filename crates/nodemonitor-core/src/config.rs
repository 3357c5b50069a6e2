//! Monitor configuration
//!
//! Loaded from a JSON file; every field has a default so a partial (or
//! missing) file is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS};

/// Default HTTP port of the UI server
pub const DEFAULT_UI_PORT: u16 = 5401;

/// Errors loading or saving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON for [`MonitorConfig`]
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Config file could not be written
    #[error("failed to write {path}: {source}")]
    Write {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config could not be serialized
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Serial link to the controller
    pub serial: SerialConfig,
    /// Response timeout for every command, in milliseconds
    pub response_timeout_ms: u64,
    /// Firmware flashing tool
    pub flash: FlashConfig,
    /// Browser/UI launcher; its exit shuts the monitor down
    pub launcher: LauncherConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            response_timeout_ms: DEFAULT_TIMEOUT_MS,
            flash: FlashConfig::default(),
            launcher: LauncherConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Load from the default path, or defaults if no file exists
    pub fn load_default() -> Result<Self, ConfigError> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Save to a file, creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Response timeout as a duration
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

/// `<config dir>/nodemonitor/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("nodemonitor").join("config.json"))
}

/// Serial link settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port name, `COM5` or `/dev/ttyUSB0`
    pub port: String,
    /// Line speed
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "COM5".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

/// Flashing tool invocation (avrdude)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlashConfig {
    /// Flashing tool executable
    pub program: String,
    /// Target device profile
    pub part: String,
    /// Programmer interface
    pub programmer: String,
    /// Port the programmer is attached to
    pub port: String,
    /// Intel-hex firmware image
    pub image: PathBuf,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            program: "avrdude".to_string(),
            part: "attiny84".to_string(),
            programmer: "avrispv2".to_string(),
            port: "COM4".to_string(),
            image: PathBuf::from("firmware/default/LightingUPS.hex"),
        }
    }
}

impl FlashConfig {
    /// Fixed argument vector: erase, then write the image
    pub fn args(&self) -> Vec<String> {
        vec![
            "-p".to_string(),
            self.part.clone(),
            "-c".to_string(),
            self.programmer.clone(),
            "-P".to_string(),
            self.port.clone(),
            "-e".to_string(),
            "-U".to_string(),
            format!("flash:w:{}:i", self.image.display()),
        ]
    }
}

/// UI launcher invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Program to run; `None` disables the launcher
    pub program: Option<String>,
    /// Arguments placed before the URL
    pub args: Vec<String>,
    /// Local UI endpoint handed to the launcher
    pub url: String,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            url: format!("http://localhost:{}/", DEFAULT_UI_PORT),
        }
    }
}
