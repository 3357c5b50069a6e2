//! Protocol commands
//!
//! Defines the text directives understood by the controller console.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::LINE_TERMINATOR;

/// Query firmware version
pub const VERSION: &str = "ver";
/// Query the settings record
pub const SETTINGS: &str = "settings";
/// Query the temperature calibration offset
pub const GET_TCAL_OFFSET: &str = "get tcaloffset";
/// Query status telemetry
pub const STATUS: &str = "status";

/// A console command, sent as plain text terminated by a carriage return
///
/// The queue treats commands as opaque; their meaning only matters to the
/// response classifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Command(String);

impl Command {
    /// Create a command from raw text
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// `ver`
    pub fn version() -> Self {
        Self::new(VERSION)
    }

    /// `settings`
    pub fn settings() -> Self {
        Self::new(SETTINGS)
    }

    /// `get tcaloffset`
    pub fn get_tcal_offset() -> Self {
        Self::new(GET_TCAL_OFFSET)
    }

    /// `status`
    pub fn status() -> Self {
        Self::new(STATUS)
    }

    /// `set <field> <value>`
    pub fn set(field: &str, value: &str) -> Self {
        Self(format!("set {} {}", field, value))
    }

    /// The resynchronization bundle: full re-query of identity and state
    pub fn info_bundle() -> [Command; 4] {
        [
            Self::version(),
            Self::settings(),
            Self::get_tcal_offset(),
            Self::status(),
        ]
    }

    /// Command text without terminator
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if this command is the given directive (case-insensitive, like the firmware)
    pub fn is(&self, directive: &str) -> bool {
        self.0.trim().eq_ignore_ascii_case(directive)
    }

    /// Convert command to bytes, appending the carriage return terminator
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.0.len() + 1);
        bytes.extend_from_slice(self.0.as_bytes());
        bytes.push(LINE_TERMINATOR);
        bytes
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Command {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}
