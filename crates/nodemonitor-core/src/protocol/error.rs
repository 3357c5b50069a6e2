//! Protocol errors

use thiserror::Error;

/// Errors that can occur on the serial link or around it
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Serial driver failure
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// Named port does not exist
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// The link reached end of stream or the monitor stopped
    #[error("Link closed by peer")]
    LinkClosed,

    /// A child process could not be started
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        /// Executable that failed
        program: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Other I/O failure
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Reasons a response line is rejected by the classifier
///
/// Every variant is recoverable: the in-flight command is re-sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    /// JSON settings line without a closing brace
    #[error("settings line is not terminated by '}}': {0}")]
    UnterminatedSettings(String),

    /// JSON settings line that does not parse
    #[error("settings line is not valid JSON: {0}")]
    MalformedSettings(String),

    /// Status line with too few tokens
    #[error("status line has {0} fields, expected at least 6")]
    TruncatedStatus(usize),

    /// Calibration line without a value
    #[error("calibration line carries no offset: {0}")]
    MissingOffset(String),

    /// Legacy settings field with no open block
    #[error("settings field outside of a settings block: {0}")]
    StraySettingsField(String),

    /// Legacy `}` with no open block
    #[error("settings close without a settings block")]
    StraySettingsClose,

    /// Firmware answered `unrecognized command` to a command it must support
    #[error("device does not recognize command '{0}'")]
    UnsupportedCommand(String),

    /// Line that matches no known response shape
    #[error("unrecognized response: {0}")]
    Unrecognized(String),
}
