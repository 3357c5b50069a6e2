//! Serial Protocol Communication
//!
//! Implements the line-oriented console dialect spoken by the LightingUPS
//! controller firmware.
//!
//! Supports both the current dialect (single-line JSON settings, temperature
//! in status) and the legacy one (field-by-field settings, no version query).

pub mod command;
mod error;
pub mod framer;
pub mod response;
pub mod serial;

pub use command::Command;
pub use error::{ProtocolError, ResponseError};
pub use framer::LineFramer;
pub use response::{ResponseClassifier, Verdict};
pub use serial::{list_ports, open_port, PortInfo};

/// Default baud rate of the controller's console UART
pub const DEFAULT_BAUD_RATE: u32 = 300;

/// Default timeout for responses in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Line terminator for both directions of the link
pub const LINE_TERMINATOR: u8 = b'\r';
