//! # NodeMonitor Core Library
//!
//! Protocol engine for the NodeMonitor serial bridge.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Line framing and response classification for the controller's console dialect
//! - A single-command-in-flight queue with timeout-driven retry
//! - A live mirror of device state with change notifications for the UI
//! - Reprogramming orchestration around an external flashing tool
//! - A tokio actor that drives all of the above over a serial link
//!
//! ## Example
//!
//! ```rust,ignore
//! use nodemonitor_core::{config::MonitorConfig, protocol::open_port, runtime::Monitor};
//!
//! let config = MonitorConfig::load_default()?;
//! let port = open_port(&config.serial.port, config.serial.baud_rate)?;
//! let (monitor, handle) = Monitor::new(port, &config);
//! let mut events = handle.subscribe();
//! tokio::spawn(monitor.run());
//! while let Ok(event) = events.recv().await {
//!     println!("{} = {}", event.name, event.value);
//! }
//! ```

pub mod config;
pub mod demo;
pub mod device;
pub mod engine;
pub mod process;
pub mod protocol;
pub mod runtime;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::MonitorConfig;
    pub use crate::device::{DeviceSnapshot, FieldEvent, FieldName, SettingsRecord, TelemetryRecord};
    pub use crate::engine::{Effect, Engine, Mode, UiCommand};
    pub use crate::protocol::{Command, LineFramer, ProtocolError, ResponseClassifier, Verdict};
    pub use crate::runtime::{Input, Monitor, MonitorHandle};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
