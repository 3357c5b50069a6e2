//! Device state mirror
//!
//! Holds the last-known identity, configuration and telemetry of the
//! attached controller and turns every change into UI notifications.

mod snapshot;
mod types;

pub use snapshot::{DeviceSnapshot, DeviceUpdate};
pub use types::{FieldEvent, FieldName, SettingsRecord, TelemetryRecord, UNKNOWN};
