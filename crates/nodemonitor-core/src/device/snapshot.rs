//! Last-known device state

use serde::{Deserialize, Serialize};

use super::{FieldEvent, FieldName, SettingsRecord, TelemetryRecord};

/// A finalized piece of device state produced by the response classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceUpdate {
    /// Firmware version string (raw line, e.g. `V2.0`)
    Version(String),
    /// A complete settings record
    Settings(SettingsRecord),
    /// Temperature calibration offset; `None` when the firmware lacks the query
    TcalOffset(Option<String>),
    /// Status telemetry
    Telemetry(TelemetryRecord),
}

/// Mirror of the controller's state
///
/// Every field starts unknown and is mutated in place as responses arrive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    /// Firmware version line
    pub software_version: Option<String>,
    /// Last complete settings record
    pub settings: Option<SettingsRecord>,
    /// Temperature calibration offset
    pub tcal_offset: Option<String>,
    /// Last status poll
    pub telemetry: Option<TelemetryRecord>,
}

impl DeviceSnapshot {
    /// Create a snapshot with every field unknown
    pub fn new() -> Self {
        Self::default()
    }

    /// True if any field holds a known value
    pub fn is_known(&self) -> bool {
        self.software_version.is_some()
            || self.settings.is_some()
            || self.tcal_offset.is_some()
            || self.telemetry.is_some()
    }

    /// Apply an update and return the notifications it produces
    pub fn apply(&mut self, update: DeviceUpdate) -> Vec<FieldEvent> {
        match update {
            DeviceUpdate::Version(version) => {
                self.software_version = Some(version);
                self.version_events()
            }
            DeviceUpdate::Settings(settings) => {
                self.settings = Some(settings);
                self.settings_events()
            }
            DeviceUpdate::TcalOffset(offset) => {
                self.tcal_offset = offset;
                self.tcal_events()
            }
            DeviceUpdate::Telemetry(telemetry) => {
                // A field the new line omits but the last one carried reads as unknown
                let previous = self.telemetry.as_ref();
                let events = FieldName::TELEMETRY
                    .into_iter()
                    .filter_map(|name| match telemetry.get(name) {
                        Some(value) => Some(FieldEvent::new(name, Some(value))),
                        None if previous.and_then(|t| t.get(name)).is_some() => {
                            Some(FieldEvent::new(name, None))
                        }
                        None => None,
                    })
                    .collect();
                self.telemetry = Some(telemetry);
                events
            }
        }
    }

    /// Reset every field to unknown
    ///
    /// Returns the notifications announcing the reset, or nothing if the
    /// snapshot was already unknown.
    pub fn invalidate(&mut self) -> Vec<FieldEvent> {
        if !self.is_known() {
            return Vec::new();
        }
        *self = Self::default();
        self.all_events()
    }

    /// Notifications for the entire snapshot, unknowns as placeholders
    pub fn all_events(&self) -> Vec<FieldEvent> {
        let mut events = self.version_events();
        events.extend(self.settings_events());
        events.extend(self.tcal_events());
        events.extend(FieldName::TELEMETRY.into_iter().map(|name| {
            let value = self.telemetry.as_ref().and_then(|t| t.get(name));
            FieldEvent::new(name, value)
        }));
        events
    }

    fn version_events(&self) -> Vec<FieldEvent> {
        vec![FieldEvent::new(
            FieldName::SoftwareVersion,
            self.software_version.as_deref(),
        )]
    }

    fn settings_events(&self) -> Vec<FieldEvent> {
        FieldName::SETTINGS
            .into_iter()
            .map(|name| {
                let value = self.settings.as_ref().and_then(|s| s.get(name));
                FieldEvent::new(name, value)
            })
            .collect()
    }

    fn tcal_events(&self) -> Vec<FieldEvent> {
        vec![FieldEvent::new(FieldName::TcalOffset, self.tcal_offset.as_deref())]
    }
}
