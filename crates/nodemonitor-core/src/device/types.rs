//! Device data types

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Placeholder rendered for any value the monitor does not currently know
pub const UNKNOWN: &str = "-";

/// Named values pushed to the UI
///
/// Declaration order is the order notifications are emitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldName {
    #[serde(rename = "swver")]
    SoftwareVersion,
    #[serde(rename = "ID")]
    Id,
    #[serde(rename = "Mode")]
    Mode,
    #[serde(rename = "Dark")]
    Dark,
    #[serde(rename = "Auto")]
    Auto,
    #[serde(rename = "Manual")]
    Manual,
    #[serde(rename = "Tcal")]
    TcalOffset,
    #[serde(rename = "BV")]
    BatteryVoltage,
    #[serde(rename = "AC")]
    AcPresent,
    #[serde(rename = "C")]
    Charging,
    #[serde(rename = "Light")]
    Light,
    #[serde(rename = "Motion")]
    Motion,
    #[serde(rename = "Temp")]
    Temperature,
}

impl FieldName {
    /// Settings fields in legacy enumeration order
    pub const SETTINGS: [FieldName; 5] = [
        FieldName::Id,
        FieldName::Mode,
        FieldName::Dark,
        FieldName::Auto,
        FieldName::Manual,
    ];

    /// Telemetry fields in status-line order
    pub const TELEMETRY: [FieldName; 6] = [
        FieldName::BatteryVoltage,
        FieldName::AcPresent,
        FieldName::Charging,
        FieldName::Light,
        FieldName::Motion,
        FieldName::Temperature,
    ];

    /// Name as seen by the UI
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::SoftwareVersion => "swver",
            FieldName::Id => "ID",
            FieldName::Mode => "Mode",
            FieldName::Dark => "Dark",
            FieldName::Auto => "Auto",
            FieldName::Manual => "Manual",
            FieldName::TcalOffset => "Tcal",
            FieldName::BatteryVoltage => "BV",
            FieldName::AcPresent => "AC",
            FieldName::Charging => "C",
            FieldName::Light => "Light",
            FieldName::Motion => "Motion",
            FieldName::Temperature => "Temp",
        }
    }

    /// Key used by the firmware's `set` command, for writable fields
    pub fn set_key(&self) -> Option<&'static str> {
        match self {
            FieldName::Id => Some("id"),
            FieldName::Mode => Some("mode"),
            FieldName::Dark => Some("dark"),
            FieldName::Auto => Some("auto"),
            FieldName::Manual => Some("manual"),
            FieldName::TcalOffset => Some("tcaloffset"),
            _ => None,
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single named-value change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEvent {
    /// Which field changed
    pub name: FieldName,
    /// New value, or `-` when unknown
    pub value: String,
}

impl FieldEvent {
    /// Build an event, rendering `None` as the unknown placeholder
    pub fn new(name: FieldName, value: Option<&str>) -> Self {
        let value = match value {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => UNKNOWN.to_string(),
        };
        Self { name, value }
    }

    /// Envelope used by browser clients: `{"type":"event","data":{..}}`
    pub fn to_envelope(&self) -> serde_json::Value {
        serde_json::json!({ "type": "event", "data": self })
    }
}

/// The controller's persistent configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsRecord {
    /// Node id
    #[serde(rename = "ID", deserialize_with = "string_or_number")]
    pub id: String,
    /// Operating mode
    #[serde(rename = "Mode", deserialize_with = "string_or_number")]
    pub mode: String,
    /// Darkness threshold
    #[serde(rename = "Dark", deserialize_with = "string_or_number")]
    pub dark: String,
    /// Auto-mode on time
    #[serde(rename = "Auto", deserialize_with = "string_or_number")]
    pub auto: String,
    /// Manual-mode on time
    #[serde(rename = "Manual", deserialize_with = "string_or_number")]
    pub manual: String,
}

impl SettingsRecord {
    /// Parse the single-line JSON form
    pub fn from_json(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Value of a settings field
    pub fn get(&self, name: FieldName) -> Option<&str> {
        let value = match name {
            FieldName::Id => &self.id,
            FieldName::Mode => &self.mode,
            FieldName::Dark => &self.dark,
            FieldName::Auto => &self.auto,
            FieldName::Manual => &self.manual,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// Set a field by its legacy label (`ID`, `Mode`, ...), case-insensitive
    ///
    /// Returns false if the label names no settings field.
    pub fn set_by_label(&mut self, label: &str, value: &str) -> bool {
        let slot = match label.to_ascii_lowercase().as_str() {
            "id" => &mut self.id,
            "mode" => &mut self.mode,
            "dark" => &mut self.dark,
            "auto" => &mut self.auto,
            "manual" => &mut self.manual,
            _ => return false,
        };
        *slot = value.to_string();
        true
    }

    /// Fields paired with their names, in legacy enumeration order
    pub fn fields(&self) -> impl Iterator<Item = (FieldName, &str)> + '_ {
        FieldName::SETTINGS
            .into_iter()
            .filter_map(move |name| self.get(name).map(|v| (name, v)))
    }
}

/// Firmware emits numeric settings as bare JSON numbers
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// One status poll's worth of telemetry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Battery voltage
    pub battery_voltage: String,
    /// Mains present flag
    pub ac_present: String,
    /// Charging flag
    pub charging: String,
    /// Light sensor state
    pub light: String,
    /// Motion sensor state
    pub motion: String,
    /// Absent on legacy firmware
    pub temperature: Option<String>,
}

impl TelemetryRecord {
    /// Value of a telemetry field
    pub fn get(&self, name: FieldName) -> Option<&str> {
        match name {
            FieldName::BatteryVoltage => Some(&self.battery_voltage),
            FieldName::AcPresent => Some(&self.ac_present),
            FieldName::Charging => Some(&self.charging),
            FieldName::Light => Some(&self.light),
            FieldName::Motion => Some(&self.motion),
            FieldName::Temperature => self.temperature.as_deref(),
            _ => None,
        }
    }
}
