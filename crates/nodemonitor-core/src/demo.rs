//! Demo Mode - Simulated controller for testing
//!
//! Answers the console dialect the way LightingUPS firmware does, so the
//! monitor can run without hardware. Telemetry jitters a little on every
//! status poll.

use futures::StreamExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::FramedRead;
use tracing::debug;

use crate::device::SettingsRecord;
use crate::protocol::LineFramer;

/// Reply used by firmware that does not know a command
const UNRECOGNIZED: &str = "unrecognized command";

/// Firmware generation to imitate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// JSON settings, `ver` and `get tcaloffset` supported, temperature in status
    Current,
    /// Field-by-field settings, no version or calibration query, no temperature
    Legacy,
}

/// Simulated controller
pub struct SimulatedDevice {
    dialect: Dialect,
    settings: SettingsRecord,
    tcal_offset: i16,
    battery_voltage: f64,
    leds_on: bool,
    rng: StdRng,
}

impl SimulatedDevice {
    /// Create a device with random telemetry
    pub fn new(dialect: Dialect) -> Self {
        Self::with_rng(dialect, StdRng::from_entropy())
    }

    /// Create a device with reproducible telemetry
    pub fn with_seed(dialect: Dialect, seed: u64) -> Self {
        Self::with_rng(dialect, StdRng::seed_from_u64(seed))
    }

    fn with_rng(dialect: Dialect, rng: StdRng) -> Self {
        Self {
            dialect,
            settings: SettingsRecord {
                id: "1".to_string(),
                mode: "P".to_string(),
                dark: "40".to_string(),
                auto: "300".to_string(),
                manual: "600".to_string(),
            },
            tcal_offset: 0,
            battery_voltage: 3.70,
            leds_on: false,
            rng,
        }
    }

    /// Current settings
    pub fn settings(&self) -> &SettingsRecord {
        &self.settings
    }

    /// Current temperature calibration offset
    pub fn tcal_offset(&self) -> i16 {
        self.tcal_offset
    }

    /// Lines the firmware prints in reply to `command`
    pub fn respond(&mut self, command: &str) -> Vec<String> {
        let tokens: Vec<&str> = command.split_whitespace().collect();
        let Some(first) = tokens.first() else {
            return vec!["OK".to_string()];
        };

        match (first.to_ascii_lowercase().as_str(), &tokens[1..]) {
            ("ver", []) => match self.dialect {
                Dialect::Current => vec!["V2.0".to_string()],
                Dialect::Legacy => vec![UNRECOGNIZED.to_string()],
            },
            ("settings", []) => self.settings_lines(),
            ("get", [field]) if field.eq_ignore_ascii_case("tcaloffset") => match self.dialect {
                Dialect::Current => vec![format!("tCalOffset: {}", self.tcal_offset)],
                Dialect::Legacy => vec![UNRECOGNIZED.to_string()],
            },
            ("status", []) => vec![self.status_line()],
            ("set", [field, value]) => vec![self.set(field, value).to_string()],
            ("leds", [state]) => {
                let reply = match state.to_ascii_lowercase().as_str() {
                    "on" => {
                        self.leds_on = true;
                        "OK"
                    }
                    "off" => {
                        self.leds_on = false;
                        "OK"
                    }
                    _ => "ERROR",
                };
                vec![reply.to_string()]
            }
            _ => match self.dialect {
                Dialect::Current => vec!["ERROR".to_string()],
                Dialect::Legacy => vec![UNRECOGNIZED.to_string()],
            },
        }
    }

    fn settings_lines(&self) -> Vec<String> {
        let s = &self.settings;
        match self.dialect {
            Dialect::Current => vec![format!(
                r#"{{"ID":{},"Mode":"{}","Dark":{},"Auto":{},"Manual":{}}}"#,
                s.id, s.mode, s.dark, s.auto, s.manual
            )],
            Dialect::Legacy => vec![
                "{".to_string(),
                format!(" ID: {}", s.id),
                format!(" Mode: {}", s.mode),
                format!(" Dark: {}", s.dark),
                format!(" Auto: {}", s.auto),
                format!(" Manual: {}", s.manual),
                "}".to_string(),
            ],
        }
    }

    fn status_line(&mut self) -> String {
        self.battery_voltage =
            (self.battery_voltage + self.rng.gen_range(-0.02..0.02)).clamp(3.3, 4.2);
        let light = self.rng.gen_range(0..=1);
        let motion = u8::from(self.rng.gen_bool(0.1));
        let mut line = format!(
            "U {:.2} 1 {} {} {}",
            self.battery_voltage,
            u8::from(self.leds_on),
            light,
            motion
        );
        if self.dialect == Dialect::Current {
            let temperature = 21.0 + self.rng.gen_range(-0.5..0.5) + f64::from(self.tcal_offset) / 10.0;
            line.push_str(&format!(" {:.1}", temperature));
        }
        line
    }

    fn set(&mut self, field: &str, value: &str) -> &'static str {
        if field.eq_ignore_ascii_case("tcaloffset") {
            if self.dialect == Dialect::Legacy {
                return "ERROR";
            }
            return match value.parse() {
                Ok(offset) => {
                    self.tcal_offset = offset;
                    "OK"
                }
                Err(_) => "ERROR",
            };
        }
        if self.settings.set_by_label(field, value) {
            "OK"
        } else {
            "ERROR"
        }
    }

    /// Serve the console over a byte stream until the peer goes away
    pub async fn serve<S>(mut self, stream: S) -> std::io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut commands = FramedRead::new(reader, LineFramer::new());
        while let Some(command) = commands.next().await {
            let command = command?;
            debug!("demo device got '{}'", command);
            for line in self.respond(&command) {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\r\n").await?;
            }
            writer.flush().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_current_dialect() {
        let mut device = SimulatedDevice::with_seed(Dialect::Current, 7);
        assert_eq!(device.respond("ver"), vec!["V2.0"]);
        assert_eq!(
            device.respond("settings"),
            vec![r#"{"ID":1,"Mode":"P","Dark":40,"Auto":300,"Manual":600}"#]
        );
        assert_eq!(device.respond("get tcaloffset"), vec!["tCalOffset: 0"]);
        assert_eq!(device.respond("bogus"), vec!["ERROR"]);
        let status = device.respond("status");
        assert_eq!(status[0].split_whitespace().count(), 7);
    }

    #[test]
    fn test_legacy_dialect() {
        let mut device = SimulatedDevice::with_seed(Dialect::Legacy, 7);
        assert_eq!(device.respond("ver"), vec![UNRECOGNIZED]);
        assert_eq!(device.respond("settings").len(), 7);
        assert_eq!(device.respond("get tcaloffset"), vec![UNRECOGNIZED]);
        let status = device.respond("status");
        assert_eq!(status[0].split_whitespace().count(), 6);
    }

    #[test]
    fn test_set_commands() {
        let mut device = SimulatedDevice::with_seed(Dialect::Current, 7);
        assert_eq!(device.respond("set mode B"), vec!["OK"]);
        assert_eq!(device.respond("set tcaloffset -4"), vec!["OK"]);
        assert_eq!(device.respond("set colour red"), vec!["ERROR"]);
        assert_eq!(device.settings().mode, "B");
        assert_eq!(device.tcal_offset(), -4);
    }
}
