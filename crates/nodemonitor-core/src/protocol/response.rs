//! Response classification
//!
//! Parses one complete line from the controller into a [`Verdict`] for the
//! in-flight command. Dispatch is on the leading character, in this order:
//!
//! | Lead            | Meaning                                  | Verdict          |
//! |-----------------|------------------------------------------|------------------|
//! | `O`             | acknowledgement (`OK`)                   | final            |
//! | `U`             | status telemetry                         | final            |
//! | `V`             | firmware version                         | final            |
//! | `{`             | JSON settings, or legacy block when alone| final / partial  |
//! | whitespace      | legacy `Name: Value` settings field      | partial (`offset:` final) |
//! | `}` alone       | legacy settings block close              | final            |
//! | `t`             | temperature calibration offset           | final            |
//! | `u`             | unrecognized-command marker              | depends on command |
//! | anything else   | transport error                          | rejected         |

use tracing::{debug, warn};

use super::command::{GET_TCAL_OFFSET, VERSION};
use super::{Command, ResponseError};
use crate::device::{DeviceUpdate, SettingsRecord, TelemetryRecord};

/// Version reported for firmware that predates the `ver` command
pub const LEGACY_VERSION: &str = "V1.0";

/// Label of the legacy calibration field, answered to `get tcaloffset`
const LEGACY_OFFSET_LABEL: &str = "offset";

/// Minimum whitespace-separated tokens in a status line (marker + 5 fields)
const STATUS_MIN_TOKENS: usize = 6;

/// Outcome of classifying one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The exchange for the in-flight command is complete and accepted
    Final(Option<DeviceUpdate>),
    /// More lines belong to the same response
    Partial,
    /// The line cannot be accepted; the in-flight command must be re-sent
    Rejected(ResponseError),
}

impl Verdict {
    /// True if the response completes the exchange successfully
    pub fn is_final(&self) -> bool {
        matches!(self, Verdict::Final(_))
    }
}

/// Stateful classifier; carries a legacy settings block across lines
#[derive(Debug, Default)]
pub struct ResponseClassifier {
    legacy_settings: Option<SettingsRecord>,
}

impl ResponseClassifier {
    /// Create a classifier with no block in progress
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a legacy multi-line settings block is being received
    pub fn in_settings_block(&self) -> bool {
        self.legacy_settings.is_some()
    }

    /// Drop any partially received legacy settings block
    pub fn reset(&mut self) {
        self.legacy_settings = None;
    }

    /// Classify a complete, non-empty line
    pub fn classify(&mut self, line: &str, in_flight: Option<&Command>) -> Verdict {
        let Some(lead) = line.chars().next() else {
            return Verdict::Final(None);
        };

        let block_line = lead == '{' || lead == '}' || lead.is_whitespace();
        let verdict = match lead {
            'O' => Verdict::Final(None),
            'U' => Self::status(line),
            'V' => {
                debug!("sw version: {}", line);
                Verdict::Final(Some(DeviceUpdate::Version(line.to_string())))
            }
            '{' => self.settings_open(line),
            c if c.is_whitespace() => self.settings_field(line),
            '}' if line.trim_end() == "}" => self.settings_close(),
            't' => Self::tcal_offset(line),
            'u' => Self::unsupported(line, in_flight),
            _ => Verdict::Rejected(ResponseError::Unrecognized(line.to_string())),
        };

        if !block_line && verdict.is_final() && self.legacy_settings.take().is_some() {
            warn!("legacy settings block abandoned by '{}'", line);
        }
        verdict
    }

    fn status(line: &str) -> Verdict {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < STATUS_MIN_TOKENS {
            return Verdict::Rejected(ResponseError::TruncatedStatus(tokens.len()));
        }
        let telemetry = TelemetryRecord {
            battery_voltage: tokens[1].to_string(),
            ac_present: tokens[2].to_string(),
            charging: tokens[3].to_string(),
            light: tokens[4].to_string(),
            motion: tokens[5].to_string(),
            temperature: tokens.get(6).map(|t| t.to_string()),
        };
        Verdict::Final(Some(DeviceUpdate::Telemetry(telemetry)))
    }

    fn settings_open(&mut self, line: &str) -> Verdict {
        if line.trim_end() == "{" {
            debug!("legacy settings block started");
            self.legacy_settings = Some(SettingsRecord::default());
            return Verdict::Partial;
        }
        if !line.trim_end().ends_with('}') {
            return Verdict::Rejected(ResponseError::UnterminatedSettings(line.to_string()));
        }
        match SettingsRecord::from_json(line) {
            Ok(settings) => {
                debug!("got settings: {:?}", settings);
                self.legacy_settings = None;
                Verdict::Final(Some(DeviceUpdate::Settings(settings)))
            }
            Err(e) => Verdict::Rejected(ResponseError::MalformedSettings(e.to_string())),
        }
    }

    fn settings_field(&mut self, line: &str) -> Verdict {
        let mut tokens = line.split_whitespace();
        let label = tokens.next().unwrap_or_default().trim_end_matches(':');
        let value = tokens.collect::<Vec<_>>().join(" ");
        if label.is_empty() || value.is_empty() {
            return Verdict::Rejected(ResponseError::Unrecognized(line.to_string()));
        }

        if label.eq_ignore_ascii_case(LEGACY_OFFSET_LABEL) {
            if self.legacy_settings.is_some() {
                debug!("ignoring offset line inside settings block");
                return Verdict::Partial;
            }
            debug!("temp cal offset {}", value);
            return Verdict::Final(Some(DeviceUpdate::TcalOffset(Some(value))));
        }

        let Some(record) = self.legacy_settings.as_mut() else {
            return Verdict::Rejected(ResponseError::StraySettingsField(line.to_string()));
        };
        if !record.set_by_label(label, &value) {
            warn!("ignoring unknown settings field '{}'", label);
        }
        Verdict::Partial
    }

    fn settings_close(&mut self) -> Verdict {
        match self.legacy_settings.take() {
            Some(settings) => {
                debug!("legacy settings block complete: {:?}", settings);
                Verdict::Final(Some(DeviceUpdate::Settings(settings)))
            }
            None => Verdict::Rejected(ResponseError::StraySettingsClose),
        }
    }

    fn tcal_offset(line: &str) -> Verdict {
        match line.split_whitespace().nth(1) {
            Some(offset) => {
                debug!("temp cal offset {}", offset);
                Verdict::Final(Some(DeviceUpdate::TcalOffset(Some(offset.to_string()))))
            }
            None => Verdict::Rejected(ResponseError::MissingOffset(line.to_string())),
        }
    }

    fn unsupported(line: &str, in_flight: Option<&Command>) -> Verdict {
        match in_flight {
            Some(cmd) if cmd.is(VERSION) => {
                debug!("no version support, assuming legacy firmware");
                Verdict::Final(Some(DeviceUpdate::Version(LEGACY_VERSION.to_string())))
            }
            Some(cmd) if cmd.is(GET_TCAL_OFFSET) => {
                debug!("no calibration offset support");
                Verdict::Final(Some(DeviceUpdate::TcalOffset(None)))
            }
            Some(cmd) => Verdict::Rejected(ResponseError::UnsupportedCommand(cmd.to_string())),
            None => Verdict::Rejected(ResponseError::Unrecognized(line.to_string())),
        }
    }
}
