//! Reprogramming orchestration
//!
//! One cycle runs: capture configuration → flash → restore configuration.
//! The flash itself is an external process; this module only tracks which
//! stage the cycle is in and what to replay afterwards.

use tracing::info;

use crate::device::{DeviceSnapshot, FieldName, SettingsRecord};
use crate::protocol::Command;

/// Configuration captured when reprogramming begins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SavedState {
    /// Settings to write back, if they were known
    pub settings: Option<SettingsRecord>,
    /// Calibration offset to write back, if the firmware reported one
    pub tcal_offset: Option<String>,
}

impl SavedState {
    /// Capture settings and calibration offset from the snapshot
    pub fn capture(snapshot: &DeviceSnapshot) -> Self {
        Self {
            settings: snapshot.settings.clone(),
            tcal_offset: snapshot.tcal_offset.clone(),
        }
    }

    /// Commands that restore this state onto freshly flashed firmware,
    /// followed by a full re-query
    pub fn restoration_commands(&self) -> Vec<Command> {
        let mut commands = vec![Command::version()];
        if let Some(settings) = &self.settings {
            commands.extend(settings.fields().filter_map(|(name, value)| {
                name.set_key().map(|key| Command::set(key, value))
            }));
        }
        if let Some(offset) = &self.tcal_offset {
            if let Some(key) = FieldName::TcalOffset.set_key() {
                commands.push(Command::set(key, offset));
            }
        }
        commands.extend([
            Command::settings(),
            Command::get_tcal_offset(),
            Command::status(),
        ]);
        commands
    }
}

/// Tracks the flashing stage of a reprogramming cycle
#[derive(Debug, Default)]
pub struct Orchestrator {
    saved: Option<SavedState>,
}

impl Orchestrator {
    /// Create an idle orchestrator
    pub fn new() -> Self {
        Self::default()
    }

    /// True while the flashing tool is running
    pub fn is_flashing(&self) -> bool {
        self.saved.is_some()
    }

    /// Capture state and enter the flashing stage
    pub fn begin(&mut self, snapshot: &DeviceSnapshot) {
        let saved = SavedState::capture(snapshot);
        info!(
            "reprogramming: saved settings={:?} tcaloffset={:?}",
            saved.settings, saved.tcal_offset
        );
        self.saved = Some(saved);
    }

    /// Leave the flashing stage, handing back the captured state
    pub fn finish(&mut self) -> Option<SavedState> {
        self.saved.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(commands: &[Command]) -> Vec<&str> {
        commands.iter().map(|c| c.as_str()).collect()
    }

    #[test]
    fn test_restore_full_state() {
        let saved = SavedState {
            settings: Some(SettingsRecord {
                id: "A1".into(),
                mode: "Auto".into(),
                dark: "40".into(),
                auto: "300".into(),
                manual: "600".into(),
            }),
            tcal_offset: Some("3".into()),
        };
        assert_eq!(
            texts(&saved.restoration_commands()),
            vec![
                "ver",
                "set id A1",
                "set mode Auto",
                "set dark 40",
                "set auto 300",
                "set manual 600",
                "set tcaloffset 3",
                "settings",
                "get tcaloffset",
                "status",
            ]
        );
    }

    #[test]
    fn test_restore_unknown_state() {
        let saved = SavedState::default();
        assert_eq!(
            texts(&saved.restoration_commands()),
            vec!["ver", "settings", "get tcaloffset", "status"]
        );
    }

    #[test]
    fn test_orchestrator_stages() {
        let mut orchestrator = Orchestrator::new();
        assert!(!orchestrator.is_flashing());
        let mut snapshot = DeviceSnapshot::new();
        snapshot.tcal_offset = Some("-1".into());
        orchestrator.begin(&snapshot);
        assert!(orchestrator.is_flashing());
        let saved = orchestrator.finish().unwrap();
        assert_eq!(saved.tcal_offset.as_deref(), Some("-1"));
        assert!(orchestrator.finish().is_none());
    }
}
