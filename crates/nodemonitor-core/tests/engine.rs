use nodemonitor_core::device::{FieldEvent, FieldName, UNKNOWN};
use nodemonitor_core::engine::{Effect, Engine, Mode, UiCommand};
use nodemonitor_core::protocol::{Command, LineFramer};
use pretty_assertions::assert_eq;

const SETTINGS_JSON: &str = r#"{"ID":"A1","Mode":"Auto","Dark":40,"Auto":300,"Manual":600}"#;

fn events(effects: &[Effect]) -> Vec<(String, String)> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Notify(FieldEvent { name, value }) => Some((name.to_string(), value.clone())),
            _ => None,
        })
        .collect()
}

fn transmitted(effects: &[Effect]) -> Vec<String> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Transmit(c) => Some(c.to_string()),
            _ => None,
        })
        .collect()
}

fn queued(engine: &Engine) -> Vec<String> {
    engine.queue().iter().map(|c| c.to_string()).collect()
}

/// Engine that has completed the startup bundle and is polling status
fn synchronized() -> Engine {
    let mut engine = Engine::new();
    engine.start();
    engine.handle_line("V2.0");
    engine.handle_line(SETTINGS_JSON);
    engine.handle_line("tCalOffset: 3");
    engine.handle_line("U 3.70 1 0 1 0 21.4");
    assert_eq!(queued(&engine), vec!["status"]);
    engine
}

#[test]
fn test_status_line_end_to_end() {
    let mut engine = synchronized();
    let effects = engine.handle_line("U 3.70 1 0 1 0 21.4");
    assert_eq!(
        events(&effects),
        vec![
            ("BV".to_string(), "3.70".to_string()),
            ("AC".to_string(), "1".to_string()),
            ("C".to_string(), "0".to_string()),
            ("Light".to_string(), "1".to_string()),
            ("Motion".to_string(), "0".to_string()),
            ("Temp".to_string(), "21.4".to_string()),
        ]
    );
    // the status command was dequeued and the standing poll re-queued
    assert_eq!(transmitted(&effects), vec!["status"]);
    assert_eq!(engine.queue().len(), 1);
}

#[test]
fn test_version_line_end_to_end() {
    let mut engine = Engine::new();
    engine.start();
    assert_eq!(engine.in_flight(), Some(&Command::version()));
    let effects = engine.handle_line("V1.2");
    assert_eq!(events(&effects), vec![("swver".to_string(), "V1.2".to_string())]);
    assert_eq!(engine.snapshot().software_version.as_deref(), Some("V1.2"));
    assert_eq!(queued(&engine), vec!["settings", "get tcaloffset", "status"]);
}

#[test]
fn test_queue_length_only_shrinks_on_accepted_final() {
    let mut engine = Engine::new();
    engine.start();
    assert_eq!(engine.queue().len(), 4);

    engine.handle_line("garbage");
    assert_eq!(engine.queue().len(), 4);
    engine.handle_line("V2.0");
    assert_eq!(engine.queue().len(), 3);

    engine.handle_line("{");
    engine.handle_line(" ID: 9");
    assert_eq!(engine.queue().len(), 3);
    engine.handle_line("}");
    assert_eq!(engine.queue().len(), 2);
}

#[test]
fn test_single_command_in_flight() {
    let mut engine = Engine::new();
    let mut effects = engine.start();
    effects.extend(engine.handle_ui(UiCommand::Device(Command::new("leds on"))));
    effects.extend(engine.handle_ui(UiCommand::Device(Command::new("leds off"))));
    assert_eq!(transmitted(&effects), vec!["ver"]);
}

#[test]
fn test_timeout_preserves_queue_order() {
    let mut engine = synchronized();
    engine.handle_line("U 3.70 1 0 1 0 21.4");
    engine.handle_ui(UiCommand::Device(Command::set("dark", "30")));
    engine.handle_ui(UiCommand::Device(Command::set("auto", "120")));
    let before = queued(&engine);
    assert_eq!(before, vec!["status", "set dark 30", "set auto 120"]);

    let effects = engine.handle_timeout();
    assert_eq!(transmitted(&effects), vec!["status"]);
    assert_eq!(queued(&engine), before);
}

#[test]
fn test_timeout_resync_invalidates_snapshot() {
    let mut engine = synchronized();
    let effects = engine.handle_timeout();
    let names: Vec<String> = events(&effects).into_iter().map(|(n, _)| n).collect();
    assert_eq!(
        names,
        vec![
            "swver", "ID", "Mode", "Dark", "Auto", "Manual", "Tcal", "BV", "AC", "C", "Light",
            "Motion", "Temp"
        ]
    );
    assert!(events(&effects).iter().all(|(_, v)| v == UNKNOWN));
    assert_eq!(queued(&engine), vec!["ver", "settings", "get tcaloffset", "status"]);

    // a second timeout does not repeat the notifications
    let effects = engine.handle_timeout();
    assert!(events(&effects).is_empty());
    assert_eq!(transmitted(&effects), vec!["ver"]);
}

#[test]
fn test_legacy_and_json_settings_identical() {
    let mut legacy = Engine::new();
    legacy.start();
    legacy.handle_line("unrecognized command");
    for line in ["{", " ID: x", " Mode: y", " Dark: 1", " Auto: 2", " Manual: 3", "}"] {
        legacy.handle_line(line);
    }

    let mut json = Engine::new();
    json.start();
    json.handle_line("V2.0");
    json.handle_line(r#"{"ID":"x","Mode":"y","Dark":"1","Auto":"2","Manual":"3"}"#);

    assert_eq!(legacy.snapshot().settings, json.snapshot().settings);
    assert_eq!(legacy.snapshot().software_version.as_deref(), Some("V1.0"));
}

#[test]
fn test_partial_legacy_settings_not_pushed() {
    let mut engine = Engine::new();
    engine.start();
    engine.handle_line("V2.0");
    for line in ["{", " ID: x", " Mode: y"] {
        assert!(events(&engine.handle_line(line)).is_empty());
    }
    assert!(engine.snapshot().settings.is_none());
}

#[test]
fn test_offset_line_inside_legacy_block_keeps_settings_in_flight() {
    let mut engine = Engine::new();
    engine.start();
    engine.handle_line("V2.0");
    let mut sent = Vec::new();
    for line in ["{", " ID: 7", " offset: 2", " Mode: P"] {
        sent.extend(transmitted(&engine.handle_line(line)));
    }
    assert!(sent.is_empty());
    assert_eq!(engine.in_flight(), Some(&Command::settings()));

    let effects = engine.handle_line("}");
    assert_eq!(transmitted(&effects), vec!["get tcaloffset"]);
    assert_eq!(queued(&engine), vec!["get tcaloffset", "status"]);
    let settings = engine.snapshot().settings.clone().unwrap();
    assert_eq!(settings.id, "7");
    assert_eq!(settings.mode, "P");
}

#[test]
fn test_temperature_missing_from_status_notifies_unknown() {
    let mut engine = synchronized();
    let effects = engine.handle_line("U 3.70 1 0 1 0");
    assert!(events(&effects).contains(&("Temp".to_string(), UNKNOWN.to_string())));
}

#[test]
fn test_reprogram_does_not_interrupt_in_flight() {
    let mut engine = synchronized();
    engine.handle_ui(UiCommand::Device(Command::new("leds on")));
    let effects = engine.handle_ui(UiCommand::Reprogram);
    assert!(effects.is_empty());
    assert_eq!(engine.mode(), Mode::Reprogramming);
    assert!(!engine.is_flashing());

    let effects = engine.handle_line("U 3.70 1 0 1 0 21.4");
    assert_eq!(transmitted(&effects), vec!["leds on"]);
    assert!(!effects.contains(&Effect::StartFlash));

    let effects = engine.handle_line("OK");
    assert_eq!(effects.last(), Some(&Effect::StartFlash));
    assert!(engine.is_flashing());
}

#[test]
fn test_reprogram_cycle_restores_saved_state() {
    let mut engine = synchronized();
    engine.handle_ui(UiCommand::Reprogram);
    engine.handle_line("U 3.70 1 0 1 0 21.4");
    assert!(engine.is_flashing());

    let effects = engine.handle_flash_finished();
    assert_eq!(effects.first(), Some(&Effect::ResetReceiver));
    assert_eq!(engine.mode(), Mode::Monitoring);
    assert_eq!(
        queued(&engine),
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

    // restoration proceeds one acknowledged command at a time
    let effects = engine.handle_line("V2.1");
    assert_eq!(transmitted(&effects), vec!["set id A1"]);
    let effects = engine.handle_line("OK");
    assert_eq!(transmitted(&effects), vec!["set mode Auto"]);
}

#[test]
fn test_reprogram_restore_skips_unsupported_offset() {
    let mut engine = Engine::new();
    engine.start();
    engine.handle_line("V2.0");
    engine.handle_line(SETTINGS_JSON);
    engine.handle_line("unrecognized command");
    assert_eq!(engine.snapshot().tcal_offset, None);
    engine.handle_ui(UiCommand::Reprogram);
    engine.handle_line("U 3.70 1 0 1 0");
    engine.handle_flash_finished();
    assert!(!queued(&engine).iter().any(|c| c.starts_with("set tcaloffset")));
}

#[test]
fn test_refresh_reemits_current_values() {
    let mut engine = synchronized();
    let effects = engine.handle_ui(UiCommand::Refresh);
    let values = events(&effects);
    assert_eq!(values.len(), 13);
    assert_eq!(values[0], ("swver".to_string(), "V2.0".to_string()));
    assert_eq!(values[6], ("Tcal".to_string(), "3".to_string()));
    assert!(transmitted(&effects).is_empty());
}

#[test]
fn test_exiting_is_terminal() {
    let mut engine = synchronized();
    engine.handle_launcher_exit();
    assert!(engine.handle_ui(UiCommand::Device(Command::new("leds on"))).is_empty());
    engine.handle_ui(UiCommand::Reprogram);
    assert_eq!(engine.mode(), Mode::Exiting);
    let effects = engine.handle_line("U 3.70 1 0 1 0 21.4");
    assert_eq!(effects.last(), Some(&Effect::CloseLink));
}

#[test]
fn test_framed_stream_drives_engine() {
    let mut framer = LineFramer::new();
    let mut engine = Engine::new();
    engine.start();
    let mut swver = None;
    let chunks: [&[u8]; 3] = [
        b"V1",
        b".2\r\n{\"ID\":1,\"Mode\":\"P\",",
        b"\"Dark\":4,\"Auto\":5,\"Manual\":6}\r\n",
    ];
    for chunk in chunks {
        for line in framer.push(chunk) {
            for effect in engine.handle_line(&line) {
                if let Effect::Notify(FieldEvent { name: FieldName::SoftwareVersion, value }) = effect {
                    swver = Some(value);
                }
            }
        }
    }
    assert_eq!(swver.as_deref(), Some("V1.2"));
    assert_eq!(engine.snapshot().settings.as_ref().map(|s| s.dark.as_str()), Some("4"));
}
