//! Protocol engine
//!
//! Owns the command queue, the device snapshot, the mode and the
//! reprogramming stage. The engine performs no I/O: every handler returns
//! the [`Effect`]s the runtime must carry out, in order.

mod mode;
mod queue;
mod reprogram;

pub use mode::{Mode, ModeMachine};
pub use queue::CommandQueue;
pub use reprogram::{Orchestrator, SavedState};

use tracing::{debug, info, warn};

use crate::device::{DeviceSnapshot, FieldEvent};
use crate::protocol::{Command, ResponseClassifier, Verdict};

/// Side effects requested by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Write the command (CR-terminated) and (re)arm the response timeout
    Transmit(Command),
    /// Disarm the response timeout
    CancelTimeout,
    /// Push a named-value change to the UI
    Notify(FieldEvent),
    /// Discard any partially received line
    ResetReceiver,
    /// Spawn the firmware flashing tool
    StartFlash,
    /// Close the serial link and stop
    CloseLink,
}

/// Commands originating from the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    /// Re-emit the whole snapshot
    Refresh,
    /// Flash new firmware once the queue drains
    Reprogram,
    /// Raw console command, queued verbatim
    Device(Command),
}

impl UiCommand {
    /// Parse a UI message; empty text yields `None`
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        match text {
            "" => None,
            "refresh" => Some(UiCommand::Refresh),
            "reprogram" | "reflash" => Some(UiCommand::Reprogram),
            _ => Some(UiCommand::Device(Command::new(text))),
        }
    }
}

/// The single-actor protocol state machine
#[derive(Debug, Default)]
pub struct Engine {
    queue: CommandQueue,
    snapshot: DeviceSnapshot,
    mode: ModeMachine,
    classifier: ResponseClassifier,
    orchestrator: Orchestrator,
    /// The queue head has been transmitted and awaits a verdict or timeout
    in_flight: bool,
}

impl Engine {
    /// Create an engine in Monitoring with an unknown snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mode
    pub fn mode(&self) -> Mode {
        self.mode.current()
    }

    /// Last-known device state
    pub fn snapshot(&self) -> &DeviceSnapshot {
        &self.snapshot
    }

    /// Pending commands, head first
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// The command awaiting a response, if any
    pub fn in_flight(&self) -> Option<&Command> {
        if self.in_flight {
            self.queue.head()
        } else {
            None
        }
    }

    /// True while the flashing tool runs
    pub fn is_flashing(&self) -> bool {
        self.orchestrator.is_flashing()
    }

    /// Request the full info bundle; called once the link is open
    pub fn start(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.queue.replace(Command::info_bundle());
        self.send_head(&mut effects);
        effects
    }

    /// Handle one complete line from the controller
    pub fn handle_line(&mut self, line: &str) -> Vec<Effect> {
        let mut effects = Vec::new();
        let in_flight = self.in_flight().cloned();
        debug!("rx: {}", line);

        match self.classifier.classify(line, in_flight.as_ref()) {
            Verdict::Partial => {}
            Verdict::Final(update) => {
                if let Some(update) = update {
                    effects.extend(self.snapshot.apply(update).into_iter().map(Effect::Notify));
                }
                if self.in_flight {
                    effects.push(Effect::CancelTimeout);
                    self.in_flight = false;
                    self.queue.pop();
                    self.advance(&mut effects);
                }
            }
            Verdict::Rejected(err) => {
                warn!("rejected response: {}", err);
                self.classifier.reset();
                if self.in_flight {
                    effects.push(Effect::CancelTimeout);
                    self.in_flight = false;
                    if self.mode() == Mode::Exiting {
                        effects.push(Effect::CloseLink);
                    } else {
                        if let Some(head) = self.queue.head() {
                            warn!("retrying {}", head);
                        }
                        self.send_head(&mut effects);
                    }
                }
            }
        }
        effects
    }

    /// Handle expiry of the response timeout
    pub fn handle_timeout(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !self.in_flight {
            return effects;
        }
        self.in_flight = false;
        self.classifier.reset();
        effects.push(Effect::ResetReceiver);

        match self.mode() {
            Mode::Exiting => {
                info!("timeout while exiting, closing link");
                effects.push(Effect::CloseLink);
            }
            Mode::Monitoring => {
                effects.extend(self.snapshot.invalidate().into_iter().map(Effect::Notify));
                if self.queue.is_trivial() {
                    warn!("serial port timeout, resynchronizing");
                    self.queue.replace(Command::info_bundle());
                } else if let Some(head) = self.queue.head() {
                    warn!("serial port timeout, retrying {}", head);
                }
                self.send_head(&mut effects);
            }
            Mode::Reprogramming => {
                if self.queue.is_trivial() {
                    warn!("serial port timeout, starting reprogramming without reply");
                    self.queue.take_all();
                    self.begin_reprogramming(&mut effects);
                } else {
                    if let Some(head) = self.queue.head() {
                        warn!("serial port timeout, retrying {}", head);
                    }
                    self.send_head(&mut effects);
                }
            }
        }
        effects
    }

    /// Handle a command from the UI
    pub fn handle_ui(&mut self, command: UiCommand) -> Vec<Effect> {
        let mut effects = Vec::new();
        match command {
            UiCommand::Refresh => {
                effects.extend(self.snapshot.all_events().into_iter().map(Effect::Notify));
            }
            UiCommand::Reprogram => {
                if !self.mode.request_reprogram() {
                    warn!("reprogram ignored in {:?} mode", self.mode());
                } else if self.is_idle() {
                    self.begin_reprogramming(&mut effects);
                }
            }
            UiCommand::Device(command) => {
                if self.mode() == Mode::Exiting {
                    warn!("dropping unit command '{}' while exiting", command);
                    return effects;
                }
                info!("got unit command from client: {}", command);
                self.queue.push(command);
                if self.is_idle() {
                    self.send_head(&mut effects);
                }
            }
        }
        effects
    }

    /// Handle the flashing tool's exit, whatever its status
    pub fn handle_flash_finished(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        let Some(saved) = self.orchestrator.finish() else {
            warn!("flash completion with no reprogramming in progress");
            return effects;
        };
        info!("flashing tool exited, restoring device state");

        self.classifier.reset();
        effects.push(Effect::ResetReceiver);

        // Commands queued by the UI during the flash run after the restore
        let pending = self.queue.take_all();
        self.queue.extend(saved.restoration_commands());
        self.queue.extend(pending);

        if self.mode() == Mode::Exiting {
            effects.push(Effect::CloseLink);
            return effects;
        }
        self.mode.resume_monitoring();
        self.send_head(&mut effects);
        effects
    }

    /// Handle the UI launcher closing
    pub fn handle_launcher_exit(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.mode.exit();
        if !self.in_flight && !self.orchestrator.is_flashing() {
            effects.push(Effect::CloseLink);
        }
        effects
    }

    /// Nothing transmitted and no flash running
    fn is_idle(&self) -> bool {
        !self.in_flight && !self.orchestrator.is_flashing()
    }

    fn send_head(&mut self, effects: &mut Vec<Effect>) {
        if let Some(head) = self.queue.head() {
            debug!("tx: {}", head);
            effects.push(Effect::Transmit(head.clone()));
            self.in_flight = true;
        }
    }

    /// Called after the head was accepted: refill per mode, then send
    fn advance(&mut self, effects: &mut Vec<Effect>) {
        if self.queue.is_empty() {
            match self.mode() {
                Mode::Monitoring => self.queue.push(Command::status()),
                Mode::Reprogramming => {
                    self.begin_reprogramming(effects);
                    return;
                }
                Mode::Exiting => {
                    info!("queue drained while exiting, closing link");
                    effects.push(Effect::CloseLink);
                    return;
                }
            }
        }
        self.send_head(effects);
    }

    fn begin_reprogramming(&mut self, effects: &mut Vec<Effect>) {
        self.orchestrator.begin(&self.snapshot);
        effects.push(Effect::StartFlash);
    }
}
