//! Device-mode state machine
//!
//! Monitoring (initial) → Reprogramming → Monitoring, and any mode → Exiting,
//! which is terminal.

use serde::{Deserialize, Serialize};
use tracing::info;

/// What the engine does when its queue drains
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Poll status continuously
    #[default]
    Monitoring,
    /// Flash new firmware once the queue drains
    Reprogramming,
    /// Close the link once the queue drains or times out
    Exiting,
}

/// Holder of the current mode, enforcing legal transitions
#[derive(Debug, Clone, Default)]
pub struct ModeMachine {
    current: Mode,
}

impl ModeMachine {
    /// Start in Monitoring
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mode
    pub fn current(&self) -> Mode {
        self.current
    }

    /// Monitoring → Reprogramming; returns false if not in Monitoring
    pub fn request_reprogram(&mut self) -> bool {
        if self.current != Mode::Monitoring {
            return false;
        }
        info!("mode: Monitoring -> Reprogramming (pending queue drain)");
        self.current = Mode::Reprogramming;
        true
    }

    /// Reprogramming → Monitoring; returns false if not in Reprogramming
    pub fn resume_monitoring(&mut self) -> bool {
        if self.current != Mode::Reprogramming {
            return false;
        }
        info!("mode: Reprogramming -> Monitoring");
        self.current = Mode::Monitoring;
        true
    }

    /// Any mode → Exiting
    pub fn exit(&mut self) {
        if self.current != Mode::Exiting {
            info!("mode: {:?} -> Exiting", self.current);
            self.current = Mode::Exiting;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reprogram_cycle() {
        let mut mode = ModeMachine::new();
        assert_eq!(mode.current(), Mode::Monitoring);
        assert!(mode.request_reprogram());
        assert!(!mode.request_reprogram());
        assert_eq!(mode.current(), Mode::Reprogramming);
        assert!(mode.resume_monitoring());
        assert_eq!(mode.current(), Mode::Monitoring);
    }

    #[test]
    fn test_exiting_is_terminal() {
        let mut mode = ModeMachine::new();
        mode.request_reprogram();
        mode.exit();
        assert!(!mode.resume_monitoring());
        assert!(!mode.request_reprogram());
        assert_eq!(mode.current(), Mode::Exiting);
    }
}
