//! Pending command queue
//!
//! FIFO of commands for the controller. The head is the in-flight command;
//! the link is half-duplex, so nothing behind the head is ever sent early.

use std::collections::VecDeque;

use crate::protocol::command::STATUS;
use crate::protocol::Command;

/// Ordered queue of pending commands
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    commands: VecDeque<Command>,
}

impl CommandQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command
    pub fn push(&mut self, command: Command) {
        self.commands.push_back(command);
    }

    /// Append several commands in order
    pub fn extend(&mut self, commands: impl IntoIterator<Item = Command>) {
        self.commands.extend(commands);
    }

    /// The in-flight (or next to be sent) command
    pub fn head(&self) -> Option<&Command> {
        self.commands.front()
    }

    /// Remove the head after an accepted response
    pub fn pop(&mut self) -> Option<Command> {
        self.commands.pop_front()
    }

    /// Discard everything and queue `commands` instead
    pub fn replace(&mut self, commands: impl IntoIterator<Item = Command>) {
        self.commands.clear();
        self.commands.extend(commands);
    }

    /// Remove and return every queued command
    pub fn take_all(&mut self) -> Vec<Command> {
        self.commands.drain(..).collect()
    }

    /// Empty, or holding nothing but the standing status poll
    pub fn is_trivial(&self) -> bool {
        match self.commands.len() {
            0 => true,
            1 => self.commands[0].is(STATUS),
            _ => false,
        }
    }

    /// Number of queued commands, head included
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Iterate from head to tail
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }
}
