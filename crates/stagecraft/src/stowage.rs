//! # Stowage
//!
//! An ordered buffer of deferred invocations. Used twice per actor: for
//! messages the actor asked to stow while waiting on something external, and
//! for messages arriving while the actor is suspended by a failure. Draining
//! always preserves the original enqueue order.

use std::collections::VecDeque;

use crate::message::LocalMessage;

#[derive(Default)]
pub struct Stowage {
    messages: VecDeque<LocalMessage>,
}

impl Stowage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stow(&mut self, message: LocalMessage) {
        self.messages.push_back(message);
    }

    /// The next buffered invocation, oldest first.
    pub fn next(&mut self) -> Option<LocalMessage> {
        self.messages.pop_front()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Discards everything. Called on stop.
    pub fn reset(&mut self) {
        self.messages.clear();
    }
}
