//! # Dead Letters
//!
//! Undeliverable messages are never errors to the sender; they become
//! [`DeadLetter`] reports delivered to the stage's dead-letters actor, which
//! logs each one and fans it out to registered listeners. The dead-letters
//! actor lives at the reserved address and is itself a normal actor, so
//! reports are serialized like any other message.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::actor::{Actor, Context};
use crate::actor_proxy;
use crate::address::Address;
use crate::error::FailureReason;
use crate::message::Outcome;

/// One undeliverable message: where it was headed, what it looked like, and
/// why it could not be delivered.
#[derive(Clone, Debug)]
pub struct DeadLetter {
    address: Address,
    representation: String,
    reason: Option<String>,
}

impl DeadLetter {
    pub fn new(address: Address, representation: String, reason: Option<String>) -> Self {
        Self {
            address,
            representation,
            reason,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn representation(&self) -> &str {
        &self.representation
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

impl fmt::Display for DeadLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{} to {}: {}", self.representation, self.address, reason),
            None => write!(f, "{} to {}", self.representation, self.address),
        }
    }
}

/// Observer of dead letters. A failing listener never affects the others.
pub trait DeadLettersListener: Send + Sync {
    fn handle(&self, dead_letter: &DeadLetter) -> Result<(), FailureReason>;
}

/// The stage-wide sink behind the [`DeadLetters`] proxy.
#[derive(Default)]
pub struct DeadLettersActor {
    listeners: Vec<Arc<dyn DeadLettersListener>>,
}

impl DeadLettersActor {
    pub async fn failed_delivery(
        &mut self,
        _context: &mut Context,
        dead_letter: DeadLetter,
    ) -> Outcome {
        info!(dead_letter = %dead_letter, "dead letter");
        for listener in &self.listeners {
            if let Err(error) = listener.handle(&dead_letter) {
                warn!(error = %error, "dead-letters listener failed");
            }
        }
        Ok(())
    }

    pub async fn register_listener(
        &mut self,
        _context: &mut Context,
        listener: Arc<dyn DeadLettersListener>,
    ) -> Outcome {
        self.listeners.push(listener);
        Ok(())
    }
}

impl Actor for DeadLettersActor {}

actor_proxy! {
    /// Typed handle on the stage's dead-letters actor.
    pub proxy DeadLetters for DeadLettersActor {
        fn failed_delivery(dead_letter: DeadLetter);
        fn register_listener(listener: Arc<dyn DeadLettersListener>);
    }
}
