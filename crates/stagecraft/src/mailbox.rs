//! # Mailbox & Dispatcher Contracts
//!
//! A [`Mailbox`] is the ordered queue of pending invocations for one actor; a
//! [`Dispatcher`] is the policy half of the drain loop: how many messages to
//! take per scheduling turn and how to wait when the queue runs dry. The drain
//! loop itself lives with the actor's life cycle, one tokio task per actor,
//! which is what guarantees single-threaded execution per actor no matter how
//! many producers exist.
//!
//! Backends plug in through [`MailboxProvider`], registered by name and pass
//! in a [`MailboxProviderRegistry`]. The core depends only on the contracts in
//! this module.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::ActorError;
use crate::message::LocalMessage;

/// The per-actor queue of pending invocations.
///
/// A single mailbox delivers in the order invocations were successfully
/// enqueued. At most one invocation is in flight against the actor at a time;
/// that is enforced by the single drain task, not by the queue.
pub trait Mailbox: Send + Sync {
    /// Enqueues an invocation. When the mailbox is closed the message is
    /// answered back so the caller can route it to dead letters.
    fn send(&self, message: LocalMessage) -> Result<(), LocalMessage>;

    /// Dequeues the next invocation, or `None` when empty. Draining remains
    /// possible after `close` so a stopping actor can report what was left.
    fn receive(&self) -> Option<LocalMessage>;

    /// Whether enqueueing reuses preallocated message cells. Informational
    /// only; the send path is the same either way, this is surfaced for
    /// diagnostics and registration logging.
    fn is_preallocated(&self) -> bool {
        false
    }

    /// Marks the mailbox closed. Idempotent.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Drain-loop policy: throttling, backoff and shutdown.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// How many invocations to drain per scheduling turn before yielding, for
    /// fairness across mailboxes sharing an executor.
    fn throttling_count(&self) -> usize;

    /// Waits out one backoff step. The wait must end the instant `signal` is
    /// called, with the timeout as a safety bound.
    async fn idle(&self);

    /// Notifies the dispatcher that a message arrived: resets the backoff and
    /// interrupts any wait in progress.
    fn signal(&self);

    /// Stops drain activity as soon as practical. Idempotent.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// A mailbox paired with the dispatcher that drains it.
pub struct MailboxAssignment {
    pub mailbox: Arc<dyn Mailbox>,
    pub dispatcher: Arc<dyn Dispatcher>,
}

/// Plugin boundary for mailbox backends.
pub trait MailboxProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Registration priority; when two providers claim the same name the
    /// higher pass wins.
    fn pass(&self) -> u32 {
        1
    }

    /// Supplies a mailbox for the actor identified by `hint`, optionally
    /// draining through an externally supplied dispatcher.
    fn provide_mailbox_for(
        &self,
        hint: u64,
        dispatcher: Option<Arc<dyn Dispatcher>>,
    ) -> MailboxAssignment;
}

/// Named registry of mailbox providers with one default.
pub struct MailboxProviderRegistry {
    providers: Mutex<HashMap<String, Arc<dyn MailboxProvider>>>,
    default_name: Mutex<Option<String>>,
}

impl MailboxProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: Mutex::new(HashMap::new()),
            default_name: Mutex::new(None),
        }
    }

    /// Registers a provider under its name; an existing registration is only
    /// displaced by an equal or higher pass.
    pub fn register(&self, provider: Arc<dyn MailboxProvider>, is_default: bool) {
        let name = provider.name().to_string();
        let mut providers = self
            .providers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match providers.get(&name) {
            Some(existing) if existing.pass() > provider.pass() => {}
            _ => {
                providers.insert(name.clone(), provider);
            }
        }
        drop(providers);
        if is_default {
            *self
                .default_name
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(name);
        }
    }

    /// Answers a mailbox assignment from the named provider, or the default
    /// provider when no name is given.
    pub fn assignment_for(
        &self,
        name: Option<&str>,
        hint: u64,
    ) -> Result<MailboxAssignment, ActorError> {
        let resolved = match name {
            Some(name) => name.to_string(),
            None => self
                .default_name
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
                .ok_or_else(|| ActorError::UnknownMailboxProvider("(default)".to_string()))?,
        };
        let provider = self
            .providers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&resolved)
            .cloned()
            .ok_or(ActorError::UnknownMailboxProvider(resolved))?;
        Ok(provider.provide_mailbox_for(hint, None))
    }
}

impl Default for MailboxProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
