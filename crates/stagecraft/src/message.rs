//! # Messages
//!
//! A message is a deferred invocation: a one-shot consumer that takes the
//! actor's boxed instance, runs one protocol method against it, and hands the
//! instance back together with an explicit [`Outcome`]. Moving the instance
//! through the future keeps the types `'static` and lets a single, type-erased
//! queue carry invocations for any actor type.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::FailureReason;

/// The result of one actor invocation. `Err` routes into supervision.
pub type Outcome = Result<(), FailureReason>;

/// Boxed future used by erased consumers.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// The actor instance in transit: a boxed `Instance<A>` with the type erased.
pub type Slot = Box<dyn Any + Send>;

/// One-shot, type-erased invocation body.
pub type Consumer = Box<dyn FnOnce(Slot) -> BoxFuture<(Slot, Outcome)> + Send + 'static>;

/// A queued invocation against one actor.
pub struct LocalMessage {
    protocol: &'static str,
    representation: &'static str,
    consumer: Consumer,
}

impl LocalMessage {
    pub fn new(protocol: &'static str, representation: &'static str, consumer: Consumer) -> Self {
        Self {
            protocol,
            representation,
            consumer,
        }
    }

    /// Protocol name, used by stowage overrides.
    pub fn protocol(&self) -> &'static str {
        self.protocol
    }

    /// Human-readable call signature for diagnostics and dead letters.
    pub fn representation(&self) -> &'static str {
        self.representation
    }

    pub(crate) fn into_consumer(self) -> Consumer {
        self.consumer
    }
}

impl fmt::Debug for LocalMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalMessage")
            .field("protocol", &self.protocol)
            .field("representation", &self.representation)
            .finish_non_exhaustive()
    }
}
