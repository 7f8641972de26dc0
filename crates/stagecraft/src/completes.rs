//! # Completes Eventually
//!
//! The deferred-result channel across actor boundaries. A caller hands a
//! [`CompletionSink`] to the stage or its context and receives a
//! [`CompletesEventually`] handle, itself a proxy to a small channel actor.
//! The current sink receives exactly one value; the handle is pooled per
//! requesting actor and re-targeted at a fresh sink on each request. Calls
//! after the channel actor stopped degrade to dead letters like any other
//! send to a stopped actor.
//!
//! [`answer`] pairs a sink with a typed awaitable for the common
//! request/response case.

use std::any::Any;

use tokio::sync::oneshot;
use tracing::warn;

use crate::actor::{Actor, Context};
use crate::actor_proxy;
use crate::message::Outcome;

/// Receiver of one deferred value. Consumed on delivery.
pub trait CompletionSink: Send + 'static {
    fn complete(self: Box<Self>, value: Box<dyn Any + Send>);
}

/// The channel actor behind a [`CompletesEventually`] handle.
#[derive(Default)]
pub struct CompletesEventuallyActor {
    sink: Option<Box<dyn CompletionSink>>,
}

impl CompletesEventuallyActor {
    pub async fn with(&mut self, _context: &mut Context, value: Box<dyn Any + Send>) -> Outcome {
        match self.sink.take() {
            Some(sink) => {
                sink.complete(value);
                Ok(())
            }
            None => {
                warn!("deferred value arrived with no sink to complete");
                Ok(())
            }
        }
    }

    pub async fn retarget(
        &mut self,
        _context: &mut Context,
        sink: Box<dyn CompletionSink>,
    ) -> Outcome {
        self.sink = Some(sink);
        Ok(())
    }
}

impl Actor for CompletesEventuallyActor {}

actor_proxy! {
    /// Handle on a deferred-result channel, addressed like any actor.
    pub proxy CompletesEventually for CompletesEventuallyActor {
        fn with(value: Box<dyn Any + Send>);
        fn retarget(sink: Box<dyn CompletionSink>);
    }
}

impl CompletesEventually {
    /// Releases the channel; the pooled actor stops.
    pub fn conclude(&self) {
        self.stop();
    }
}

/// Sink delivering into a [`tokio::sync::oneshot`] channel.
struct AnswerSink<T: Send + 'static> {
    tx: oneshot::Sender<T>,
}

impl<T: Send + 'static> CompletionSink for AnswerSink<T> {
    fn complete(self: Box<Self>, value: Box<dyn Any + Send>) {
        match value.downcast::<T>() {
            Ok(value) => {
                // a dropped receiver just discards the value
                let _ = self.tx.send(*value);
            }
            Err(_) => warn!(
                expected = std::any::type_name::<T>(),
                "deferred value of unexpected type dropped"
            ),
        }
    }
}

/// The awaitable half of [`answer`].
pub struct Answer<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Answer<T> {
    /// Waits for the value; `None` when the channel was released or the
    /// value never typed-checked against `T`.
    pub async fn outcome(self) -> Option<T> {
        self.rx.await.ok()
    }
}

/// Builds a typed sink/awaitable pair for request/response calls.
pub fn answer<T: Send + 'static>() -> (Box<dyn CompletionSink>, Answer<T>) {
    let (tx, rx) = oneshot::channel();
    let sink: Box<dyn CompletionSink> = Box::new(AnswerSink { tx });
    (sink, Answer { rx })
}
