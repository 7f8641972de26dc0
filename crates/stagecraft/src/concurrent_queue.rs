//! # Reference Mailbox Backend
//!
//! An unbounded multi-producer/single-consumer queue drained by the actor's
//! own task, with an increasing-then-capped backoff while the queue is empty.
//! Enqueues signal a [`tokio::sync::Notify`], so the backoff wait breaks the
//! instant a message arrives; the sleep is only the safety bound.
//!
//! Other backends (bounded queues, shared-pool draining, preallocated rings)
//! satisfy the same [`Mailbox`]/[`Dispatcher`] contracts and are selected by
//! registering their provider, not by changes to the core.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::mailbox::{Dispatcher, Mailbox, MailboxAssignment, MailboxProvider};
use crate::message::LocalMessage;

const DEFAULT_THROTTLING_COUNT: usize = 1;
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(1);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_millis(64);

/// Backoff-driven dispatcher for the concurrent-queue backend.
pub struct ConcurrentQueueDispatcher {
    throttling_count: usize,
    initial_backoff_us: u64,
    max_backoff_us: u64,
    current_backoff_us: AtomicU64,
    arrival: Notify,
    closed: AtomicBool,
}

impl ConcurrentQueueDispatcher {
    pub fn new(throttling_count: usize, initial_backoff: Duration, max_backoff: Duration) -> Self {
        let initial_backoff_us = initial_backoff.as_micros().max(1) as u64;
        Self {
            throttling_count: throttling_count.max(1),
            initial_backoff_us,
            max_backoff_us: max_backoff.as_micros().max(1) as u64,
            current_backoff_us: AtomicU64::new(initial_backoff_us),
            arrival: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Dispatcher for ConcurrentQueueDispatcher {
    fn throttling_count(&self) -> usize {
        self.throttling_count
    }

    async fn idle(&self) {
        let step = self.current_backoff_us.load(Ordering::Relaxed);
        let doubled = (step.saturating_mul(2)).min(self.max_backoff_us);
        self.current_backoff_us.store(doubled, Ordering::Relaxed);
        tokio::select! {
            _ = self.arrival.notified() => {
                self.current_backoff_us
                    .store(self.initial_backoff_us, Ordering::Relaxed);
            }
            _ = tokio::time::sleep(Duration::from_micros(step)) => {}
        }
    }

    fn signal(&self) {
        self.current_backoff_us
            .store(self.initial_backoff_us, Ordering::Relaxed);
        self.arrival.notify_one();
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.arrival.notify_one();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Unbounded FIFO mailbox signalling its dispatcher on every enqueue.
pub struct ConcurrentQueueMailbox {
    queue: Mutex<VecDeque<LocalMessage>>,
    dispatcher: Arc<dyn Dispatcher>,
    closed: AtomicBool,
}

impl ConcurrentQueueMailbox {
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            dispatcher,
            closed: AtomicBool::new(false),
        }
    }
}

impl Mailbox for ConcurrentQueueMailbox {
    fn send(&self, message: LocalMessage) -> Result<(), LocalMessage> {
        {
            // closed is decided under the queue lock so a racing close cannot
            // strand a message that passed the check
            let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
            if self.closed.load(Ordering::SeqCst) {
                return Err(message);
            }
            queue.push_back(message);
        }
        self.dispatcher.signal();
        Ok(())
    }

    fn receive(&self) -> Option<LocalMessage> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn close(&self) {
        let _queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Provider for the reference backend; every actor gets its own queue and
/// dispatcher.
pub struct ConcurrentQueueMailboxProvider {
    throttling_count: usize,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl ConcurrentQueueMailboxProvider {
    pub fn new() -> Self {
        Self {
            throttling_count: DEFAULT_THROTTLING_COUNT,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }

    pub fn with_throttling_count(mut self, throttling_count: usize) -> Self {
        self.throttling_count = throttling_count;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }
}

impl Default for ConcurrentQueueMailboxProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MailboxProvider for ConcurrentQueueMailboxProvider {
    fn name(&self) -> &str {
        "concurrent-queue"
    }

    fn provide_mailbox_for(
        &self,
        _hint: u64,
        dispatcher: Option<Arc<dyn Dispatcher>>,
    ) -> MailboxAssignment {
        let dispatcher = dispatcher.unwrap_or_else(|| {
            Arc::new(ConcurrentQueueDispatcher::new(
                self.throttling_count,
                self.initial_backoff,
                self.max_backoff,
            ))
        });
        MailboxAssignment {
            mailbox: Arc::new(ConcurrentQueueMailbox::new(dispatcher.clone())),
            dispatcher,
        }
    }
}
