//! # Scheduler
//!
//! Stage-owned timer facility. Scheduled work should reach actors only
//! through proxies, so it serializes with the target's other messages and
//! degrades to dead letters once the target stops. Every schedule answers a
//! [`Cancellable`]; cancellation is idempotent and loses the race cleanly
//! when the task already ran.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time;

/// Handle on one scheduled task.
#[derive(Clone)]
pub struct Cancellable {
    cancelled: Arc<AtomicBool>,
    completed: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl Cancellable {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            completed: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Cancels the task. Answers `true` only for the call that actually
    /// cancelled it; `false` once cancelled or already completed.
    pub fn cancel(&self) -> bool {
        if self.completed.load(Ordering::SeqCst) {
            return false;
        }
        let won = self
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if won {
            self.wake.notify_one();
        }
        won
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Timer facility handing out [`Cancellable`] tasks.
#[derive(Clone, Default)]
pub struct Scheduler {
    scheduled: Arc<Mutex<Vec<Cancellable>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `task` once after `delay`, then every `interval` if one is
    /// given, until cancelled.
    pub fn schedule<F>(
        &self,
        delay: Duration,
        interval: Option<Duration>,
        mut task: F,
    ) -> Cancellable
    where
        F: FnMut() + Send + 'static,
    {
        let cancellable = Cancellable::new();
        self.scheduled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(cancellable.clone());

        let cancelled = cancellable.cancelled.clone();
        let completed = cancellable.completed.clone();
        let wake = cancellable.wake.clone();
        tokio::spawn(async move {
            let mut due = delay;
            loop {
                tokio::select! {
                    _ = time::sleep(due) => {}
                    _ = wake.notified() => {}
                }
                if cancelled.load(Ordering::SeqCst) {
                    return;
                }
                task();
                match interval {
                    Some(every) => due = every,
                    None => {
                        completed.store(true, Ordering::SeqCst);
                        return;
                    }
                }
            }
        });
        cancellable
    }

    /// Convenience for one-shot schedules.
    pub fn schedule_once<F>(&self, delay: Duration, task: F) -> Cancellable
    where
        F: FnOnce() + Send + 'static,
    {
        let mut task = Some(task);
        self.schedule(delay, None, move || {
            if let Some(task) = task.take() {
                task();
            }
        })
    }

    /// Cancels everything still scheduled. Called on stage termination.
    pub fn close(&self) {
        let scheduled = std::mem::take(
            &mut *self
                .scheduled
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for cancellable in scheduled {
            cancellable.cancel();
        }
    }
}
