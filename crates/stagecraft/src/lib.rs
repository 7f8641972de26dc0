//! # Stagecraft
//!
//! An actor-model concurrency runtime: isolated units of state that
//! communicate only through asynchronously delivered messages, one message at
//! a time per actor, with supervisor-mediated fault recovery and a deferred
//! result channel that works across actor boundaries.
//!
//! ## The pieces
//!
//! - **[`stage`]**: the runtime itself. A [`Stage`](stage::Stage) owns the
//!   actor directory, the address factory, the mailbox providers, the
//!   scheduler, and the dead-letters sink. Actors are created from a
//!   [`Definition`](stage::Definition).
//! - **[`actor`]**: the user-facing surface. Implement [`Actor`](actor::Actor)
//!   on a plain struct; protocol methods are async inherent methods answering
//!   an [`Outcome`](message::Outcome). The [`Context`](actor::Context) gives
//!   an actor its window onto the runtime.
//! - **[`proxy`]**: the only way in. [`actor_proxy!`] generates a typed,
//!   cloneable wrapper per protocol; every call becomes one queued,
//!   fire-and-forget invocation.
//! - **[`supervision`]**: failures are values. An `Err` outcome suspends the
//!   actor and asks its [`Supervisor`](supervision::Supervisor) to resume,
//!   restart, stop or escalate; buffered messages are re-delivered in order.
//! - **[`completes`]**: request/response without blocking the target. A
//!   [`CompletesEventually`](completes::CompletesEventually) handle delivers
//!   one deferred value to the caller's sink.
//! - **[`dead_letters`]**: undeliverable messages are reported, never errors.
//! - **[`mailbox`]** / **[`concurrent_queue`]**: the pluggable queueing layer
//!   and its reference backend.
//!
//! ## Concurrency model
//!
//! Each actor is drained by exactly one tokio task, so invocations against a
//! single actor never overlap and its state needs no locks. Actors run in
//! parallel on the worker pool; messages from one sender to one target are
//! delivered in send order.
//!
//! ```no_run
//! use stagecraft::actor::{Actor, Context};
//! use stagecraft::actor_proxy;
//! use stagecraft::message::Outcome;
//! use stagecraft::stage::{Definition, Stage};
//!
//! #[derive(Default)]
//! struct CounterActor {
//!     count: u64,
//! }
//!
//! impl Actor for CounterActor {}
//!
//! impl CounterActor {
//!     async fn increment(&mut self, _context: &mut Context, by: u64) -> Outcome {
//!         self.count += by;
//!         Ok(())
//!     }
//! }
//!
//! actor_proxy! {
//!     pub proxy Counter for CounterActor {
//!         fn increment(by: u64);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let stage = Stage::new("demo").await;
//!     let counter = Counter::new(
//!         stage
//!             .actor_for(Definition::of(|| Ok(CounterActor::default())))
//!             .await
//!             .unwrap(),
//!     );
//!     counter.increment(2);
//!     stage.terminate().await;
//! }
//! ```

pub mod actor;
pub mod address;
pub mod completes;
pub mod concurrent_queue;
pub mod dead_letters;
pub mod error;
pub mod mailbox;
pub mod message;
pub mod proxy;
pub mod scheduler;
pub mod stage;
pub mod stowage;
pub mod supervision;
pub mod tracing;

mod environment;
mod lifecycle;

// Re-export core types for convenience
pub use actor::{Actor, Context};
pub use address::{Address, AddressFactory};
pub use completes::{answer, Answer, CompletesEventually, CompletionSink};
pub use dead_letters::{DeadLetter, DeadLetters, DeadLettersListener};
pub use error::{ActorError, FailureReason};
pub use message::Outcome;
pub use proxy::Proxy;
pub use scheduler::{Cancellable, Scheduler};
pub use stage::{Definition, Stage, StageConfig};
pub use supervision::{Directive, Supervised, Supervisor};
