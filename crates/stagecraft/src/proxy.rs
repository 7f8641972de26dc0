//! # Proxies
//!
//! Actors are never invoked directly; callers hold a typed protocol wrapper
//! generated by [`actor_proxy!`] over the untyped [`Proxy`]. Each wrapper
//! method packages the call as an erased consumer with a compile-time
//! representation string and enqueues it on the target's mailbox. A send to a
//! stopped target never errors back to the caller; it becomes exactly one
//! dead-letter report.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::warn;

use crate::actor::{Actor, Instance};
use crate::address::Address;
use crate::dead_letters::{DeadLetter, DeadLetters};
use crate::environment::Environment;
use crate::lifecycle::Control;
use crate::message::{BoxFuture, Consumer, LocalMessage, Outcome, Slot};

/// Untyped handle on one actor. Typed protocol wrappers are generated over
/// this by [`actor_proxy!`]; it is rarely used directly.
pub struct Proxy<A: Actor> {
    env: Arc<Environment>,
    // behind an Arc: the dead-letters wrapper itself contains a Proxy, so
    // holding it by value would make the type infinitely sized
    dead_letters: Option<Arc<DeadLetters>>,
    _target: PhantomData<fn() -> A>,
}

impl<A: Actor> Clone for Proxy<A> {
    fn clone(&self) -> Self {
        Self {
            env: self.env.clone(),
            dead_letters: self.dead_letters.clone(),
            _target: PhantomData,
        }
    }
}

impl<A: Actor> Proxy<A> {
    pub(crate) fn new(env: Arc<Environment>, dead_letters: Option<DeadLetters>) -> Self {
        Self {
            env,
            dead_letters: dead_letters.map(Arc::new),
            _target: PhantomData,
        }
    }

    pub fn address(&self) -> &Address {
        self.env.address()
    }

    pub fn is_stopped(&self) -> bool {
        self.env.is_stopped()
    }

    /// Requests the target's stop. Asynchronous; the target finishes its
    /// current invocation first.
    pub fn stop(&self) {
        let _ = self.env.control().send(Control::Stop);
    }

    /// Caches a typed wrapper in the target's environment so
    /// `Context::parent_as`/`self_as` can find it later.
    pub fn cache<P: Clone + Send + Sync + 'static>(&self, wrapper: P) {
        self.env.cache_proxy(wrapper);
    }

    /// Packages one invocation and enqueues it. The closure receives the
    /// boxed instance, runs the protocol method, and hands the instance back
    /// with the outcome.
    pub fn deliver<F, Fut>(&self, protocol: &'static str, representation: &'static str, invoke: F)
    where
        F: FnOnce(Box<Instance<A>>) -> Fut + Send + 'static,
        Fut: Future<Output = (Box<Instance<A>>, Outcome)> + Send + 'static,
    {
        let consumer: Consumer = Box::new(move |slot: Slot| {
            let instance = match slot.downcast::<Instance<A>>() {
                Ok(instance) => instance,
                Err(slot) => {
                    // impossible through generated wrappers; answered as a
                    // failure rather than losing the instance
                    let fut: BoxFuture<(Slot, Outcome)> = Box::pin(async move {
                        (
                            slot,
                            Err(crate::error::FailureReason::protocol_mismatch(
                                representation,
                            )),
                        )
                    });
                    return fut;
                }
            };
            let fut: BoxFuture<(Slot, Outcome)> = Box::pin(async move {
                let (instance, outcome) = invoke(instance).await;
                let slot: Slot = instance;
                (slot, outcome)
            });
            fut
        });
        self.send_or_dead_letter(LocalMessage::new(protocol, representation, consumer));
    }

    fn send_or_dead_letter(&self, message: LocalMessage) {
        if self.env.is_stopped() {
            self.report_undelivered(message, "actor stopped");
            return;
        }
        match self.env.mailbox().send(message) {
            Ok(()) => self.env.dispatcher().signal(),
            Err(message) => self.report_undelivered(message, "mailbox closed"),
        }
    }

    fn report_undelivered(&self, message: LocalMessage, why: &str) {
        let letter = DeadLetter::new(
            self.env.address().clone(),
            message.representation().to_string(),
            Some(why.to_string()),
        );
        match &self.dead_letters {
            Some(dead_letters) if !dead_letters.is_stopped() => {
                dead_letters.failed_delivery(letter);
            }
            _ => warn!(%letter, "undelivered message"),
        }
    }
}

/// Generates a typed protocol wrapper over [`Proxy`].
///
/// ```ignore
/// actor_proxy! {
///     pub proxy Greeter for GreeterActor {
///         fn greet(name: String);
///         fn total(answers: CompletesEventually);
///     }
/// }
/// ```
///
/// Each declared operation must exist on the actor as
/// `async fn greet(&mut self, context: &mut Context, name: String) -> Outcome`.
/// The wrapper is `Clone`, carries `PROTOCOL` for stowage overrides, and
/// caches itself in the target's environment on construction.
#[macro_export]
macro_rules! actor_proxy {
    (
        $(#[$meta:meta])*
        $vis:vis proxy $proxy:ident for $actor:ty {
            $( fn $method:ident ( $( $arg:ident : $ty:ty ),* $(,)? ); )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone)]
        $vis struct $proxy {
            inner: $crate::proxy::Proxy<$actor>,
        }

        impl $proxy {
            pub const PROTOCOL: &'static str = stringify!($proxy);

            pub fn new(inner: $crate::proxy::Proxy<$actor>) -> Self {
                let wrapper = Self { inner };
                wrapper.inner.cache(wrapper.clone());
                wrapper
            }

            pub fn address(&self) -> &$crate::address::Address {
                self.inner.address()
            }

            pub fn is_stopped(&self) -> bool {
                self.inner.is_stopped()
            }

            pub fn stop(&self) {
                self.inner.stop();
            }

            $(
                pub fn $method(&self, $( $arg : $ty ),* ) {
                    const REPRESENTATION: &'static str = concat!(
                        stringify!($proxy), ".", stringify!($method),
                        "(", stringify!($($arg),*), ")"
                    );
                    self.inner.deliver(
                        Self::PROTOCOL,
                        REPRESENTATION,
                        move |mut instance: ::std::boxed::Box<$crate::actor::Instance<$actor>>| async move {
                            let outcome = instance
                                .state
                                .$method(&mut instance.context $(, $arg)* )
                                .await;
                            (instance, outcome)
                        },
                    );
                }
            )*
        }
    };
}
