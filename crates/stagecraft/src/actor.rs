//! # Actors
//!
//! An actor is a plain struct implementing [`Actor`]; its protocol methods
//! are async inherent methods taking `&mut self` plus the actor's
//! [`Context`], answering an [`Outcome`]. The runtime owns the struct inside
//! an [`Instance`] and guarantees at most one invocation runs against it at a
//! time, so protocol methods never need interior locking.
//!
//! The life-cycle hooks all default to no-ops except the restart pair, which
//! delegates to the stop/start hooks so an actor that only implements
//! `before_start`/`after_stop` still cleans up and re-initializes across a
//! restart.

use std::sync::Arc;

use async_trait::async_trait;

use crate::address::Address;
use crate::completes::{CompletesEventually, CompletionSink};
use crate::error::{ActorError, FailureReason};
use crate::lifecycle::Control;
use crate::message::Outcome;
use crate::proxy::Proxy;
use crate::scheduler::Scheduler;
use crate::stage::{Definition, Stage};

/// Life-cycle hooks. Every method has a default, so the minimal actor is an
/// empty impl block.
#[async_trait]
pub trait Actor: Send + Sized + 'static {
    /// Runs before the first message, inside the creating call. A failure
    /// here is a construction failure; the actor is never registered.
    async fn before_start(&mut self, _context: &mut Context) -> Outcome {
        Ok(())
    }

    /// Runs exactly once after the actor has stopped taking messages.
    async fn after_stop(&mut self, _context: &mut Context) -> Outcome {
        Ok(())
    }

    /// Runs on the failed state just before a restart replaces it.
    async fn before_restart(&mut self, context: &mut Context, _reason: &FailureReason) -> Outcome {
        self.after_stop(context).await
    }

    /// Runs on the fresh state just after a restart rebuilt it.
    async fn after_restart(&mut self, context: &mut Context, _reason: &FailureReason) -> Outcome {
        self.before_start(context).await
    }

    /// Runs before suspended messages are re-delivered on a resume decision.
    async fn before_resume(&mut self, _context: &mut Context, _reason: &FailureReason) -> Outcome {
        Ok(())
    }
}

/// The runtime-owned pairing of actor state and its context. Moves through
/// the erased invocation futures; not constructed by user code.
pub struct Instance<A: Actor> {
    #[doc(hidden)]
    pub state: A,
    #[doc(hidden)]
    pub context: Context,
}

impl<A: Actor> Instance<A> {
    pub(crate) fn new(state: A, context: Context) -> Self {
        Self { state, context }
    }
}

/// The actor's window onto the runtime: its own identity, its stage, child
/// creation, stowing, and the deferred-result channel.
pub struct Context {
    env: Arc<crate::environment::Environment>,
    stage: Stage,
}

impl Context {
    pub(crate) fn new(env: Arc<crate::environment::Environment>, stage: Stage) -> Self {
        Self { env, stage }
    }

    pub(crate) fn environment(&self) -> &Arc<crate::environment::Environment> {
        &self.env
    }

    pub fn address(&self) -> &Address {
        self.env.address()
    }

    pub fn name(&self) -> &str {
        self.env.name()
    }

    /// The owning stage. Refused once the actor has secured itself.
    pub fn stage(&self) -> Result<Stage, ActorError> {
        if self.env.is_secured() {
            return Err(ActorError::InvalidOperation(
                "stage access from a secured actor",
            ));
        }
        Ok(self.stage.clone())
    }

    /// Severs outside access: `stage` and `parent_as` answer
    /// [`ActorError::InvalidOperation`] from now on.
    pub fn secure(&self) {
        self.env.set_secured();
    }

    pub fn is_secured(&self) -> bool {
        self.env.is_secured()
    }

    pub fn is_stopped(&self) -> bool {
        self.env.is_stopped()
    }

    /// The parent actor under the given protocol, if the parent has ever
    /// constructed that proxy. Refused once secured.
    pub fn parent_as<P: Clone + 'static>(&self) -> Result<Option<P>, ActorError> {
        if self.env.is_secured() {
            return Err(ActorError::InvalidOperation(
                "parent access from a secured actor",
            ));
        }
        Ok(self
            .env
            .parent()
            .and_then(|parent| parent.lookup_proxy::<P>()))
    }

    /// This actor under the given protocol, if that proxy has been
    /// constructed. Useful for scheduling work against oneself.
    pub fn self_as<P: Clone + 'static>(&self) -> Option<P> {
        self.env.lookup_proxy::<P>()
    }

    /// Creates a child actor supervised within this actor's subtree; the
    /// child is stopped automatically when this actor stops.
    pub async fn child_actor_for<A: Actor>(
        &self,
        definition: Definition<A>,
    ) -> Result<Proxy<A>, ActorError> {
        self.stage
            .spawn_with_parent(definition, Some(self.env.clone()))
            .await
    }

    /// Buffers every following invocation except the named protocols, until
    /// [`Context::disperse_stowed_messages`] is called.
    pub fn stow_messages(&self, except_protocols: &[&'static str]) {
        self.env.begin_stowing(except_protocols);
    }

    /// Ends stowing; the buffered invocations are re-delivered in their
    /// original order before normal draining resumes.
    pub fn disperse_stowed_messages(&self) {
        self.env.request_dispersal();
    }

    /// Requests this actor's own stop. Takes effect after the current
    /// invocation returns.
    pub fn stop(&self) {
        let _ = self.env.control().send(Control::Stop);
    }

    pub fn scheduler(&self) -> Scheduler {
        self.stage.scheduler()
    }

    /// Answers this actor's pooled deferred-result channel, re-targeted at
    /// the given sink. The channel actor is created lazily on first use and
    /// cached for the actor's lifetime.
    pub async fn completes_eventually(
        &self,
        sink: Box<dyn CompletionSink>,
    ) -> Result<CompletesEventually, ActorError> {
        if let Some(cached) = self.env.cached_completes() {
            if !cached.is_stopped() {
                cached.retarget(sink);
                return Ok(cached);
            }
        }
        let completes = self.stage.completes_for(sink).await?;
        self.env.cache_completes(completes.clone());
        Ok(completes)
    }
}
