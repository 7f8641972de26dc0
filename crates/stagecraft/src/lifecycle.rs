//! # Life Cycle
//!
//! One `LifeCycle` per actor, owned by the actor's single drain task. The
//! task is the only code that ever touches the actor's state, which is what
//! makes per-actor execution single-threaded: producers only push onto the
//! mailbox, and everything else, including supervision decisions, arrives on
//! the control channel and is applied here between invocations.
//!
//! The state machine: Created, then Started once `before_start` succeeded,
//! then Suspended and back on failure episodes, and finally Stopped exactly
//! once. While suspended, drained messages divert into the `suspended` buffer
//! and are re-delivered in their original order after a resume or restart.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::actor::{Actor, Instance};
use crate::address::Address;
use crate::dead_letters::{DeadLetter, DeadLetters};
use crate::environment::Environment;
use crate::error::FailureReason;
use crate::message::{LocalMessage, Slot};
use crate::stage::Stage;
use crate::stowage::Stowage;
use crate::supervision::{DefaultSupervisor, Directive, Supervised, Supervisor};

/// Commands applied by the actor's own drain task between invocations.
pub(crate) enum Control {
    Stop,
    Decided(Directive),
}

/// Stage- and parent-side handle on a running actor.
#[derive(Clone)]
pub(crate) struct ActorHandle {
    address: Address,
    control: mpsc::UnboundedSender<Control>,
}

impl ActorHandle {
    pub(crate) fn new(address: Address, control: mpsc::UnboundedSender<Control>) -> Self {
        Self { address, control }
    }

    pub(crate) fn address(&self) -> &Address {
        &self.address
    }

    pub(crate) fn stop(&self) {
        // send failure means the drain task is already gone
        let _ = self.control.send(Control::Stop);
    }
}

/// At most one failure episode is in flight per actor. The mark carries the
/// reason and the supervisor currently deciding it; escalation walks the
/// supervisor's parent chain one hop at a time.
struct FailureMark {
    reason: Option<FailureReason>,
    supervisor: Option<Arc<dyn Supervisor>>,
    hops: u32,
}

impl FailureMark {
    fn new() -> Self {
        Self {
            reason: None,
            supervisor: None,
            hops: 0,
        }
    }

    fn is_marked(&self) -> bool {
        self.reason.is_some()
    }

    fn mark(&mut self, reason: FailureReason, supervisor: Arc<dyn Supervisor>) {
        self.reason = Some(reason);
        self.supervisor = Some(supervisor);
        self.hops = 0;
    }

    /// Ends the episode, answering its reason.
    fn take(&mut self) -> Option<FailureReason> {
        self.supervisor = None;
        self.hops = 0;
        self.reason.take()
    }

    fn hops(&self) -> u32 {
        self.hops
    }

    /// Moves the episode one supervisor up; `None` when the chain is
    /// exhausted.
    fn escalate(&mut self) -> Option<(FailureReason, Arc<dyn Supervisor>)> {
        let parent = self.supervisor.as_ref().and_then(|current| current.parent())?;
        let reason = self.reason.clone()?;
        self.supervisor = Some(parent.clone());
        self.hops += 1;
        Some((reason, parent))
    }
}

pub(crate) struct LifeCycle<A: Actor> {
    env: Arc<Environment>,
    stage: Stage,
    instance: Option<Box<Instance<A>>>,
    factory: Arc<dyn Fn() -> Result<A, FailureReason> + Send + Sync>,
    control_rx: mpsc::UnboundedReceiver<Control>,
    dead_letters: Option<DeadLetters>,
    escalation_limit: u32,
    stowage: Stowage,
    suspended: Stowage,
    failure: FailureMark,
}

impl<A: Actor> LifeCycle<A> {
    pub(crate) fn new(
        env: Arc<Environment>,
        stage: Stage,
        instance: Box<Instance<A>>,
        factory: Arc<dyn Fn() -> Result<A, FailureReason> + Send + Sync>,
        control_rx: mpsc::UnboundedReceiver<Control>,
        dead_letters: Option<DeadLetters>,
        escalation_limit: u32,
    ) -> Self {
        Self {
            env,
            stage,
            instance: Some(instance),
            factory,
            control_rx,
            dead_letters,
            escalation_limit,
            stowage: Stowage::new(),
            suspended: Stowage::new(),
            failure: FailureMark::new(),
        }
    }

    /// The drain loop. Runs until the actor stops.
    pub(crate) async fn run(mut self) {
        debug!(address = %self.env.address(), name = self.env.name(), "actor started");
        loop {
            if self.drain_control().await {
                return;
            }
            if self.env.take_disperse_request() {
                self.env.set_dispersing(true);
            }
            if self.env.is_dispersing() && !self.failure.is_marked() {
                self.disperse_step().await;
            }

            let throttle = self.env.dispatcher().throttling_count().max(1);
            let mut drained = 0;
            while drained < throttle {
                match self.env.mailbox().receive() {
                    Some(message) => {
                        self.deliver(message).await;
                        drained += 1;
                        if self.drain_control().await {
                            return;
                        }
                        // a dispersal requested mid-turn beats newer mailbox
                        // messages, to keep the stowed order intact
                        if self.env.take_disperse_request() {
                            self.env.set_dispersing(true);
                        }
                        if self.env.is_dispersing() && !self.failure.is_marked() {
                            self.disperse_step().await;
                        }
                    }
                    None => break,
                }
            }

            if drained == 0 {
                let dispatcher = self.env.dispatcher();
                let control = tokio::select! {
                    maybe = self.control_rx.recv() => maybe,
                    _ = dispatcher.idle() => None,
                };
                if let Some(control) = control {
                    if self.apply(control).await {
                        return;
                    }
                }
            } else {
                // fairness toward the other actors on the worker pool
                tokio::task::yield_now().await;
            }
        }
    }

    /// Applies every control command already queued. Answers `true` once the
    /// actor has stopped.
    async fn drain_control(&mut self) -> bool {
        while let Ok(control) = self.control_rx.try_recv() {
            if self.apply(control).await {
                return true;
            }
        }
        false
    }

    async fn apply(&mut self, control: Control) -> bool {
        match control {
            Control::Stop => {
                self.stop_now().await;
                true
            }
            Control::Decided(directive) => self.decided(directive).await,
        }
    }

    async fn decided(&mut self, directive: Directive) -> bool {
        if !self.failure.is_marked() {
            debug!(
                address = %self.env.address(),
                ?directive,
                "directive without a failure in flight; ignored"
            );
            return false;
        }
        match directive {
            Directive::Resume => {
                self.resume().await;
                false
            }
            Directive::Restart => self.restart().await,
            Directive::Stop => {
                self.stop_now().await;
                true
            }
            Directive::Escalate => self.escalate().await,
        }
    }

    /// Routes one message: dead letter when stopped, suspended buffer during
    /// a failure episode, stowage while stowing, otherwise execution.
    async fn deliver(&mut self, message: LocalMessage) {
        if self.env.is_stopped() {
            self.dead_letter(message, "actor stopped");
            return;
        }
        if self.failure.is_marked() {
            self.suspended.stow(message);
            return;
        }
        if self.env.is_stowing() && !self.env.is_stowage_override(message.protocol()) {
            self.stowage.stow(message);
            return;
        }
        self.execute(message).await;
    }

    async fn execute(&mut self, message: LocalMessage) {
        let instance = match self.instance.take() {
            Some(instance) => instance,
            None => {
                self.dead_letter(message, "actor state unavailable");
                return;
            }
        };
        let representation = message.representation();
        let consumer = message.into_consumer();
        let slot: Slot = instance;
        let (slot, outcome) = consumer(slot).await;
        match slot.downcast::<Instance<A>>() {
            Ok(instance) => self.instance = Some(instance),
            Err(_) => {
                error!(
                    address = %self.env.address(),
                    representation,
                    "actor state lost across an invocation"
                );
            }
        }
        if let Err(reason) = outcome {
            self.failed(reason, representation);
        }
    }

    /// Suspends the actor and informs its supervisor. The decision arrives
    /// later on the control channel.
    fn failed(&mut self, reason: FailureReason, representation: &'static str) {
        warn!(
            address = %self.env.address(),
            name = self.env.name(),
            representation,
            error = %reason,
            "invocation failed; suspending"
        );
        let supervisor: Arc<dyn Supervisor> = match self.env.supervisor() {
            Some(supervisor) => supervisor,
            None => Arc::new(DefaultSupervisor),
        };
        self.failure.mark(reason.clone(), supervisor.clone());
        supervisor.inform(&reason, self.supervised_handle());
    }

    fn supervised_handle(&self) -> Supervised {
        Supervised::new(self.env.address().clone(), self.env.control())
    }

    async fn resume(&mut self) {
        let Some(reason) = self.failure.take() else {
            return;
        };
        debug!(address = %self.env.address(), "resuming");
        let hook = match self.instance.as_mut() {
            Some(instance) => {
                let Instance { state, context } = &mut **instance;
                state.before_resume(context, &reason).await
            }
            None => Ok(()),
        };
        if let Err(hook_error) = hook {
            self.failed(hook_error, "before_resume()");
            return;
        }
        self.redeliver_suspended().await;
    }

    /// Rebuilds the actor state from its definition. Answers `true` when the
    /// restart could not complete and the actor stopped instead.
    async fn restart(&mut self) -> bool {
        let Some(reason) = self.failure.take() else {
            return false;
        };
        debug!(address = %self.env.address(), "restarting");
        let hook = match self.instance.as_mut() {
            Some(instance) => {
                let Instance { state, context } = &mut **instance;
                state.before_restart(context, &reason).await
            }
            None => Ok(()),
        };
        if let Err(error) = hook {
            warn!(address = %self.env.address(), error = %error, "before_restart failed");
        }
        let fresh = match (self.factory)() {
            Ok(fresh) => fresh,
            Err(error) => {
                error!(
                    address = %self.env.address(),
                    error = %error,
                    "restart factory failed; stopping"
                );
                self.stop_now().await;
                return true;
            }
        };
        let hook = match self.instance.as_mut() {
            Some(instance) => {
                instance.state = fresh;
                let Instance { state, context } = &mut **instance;
                state.after_restart(context, &reason).await
            }
            None => Ok(()),
        };
        if let Err(error) = hook {
            error!(
                address = %self.env.address(),
                error = %error,
                "after_restart failed; stopping"
            );
            self.stop_now().await;
            return true;
        }
        self.redeliver_suspended().await;
        false
    }

    async fn escalate(&mut self) -> bool {
        if self.failure.hops() >= self.escalation_limit {
            error!(
                address = %self.env.address(),
                limit = self.escalation_limit,
                "escalation limit reached; stopping"
            );
            self.stop_now().await;
            return true;
        }
        match self.failure.escalate() {
            Some((reason, supervisor)) => {
                supervisor.inform(&reason, self.supervised_handle());
                false
            }
            None => {
                error!(
                    address = %self.env.address(),
                    "failure escalated past the last supervisor; stopping"
                );
                self.stop_now().await;
                true
            }
        }
    }

    /// Re-delivers the messages buffered during the failure episode, oldest
    /// first. A new failure mid-way leaves the remainder buffered for the
    /// next episode's resolution.
    async fn redeliver_suspended(&mut self) {
        while !self.failure.is_marked() && !self.env.is_stopped() {
            match self.suspended.next() {
                Some(message) => self.deliver(message).await,
                None => break,
            }
        }
    }

    /// Works through the stowage after a dispersal request, oldest first.
    async fn disperse_step(&mut self) {
        while !self.failure.is_marked() && !self.env.is_stopped() {
            match self.stowage.next() {
                Some(message) => self.deliver(message).await,
                None => {
                    self.env.set_dispersing(false);
                    break;
                }
            }
        }
    }

    /// The exactly-once stop sequence.
    async fn stop_now(&mut self) {
        if !self.env.mark_stopped() {
            return;
        }
        debug!(address = %self.env.address(), name = self.env.name(), "stopping");
        self.env.stop_children();
        self.stowage.reset();
        self.suspended.reset();
        let mailbox = self.env.mailbox();
        mailbox.close();
        while let Some(message) = mailbox.receive() {
            self.dead_letter(message, "actor stopped");
        }
        self.env.dispatcher().close();
        if let Some(instance) = self.instance.as_mut() {
            let Instance { state, context } = &mut **instance;
            if let Err(error) = state.after_stop(context).await {
                warn!(address = %self.env.address(), error = %error, "after_stop failed");
            }
        }
        if let Some(parent) = self.env.parent() {
            parent.remove_child(self.env.address());
        }
        self.stage.deregister(self.env.address());
        self.env.release_completes();
        debug!(address = %self.env.address(), name = self.env.name(), "stopped");
    }

    fn dead_letter(&self, message: LocalMessage, why: &str) {
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
