//! # Supervision
//!
//! When an invocation answers a failure, the actor's life cycle suspends the
//! actor and informs its [`Supervisor`] with the reason and a [`Supervised`]
//! handle. The supervisor commands the outcome through the handle; the
//! decision travels back on the actor's control channel and is applied by the
//! actor's own drain task, so no lock is ever held while user hooks run.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::error;

use crate::address::Address;
use crate::error::FailureReason;
use crate::lifecycle::Control;

/// The supervisor's command for a failed actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Directive {
    /// Keep the current state; run `before_resume` and re-deliver suspended
    /// messages.
    Resume,
    /// Rebuild the actor from its definition; run the restart hooks around
    /// the reconstruction.
    Restart,
    /// Stop the actor and its subtree; the failure is not retried.
    Stop,
    /// Forward the failure to the supervisor's own supervisor.
    Escalate,
}

/// Handle on a failed actor, given to its supervisor.
#[derive(Clone)]
pub struct Supervised {
    address: Address,
    control: mpsc::UnboundedSender<Control>,
}

impl Supervised {
    pub(crate) fn new(address: Address, control: mpsc::UnboundedSender<Control>) -> Self {
        Self { address, control }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn resume(&self) {
        self.decide(Directive::Resume);
    }

    pub fn restart(&self) {
        self.decide(Directive::Restart);
    }

    pub fn stop(&self) {
        self.decide(Directive::Stop);
    }

    pub fn escalate(&self) {
        self.decide(Directive::Escalate);
    }

    fn decide(&self, directive: Directive) {
        // a send failure means the actor is already gone; nothing to decide
        let _ = self.control.send(Control::Decided(directive));
    }
}

/// The policy-holder deciding resume/restart/stop/escalate on actor failure.
pub trait Supervisor: Send + Sync {
    /// Informed of a failure; expected to command exactly one outcome on the
    /// supervised handle. The handle may be kept and decided later.
    fn inform(&self, reason: &FailureReason, supervised: Supervised);

    /// The supervisor's own supervisor, the target of escalation.
    fn parent(&self) -> Option<Arc<dyn Supervisor>> {
        None
    }
}

/// Default policy when no supervisor is configured: log and stop.
pub struct DefaultSupervisor;

impl Supervisor for DefaultSupervisor {
    fn inform(&self, reason: &FailureReason, supervised: Supervised) {
        error!(address = %supervised.address(), error = %reason, "Unsupervised failure; stopping");
        supervised.stop();
    }
}
