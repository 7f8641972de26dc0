//! # Environment
//!
//! All per-actor runtime state shared beyond the drain task: address, mailbox
//! and dispatcher, children, supervisor reference, proxy cache, the pooled
//! completes-eventually channel, and the atomic `secured`/`stopped`/stowing
//! flags. The parent edge is weak: it records the relation without ever
//! extending the parent's lifetime.
//!
//! Everything mutable here is either atomic or behind a short internal mutex
//! that is never held across user hooks; the children list and proxy cache
//! are only touched under the single-invocation-in-flight guarantee.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::mpsc;

use crate::address::Address;
use crate::completes::CompletesEventually;
use crate::lifecycle::{ActorHandle, Control};
use crate::mailbox::{Dispatcher, Mailbox};
use crate::supervision::Supervisor;

pub struct Environment {
    address: Address,
    name: String,
    mailbox: Arc<dyn Mailbox>,
    dispatcher: Arc<dyn Dispatcher>,
    maybe_supervisor: Option<Arc<dyn Supervisor>>,
    parent: Option<Weak<Environment>>,
    control: mpsc::UnboundedSender<Control>,
    children: Mutex<Vec<ActorHandle>>,
    proxy_cache: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    completes: Mutex<Option<CompletesEventually>>,
    stowage_overrides: Mutex<Vec<&'static str>>,
    secured: AtomicBool,
    stopped: AtomicBool,
    stowing: AtomicBool,
    dispersing: AtomicBool,
    disperse_requested: AtomicBool,
}

impl Environment {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        address: Address,
        name: String,
        mailbox: Arc<dyn Mailbox>,
        dispatcher: Arc<dyn Dispatcher>,
        maybe_supervisor: Option<Arc<dyn Supervisor>>,
        parent: Option<Weak<Environment>>,
        control: mpsc::UnboundedSender<Control>,
    ) -> Self {
        Self {
            address,
            name,
            mailbox,
            dispatcher,
            maybe_supervisor,
            parent,
            control,
            children: Mutex::new(Vec::new()),
            proxy_cache: Mutex::new(HashMap::new()),
            completes: Mutex::new(None),
            stowage_overrides: Mutex::new(Vec::new()),
            secured: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            stowing: AtomicBool::new(false),
            dispersing: AtomicBool::new(false),
            disperse_requested: AtomicBool::new(false),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn is_secured(&self) -> bool {
        self.secured.load(Ordering::SeqCst)
    }

    pub(crate) fn mailbox(&self) -> Arc<dyn Mailbox> {
        self.mailbox.clone()
    }

    pub(crate) fn dispatcher(&self) -> Arc<dyn Dispatcher> {
        self.dispatcher.clone()
    }

    pub(crate) fn supervisor(&self) -> Option<Arc<dyn Supervisor>> {
        self.maybe_supervisor.clone()
    }

    pub(crate) fn parent(&self) -> Option<Arc<Environment>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn control(&self) -> mpsc::UnboundedSender<Control> {
        self.control.clone()
    }

    pub(crate) fn set_secured(&self) {
        self.secured.store(true, Ordering::SeqCst);
    }

    /// Flags the actor stopped; answers whether this call won the transition.
    pub(crate) fn mark_stopped(&self) -> bool {
        self.stopped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    // ---- children -------------------------------------------------------

    pub(crate) fn add_child(&self, child: ActorHandle) {
        self.children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(child);
    }

    pub(crate) fn remove_child(&self, address: &Address) {
        self.children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|child| child.address() != address);
    }

    /// Requests a stop for every child; the list is drained so the handles
    /// are released.
    pub(crate) fn stop_children(&self) {
        let children = std::mem::take(
            &mut *self
                .children
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for child in children {
            child.stop();
        }
    }

    // ---- proxy cache ----------------------------------------------------

    pub(crate) fn cache_proxy<P: Send + Sync + 'static>(&self, proxy: P) {
        self.proxy_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<P>(), Box::new(proxy));
    }

    pub(crate) fn lookup_proxy<P: Clone + 'static>(&self) -> Option<P> {
        self.proxy_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&TypeId::of::<P>())
            .and_then(|cached| cached.downcast_ref::<P>())
            .cloned()
    }

    // ---- completes-eventually pool --------------------------------------

    pub(crate) fn cached_completes(&self) -> Option<CompletesEventually> {
        self.completes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn cache_completes(&self, completes: CompletesEventually) {
        *self
            .completes
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(completes);
    }

    /// Concludes and releases the pooled channel, if one was ever requested.
    pub(crate) fn release_completes(&self) {
        let pooled = self
            .completes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(completes) = pooled {
            if !completes.is_stopped() {
                completes.conclude();
            }
        }
    }

    // ---- stowing / dispersing -------------------------------------------

    pub(crate) fn begin_stowing(&self, overrides: &[&'static str]) {
        *self
            .stowage_overrides
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = overrides.to_vec();
        self.stowing.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_stowing(&self) -> bool {
        self.stowing.load(Ordering::SeqCst)
    }

    pub(crate) fn is_stowage_override(&self, protocol: &str) -> bool {
        self.stowage_overrides
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|candidate| *candidate == protocol)
    }

    pub(crate) fn request_dispersal(&self) {
        self.stowing.store(false, Ordering::SeqCst);
        self.disperse_requested.store(true, Ordering::SeqCst);
    }

    pub(crate) fn take_disperse_request(&self) -> bool {
        self.disperse_requested.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn set_dispersing(&self, dispersing: bool) {
        self.dispersing.store(dispersing, Ordering::SeqCst);
    }

    pub(crate) fn is_dispersing(&self) -> bool {
        self.dispersing.load(Ordering::SeqCst)
    }
}
