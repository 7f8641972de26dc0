//! # Stage
//!
//! The stage owns everything shared across actors: the address factory, the
//! mailbox provider registry, the actor directory, the scheduler, and the
//! dead-letters actor at the reserved address. Actors are created from a
//! [`Definition`]; the definition's factory is kept so supervision can
//! rebuild the state on a restart decision.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::actor::{Actor, Context, Instance};
use crate::address::{Address, AddressFactory, DEAD_LETTERS_ID};
use crate::completes::{CompletesEventually, CompletesEventuallyActor, CompletionSink};
use crate::concurrent_queue::ConcurrentQueueMailboxProvider;
use crate::dead_letters::{DeadLetters, DeadLettersActor};
use crate::environment::Environment;
use crate::error::{ActorError, FailureReason};
use crate::lifecycle::{ActorHandle, LifeCycle};
use crate::mailbox::{MailboxProvider, MailboxProviderRegistry};
use crate::proxy::Proxy;
use crate::scheduler::Scheduler;
use crate::supervision::Supervisor;

/// Stage-wide tunables.
#[derive(Clone, Debug)]
pub struct StageConfig {
    /// How many supervisor hops a single failure episode may climb before
    /// the failed actor is stopped outright.
    pub escalation_limit: u32,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            escalation_limit: 5,
        }
    }
}

impl StageConfig {
    pub fn with_escalation_limit(mut self, escalation_limit: u32) -> Self {
        self.escalation_limit = escalation_limit;
        self
    }
}

/// Everything needed to create (and re-create) one actor.
pub struct Definition<A: Actor> {
    factory: Arc<dyn Fn() -> Result<A, FailureReason> + Send + Sync>,
    name: Option<String>,
    mailbox_name: Option<String>,
    supervisor: Option<Arc<dyn Supervisor>>,
    address: Option<Address>,
}

impl<A: Actor> Definition<A> {
    /// A definition from a fallible state factory. The factory is called
    /// once per construction and once per restart.
    pub fn of<F>(factory: F) -> Self
    where
        F: Fn() -> Result<A, FailureReason> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            name: None,
            mailbox_name: None,
            supervisor: None,
            address: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Routes the actor's messages through the named mailbox provider
    /// instead of the stage default.
    pub fn with_mailbox(mut self, name: impl Into<String>) -> Self {
        self.mailbox_name = Some(name.into());
        self
    }

    pub fn supervised_by(mut self, supervisor: Arc<dyn Supervisor>) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    /// Pins the actor to a pre-assigned address.
    pub fn at(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }
}

struct StageInner {
    name: String,
    config: StageConfig,
    address_factory: AddressFactory,
    providers: MailboxProviderRegistry,
    directory: Mutex<HashMap<i64, ActorHandle>>,
    dead_letters: Mutex<Option<DeadLetters>>,
    scheduler: Scheduler,
    terminated: AtomicBool,
}

/// Cloneable handle on the runtime. All clones share one stage.
#[derive(Clone)]
pub struct Stage {
    inner: Arc<StageInner>,
}

impl Stage {
    pub async fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, StageConfig::default()).await
    }

    pub async fn with_config(name: impl Into<String>, config: StageConfig) -> Self {
        let inner = Arc::new(StageInner {
            name: name.into(),
            config,
            address_factory: AddressFactory::new(),
            providers: MailboxProviderRegistry::new(),
            directory: Mutex::new(HashMap::new()),
            dead_letters: Mutex::new(None),
            scheduler: Scheduler::new(),
            terminated: AtomicBool::new(false),
        });
        let stage = Self { inner };
        stage.inner.providers.register(
            Arc::new(ConcurrentQueueMailboxProvider::new()),
            true,
        );

        let definition = Definition::of(|| Ok(DeadLettersActor::default()))
            .named("dead-letters")
            .at(Address::none());
        match stage.spawn_with_parent(definition, None).await {
            Ok(proxy) => {
                let dead_letters = DeadLetters::new(proxy);
                *stage
                    .inner
                    .dead_letters
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(dead_letters);
            }
            Err(fault) => {
                error!(error = %fault, "dead-letters actor failed to start");
            }
        }
        info!(stage = %stage.inner.name, "stage started");
        stage
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn address_factory(&self) -> &AddressFactory {
        &self.inner.address_factory
    }

    pub fn scheduler(&self) -> Scheduler {
        self.inner.scheduler.clone()
    }

    pub fn dead_letters(&self) -> Option<DeadLetters> {
        self.inner
            .dead_letters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.terminated.load(Ordering::SeqCst)
    }

    /// The number of live actors, the dead-letters actor included.
    pub fn actor_count(&self) -> usize {
        self.inner
            .directory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn register_mailbox_provider(
        &self,
        provider: Arc<dyn MailboxProvider>,
        is_default: bool,
    ) {
        self.inner.providers.register(provider, is_default);
    }

    /// Creates a top-level actor. `before_start` runs inside this call; its
    /// failure is a construction failure and the actor is never registered.
    pub async fn actor_for<A: Actor>(
        &self,
        definition: Definition<A>,
    ) -> Result<Proxy<A>, ActorError> {
        self.spawn_with_parent(definition, None).await
    }

    /// A fresh, unpooled deferred-result channel targeted at `sink`.
    pub async fn completes_for(
        &self,
        sink: Box<dyn CompletionSink>,
    ) -> Result<CompletesEventually, ActorError> {
        let address = self
            .inner
            .address_factory
            .with_high_id_named("completes-eventually");
        let definition = Definition::of(|| Ok(CompletesEventuallyActor::default())).at(address);
        let proxy = self.spawn_with_parent(definition, None).await?;
        let completes = CompletesEventually::new(proxy);
        completes.retarget(sink);
        Ok(completes)
    }

    /// Stops every actor and refuses further creation. The dead-letters
    /// actor is stopped after the rest so late reports still land.
    pub async fn terminate(&self) {
        if self.inner.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(stage = %self.inner.name, "terminating");
        self.inner.scheduler.close();
        let handles: Vec<ActorHandle> = {
            let mut directory = self
                .inner
                .directory
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            directory.drain().map(|(_, handle)| handle).collect()
        };
        let (dead_letters, rest): (Vec<_>, Vec<_>) = handles
            .into_iter()
            .partition(|handle| handle.address().id() == DEAD_LETTERS_ID);
        for handle in rest {
            handle.stop();
        }
        for handle in dead_letters {
            handle.stop();
        }
    }

    pub(crate) fn deregister(&self, address: &Address) {
        self.inner
            .directory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&address.id());
    }

    pub(crate) async fn spawn_with_parent<A: Actor>(
        &self,
        definition: Definition<A>,
        parent: Option<Arc<Environment>>,
    ) -> Result<Proxy<A>, ActorError> {
        if self.is_terminated() {
            return Err(ActorError::StageTerminated);
        }
        let Definition {
            factory,
            name,
            mailbox_name,
            supervisor,
            address,
        } = definition;

        let address = match address {
            Some(address) => address,
            None => match &name {
                Some(name) => self.inner.address_factory.unique_with(name),
                None => self
                    .inner
                    .address_factory
                    .unique_prefixed_with(short_type_name::<A>()),
            },
        };
        let name = match name {
            Some(name) => name,
            None => address
                .name()
                .unwrap_or(short_type_name::<A>())
                .to_string(),
        };
        let assignment = self
            .inner
            .providers
            .assignment_for(mailbox_name.as_deref(), address.id().unsigned_abs())?;

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let env = Arc::new(Environment::new(
            address.clone(),
            name.clone(),
            assignment.mailbox,
            assignment.dispatcher,
            supervisor,
            parent.as_ref().map(Arc::downgrade),
            control_tx.clone(),
        ));

        let state = (factory)().map_err(ActorError::ConstructionFailed)?;
        let mut instance = Box::new(Instance::new(state, Context::new(env.clone(), self.clone())));
        {
            let Instance { state, context } = &mut *instance;
            if let Err(reason) = state.before_start(context).await {
                return Err(ActorError::ConstructionFailed(reason));
            }
        }

        let handle = ActorHandle::new(address.clone(), control_tx);
        self.inner
            .directory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address.id(), handle.clone());
        if let Some(parent) = &parent {
            parent.add_child(handle);
        }

        let dead_letters = self.dead_letters();
        let lifecycle = LifeCycle::new(
            env.clone(),
            self.clone(),
            instance,
            factory,
            control_rx,
            dead_letters.clone(),
            self.inner.config.escalation_limit,
        );
        tokio::spawn(lifecycle.run());
        debug!(
            address = %address,
            name = %name,
            preallocated = env.mailbox().is_preallocated(),
            "actor registered"
        );
        Ok(Proxy::new(env, dead_letters))
    }
}

fn short_type_name<A>() -> &'static str {
    let full = std::any::type_name::<A>();
    full.rsplit("::").next().unwrap_or(full)
}
