//! The actor system: spawn, route, supervise, and shut down.
//!
//! The public [`ActorSystem`] is a thin `Arc` wrapper around [`SystemCore`],
//! which owns every subsystem: the directory, the correlation manager, the
//! supervision tree, the actor table, the dead-letter sink, the event hub,
//! and the scheduler actor's state. Weak [`SystemHandle`]s break the cycle
//! between the core and the dependencies captured inside handlers.

// Layer 1: Standard library imports
use std::any::Any;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

// Layer 2: Third-party crate imports
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

// Layer 3: Internal module imports
use super::config::SystemConfig;
use super::dead_letter::{DeadLetterReason, DeadLetterSink};
use super::errors::SystemError;
use super::events::{
    EventHub, EventSubscription, SystemEvent, SystemEventKind, SystemEventListener,
};
use super::handle::SystemHandle;
use super::options::SpawnOptions;
use crate::actor::{ActorInstance, ActorSnapshot, ActorState, Dependencies};
use crate::behavior::{
    AskInstruction, Behavior, DeliveryMode, HandlerError, HandlerParams, HandlerResult,
    Instruction, MessagePlan,
};
use crate::correlation::{AskError, CorrelationManager};
use crate::directory::{BroadcastHook, Directory, DirectoryEvent, NoopBroadcast};
use crate::mailbox::EnqueueVerdict;
use crate::message::{DomainEvent, Envelope, EventFilter, Message};
use crate::scheduler::{
    scheduler_behavior, SchedulerReply, SchedulerState, ScheduleOnce, ScheduleRecurring,
    CANCEL_SCHEDULE, CLEANUP, SCHEDULE_ONCE, SCHEDULE_RECURRING, SCHEDULER_ACTOR_ID,
    SCHEDULER_ACTOR_TYPE,
};
use crate::scheduler::CancelSchedule;
use crate::supervisor::node::NodeDecision;
use crate::supervisor::{
    FailureOutcome, SupervisionDecision, SupervisionStrategy, SupervisionTree, SupervisorNode,
};
use crate::util::{Address, ScheduleId, SharedClock, SupervisorId, SystemClock};

/// Message kind carrying a [`SystemEvent`] to the event actor.
const SYSTEM_EVENT_KIND: &str = "$system.event";

/// Message kind for the janitor's periodic sweep tick.
const JANITOR_SWEEP: &str = "janitor.sweep";

/// Reserved id of the event actor.
const EVENTS_ACTOR_ID: &str = "events";

/// Reserved id of the janitor actor.
const JANITOR_ACTOR_ID: &str = "janitor";

/// Entries retained by the dead-letter ring.
const DEAD_LETTER_RING: usize = 256;

/// Poll interval of `flush` and the shutdown drain.
const FLUSH_POLL: Duration = Duration::from_millis(5);

/// Lifecycle of the whole system, mirroring the actor lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Parameters for an extra supervisor node.
///
/// Unset throttling fields fall back to the system's supervision config.
#[derive(Debug, Clone)]
pub struct SupervisorSpec {
    pub name: String,
    pub strategy: SupervisionStrategy,
    pub max_restarts: Option<u32>,
    pub restart_window: Option<Duration>,
    pub restart_delay: Option<Duration>,
}

impl SupervisorSpec {
    pub fn new(name: impl Into<String>, strategy: SupervisionStrategy) -> Self {
        Self {
            name: name.into(),
            strategy,
            max_restarts: None,
            restart_window: None,
            restart_delay: None,
        }
    }

    pub fn with_max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = Some(max_restarts);
        self
    }

    pub fn with_restart_window(mut self, window: Duration) -> Self {
        self.restart_window = Some(window);
        self
    }

    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = Some(delay);
        self
    }
}

type ShutdownHook = Box<dyn FnOnce() -> Result<(), Box<dyn StdError + Send + Sync>> + Send>;

struct ActorCell {
    instance: Arc<ActorInstance>,
    task: Mutex<Option<JoinHandle<()>>>,
    internal: bool,
}

pub(crate) struct SystemCore {
    pub(crate) config: SystemConfig,
    state: RwLock<SystemState>,
    pub(crate) clock: SharedClock,
    pub(crate) directory: Arc<Directory>,
    pub(crate) correlations: Arc<CorrelationManager>,
    supervision: Mutex<SupervisionTree>,
    actors: RwLock<HashMap<String, Arc<ActorCell>>>,
    pub(crate) dead_letters: Arc<DeadLetterSink>,
    pub(crate) events: Arc<EventHub>,
    scheduler_state: RwLock<Option<Arc<SchedulerState>>>,
    scheduler_address: RwLock<Option<Address>>,
    janitor_address: RwLock<Option<Address>>,
    shutdown_hooks: Mutex<Vec<ShutdownHook>>,
    local_location: String,
    weak_self: Weak<SystemCore>,
}

/// The root coordinator of the runtime.
///
/// # Examples
///
/// ```rust,no_run
/// use lattice_rt::behavior::{Behavior, HandlerResult};
/// use lattice_rt::system::{ActorSystem, SpawnOptions, SystemConfig};
/// use lattice_rt::message::Message;
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let system = ActorSystem::new(SystemConfig::default())?;
/// system.start().await?;
///
/// let counter = Behavior::with_context(json!({ "count": 0 }), |params| async move {
///     let count = params.context["count"].as_i64().unwrap_or(0);
///     match params.message.kind() {
///         "INCREMENT" => Ok(HandlerResult::context(json!({ "count": count + 1 }))),
///         "GET_COUNT" => Ok(HandlerResult::reply(json!({ "count": count }))),
///         _ => Ok(HandlerResult::unchanged()),
///     }
/// });
///
/// let address = system.spawn(counter, SpawnOptions::new()).await?;
/// system.send(&address, Message::of("INCREMENT")).await;
/// let reply = system.ask(&address, Message::of("GET_COUNT"), None).await?;
/// assert_eq!(reply["count"], 1);
///
/// system.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct ActorSystem {
    core: Arc<SystemCore>,
}

impl Clone for ActorSystem {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl ActorSystem {
    /// Create a system with the default clock and no peer broadcast.
    pub fn new(config: SystemConfig) -> Result<Self, SystemError> {
        Self::with_parts(config, Arc::new(NoopBroadcast), Arc::new(SystemClock))
    }

    /// Create a system with a cluster broadcast hook.
    pub fn with_broadcast(
        config: SystemConfig,
        broadcast: Arc<dyn BroadcastHook>,
    ) -> Result<Self, SystemError> {
        Self::with_parts(config, broadcast, Arc::new(SystemClock))
    }

    /// Create a system with explicit broadcast hook and clock.
    pub fn with_parts(
        config: SystemConfig,
        broadcast: Arc<dyn BroadcastHook>,
        clock: SharedClock,
    ) -> Result<Self, SystemError> {
        config
            .validate()
            .map_err(|reason| SystemError::InvalidConfiguration { reason })?;

        let supervision = &config.supervision;
        let root = SupervisorNode::new(
            "root",
            supervision.strategy,
            supervision.max_restarts,
            supervision.restart_window,
            supervision.restart_delay,
        );
        let local_location = format!("local://{}", config.node_address);

        let core = Arc::new_cyclic(|weak| SystemCore {
            weak_self: weak.clone(),
            directory: Arc::new(Directory::new(
                config.directory.cache_ttl,
                config.directory.max_cache_size,
                broadcast,
                Arc::clone(&clock),
            )),
            correlations: Arc::new(CorrelationManager::new(Arc::clone(&clock))),
            supervision: Mutex::new(SupervisionTree::new(root)),
            actors: RwLock::new(HashMap::new()),
            dead_letters: Arc::new(DeadLetterSink::new(DEAD_LETTER_RING)),
            events: Arc::new(EventHub::new()),
            scheduler_state: RwLock::new(None),
            scheduler_address: RwLock::new(None),
            janitor_address: RwLock::new(None),
            shutdown_hooks: Mutex::new(Vec::new()),
            state: RwLock::new(SystemState::Idle),
            local_location,
            clock,
            config,
        });

        Ok(Self { core })
    }

    /// The system configuration.
    pub fn config(&self) -> &SystemConfig {
        &self.core.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SystemState {
        *self.core.state.read()
    }

    pub fn is_running(&self) -> bool {
        self.state() == SystemState::Running
    }

    /// A weak handle for use inside handlers, timers, and subscribers.
    pub fn handle(&self) -> SystemHandle {
        SystemHandle::new(&self.core)
    }

    /// The directory (for stats, listing, and subscriptions).
    pub fn directory(&self) -> &Arc<Directory> {
        &self.core.directory
    }

    /// The dead-letter sink.
    pub fn dead_letters(&self) -> &Arc<DeadLetterSink> {
        &self.core.dead_letters
    }

    /// Number of asks currently awaiting a reply.
    pub fn pending_asks(&self) -> usize {
        self.core.correlations.pending_count()
    }

    /// Number of live actors, including the runtime's internal ones.
    pub fn actor_count(&self) -> usize {
        self.core.actors.read().len()
    }

    /// Bring the system to `Running`: directory bridge, event actor,
    /// scheduler actor, janitor sweeps. Idempotent once running.
    pub async fn start(&self) -> Result<(), SystemError> {
        let core = &self.core;
        {
            let mut state = core.state.write();
            match *state {
                SystemState::Running => return Ok(()),
                SystemState::Idle => *state = SystemState::Starting,
                other => {
                    return Err(SystemError::CannotStart {
                        state: other.to_string(),
                    })
                }
            }
        }

        // Directory notifications are republished on the system event stream.
        let bridge = self.handle();
        core.directory.subscribe(Box::new(move |event| {
            let kind = match event {
                DirectoryEvent::Registered { address, location } => {
                    SystemEventKind::DirectoryRegistered {
                        path: address.path().to_string(),
                        location: location.clone(),
                    }
                }
                DirectoryEvent::Unregistered { address } => SystemEventKind::DirectoryUnregistered {
                    path: address.path().to_string(),
                },
            };
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.publish(kind).await });
            Ok(())
        }));

        let events_addr = core
            .spawn_with(
                event_behavior(Arc::clone(&core.events)),
                SpawnOptions::new()
                    .with_id(EVENTS_ACTOR_ID)
                    .with_actor_type(SCHEDULER_ACTOR_TYPE),
                true,
                None,
            )
            .await?;
        core.events.set_event_actor(Some(events_addr));

        let scheduler_state = SchedulerState::new(self.handle(), Arc::clone(&core.clock));
        let scheduler_addr = core
            .spawn_with(
                scheduler_behavior(Arc::clone(&scheduler_state)),
                SpawnOptions::new()
                    .with_id(SCHEDULER_ACTOR_ID)
                    .with_actor_type(SCHEDULER_ACTOR_TYPE),
                true,
                None,
            )
            .await?;
        *core.scheduler_state.write() = Some(Arc::clone(&scheduler_state));
        *core.scheduler_address.write() = Some(scheduler_addr);

        let janitor_addr = core
            .spawn_with(
                janitor_behavior(
                    Arc::clone(&core.directory),
                    Arc::clone(&core.correlations),
                    self.handle(),
                ),
                SpawnOptions::new()
                    .with_id(JANITOR_ACTOR_ID)
                    .with_actor_type(SCHEDULER_ACTOR_TYPE),
                true,
                None,
            )
            .await?;
        *core.janitor_address.write() = Some(janitor_addr.clone());

        scheduler_state
            .schedule_recurring(ScheduleRecurring {
                interval: core.config.directory.cleanup_interval,
                target: janitor_addr,
                message: Message::of(JANITOR_SWEEP),
            })
            .map_err(|reason| SystemError::Scheduler { reason })?;

        *core.state.write() = SystemState::Running;
        debug!(node = core.config.node_address, "actor system running");
        Ok(())
    }

    /// Spawn an actor under the root supervisor (or the one named in the
    /// options).
    pub async fn spawn(
        &self,
        behavior: Behavior,
        options: SpawnOptions,
    ) -> Result<Address, SystemError> {
        self.core.spawn_with(behavior, options, false, None).await
    }

    /// Fire a message at an address. Never fails: undeliverable messages go
    /// to the dead-letter sink and raise a `deadLetter` event.
    pub async fn send(&self, to: &Address, message: Message) {
        self.core.send_from(to, message, None).await;
    }

    /// Ask an address and await its reply.
    ///
    /// `timeout: None` uses the configured default. A dead or unknown target
    /// fails the ask by timeout.
    pub async fn ask(
        &self,
        to: &Address,
        message: Message,
        timeout: Option<Duration>,
    ) -> Result<Value, AskError> {
        self.core.ask_from(to, message, timeout, None).await
    }

    /// Subscribe a callback to the system event stream.
    pub fn subscribe_system_events(
        &self,
        filter: EventFilter,
        listener: SystemEventListener,
    ) -> EventSubscription {
        self.core.events.subscribe(filter, listener)
    }

    /// Subscribe an actor address to the system event stream; matching
    /// events arrive in its mailbox as messages.
    pub fn subscribe_system_events_address(&self, address: Address, filter: EventFilter) {
        self.core.events.subscribe_address(address, filter);
    }

    /// Remove an address subscription from the system event stream.
    pub fn unsubscribe_system_events_address(&self, address: &Address) -> bool {
        self.core.events.unsubscribe_address(address)
    }

    /// Subscribe `subscriber` to the domain events `publisher` emits.
    pub async fn subscribe(
        &self,
        publisher: &Address,
        subscriber: Address,
        filter: EventFilter,
    ) -> Result<(), SystemError> {
        let cell = self.core.cell(publisher).ok_or(SystemError::ActorNotFound {
            path: publisher.path().to_string(),
        })?;
        cell.instance.subscribe(subscriber.clone(), filter);
        self.core
            .publish_event(SystemEventKind::Subscribe {
                publisher: publisher.path().to_string(),
                subscriber: subscriber.path().to_string(),
            })
            .await;
        Ok(())
    }

    /// Remove `subscriber` from `publisher`'s subscriber set.
    pub async fn unsubscribe(
        &self,
        publisher: &Address,
        subscriber: &Address,
    ) -> Result<(), SystemError> {
        let cell = self.core.cell(publisher).ok_or(SystemError::ActorNotFound {
            path: publisher.path().to_string(),
        })?;
        if cell.instance.unsubscribe(subscriber) {
            self.core
                .publish_event(SystemEventKind::Unsubscribe {
                    publisher: publisher.path().to_string(),
                    subscriber: subscriber.path().to_string(),
                })
                .await;
        }
        Ok(())
    }

    /// Read-only snapshot of an actor's state, context, and counters.
    pub fn snapshot(&self, address: &Address) -> Option<ActorSnapshot> {
        self.core.cell(address).map(|cell| cell.instance.snapshot())
    }

    /// Add a supervisor node under `parent` (the root when `None`).
    pub fn add_supervisor(
        &self,
        spec: SupervisorSpec,
        parent: Option<&str>,
    ) -> Result<(), SystemError> {
        let defaults = &self.core.config.supervision;
        let node = SupervisorNode::new(
            spec.name,
            spec.strategy,
            spec.max_restarts.unwrap_or(defaults.max_restarts),
            spec.restart_window.unwrap_or(defaults.restart_window),
            spec.restart_delay.unwrap_or(defaults.restart_delay),
        );

        let mut tree = self.core.supervision.lock();
        let parent_id = match parent {
            None => tree.root_id(),
            Some(name) => tree
                .find_by_name(name)
                .ok_or_else(|| SystemError::SupervisorNotFound {
                    name: name.to_string(),
                })?,
        };
        tree.attach_child(parent_id, node)?;
        Ok(())
    }

    /// Schedule a one-shot delivery through the scheduler actor.
    pub async fn schedule_once(
        &self,
        delay: Duration,
        target: Address,
        message: Message,
    ) -> Result<ScheduleId, SystemError> {
        let command = ScheduleOnce {
            delay,
            target,
            message,
        };
        let reply = self
            .scheduler_request(Message::encode(SCHEDULE_ONCE, &command).map_err(|err| {
                SystemError::Scheduler {
                    reason: err.to_string(),
                }
            })?)
            .await?;
        match reply {
            SchedulerReply::Created { schedule_id } => Ok(schedule_id),
            SchedulerReply::Error { reason } => Err(SystemError::Scheduler { reason }),
            other => Err(SystemError::Scheduler {
                reason: format!("unexpected scheduler reply: {other:?}"),
            }),
        }
    }

    /// Schedule a periodic delivery through the scheduler actor.
    pub async fn schedule_recurring(
        &self,
        interval: Duration,
        target: Address,
        message: Message,
    ) -> Result<ScheduleId, SystemError> {
        let command = ScheduleRecurring {
            interval,
            target,
            message,
        };
        let reply = self
            .scheduler_request(Message::encode(SCHEDULE_RECURRING, &command).map_err(|err| {
                SystemError::Scheduler {
                    reason: err.to_string(),
                }
            })?)
            .await?;
        match reply {
            SchedulerReply::Created { schedule_id } => Ok(schedule_id),
            SchedulerReply::Error { reason } => Err(SystemError::Scheduler { reason }),
            other => Err(SystemError::Scheduler {
                reason: format!("unexpected scheduler reply: {other:?}"),
            }),
        }
    }

    /// Cancel a schedule entry; already-fired entries cannot be recalled.
    pub async fn cancel_schedule(&self, schedule_id: ScheduleId) -> Result<(), SystemError> {
        let command = CancelSchedule { schedule_id };
        let reply = self
            .scheduler_request(Message::encode(CANCEL_SCHEDULE, &command).map_err(|err| {
                SystemError::Scheduler {
                    reason: err.to_string(),
                }
            })?)
            .await?;
        match reply {
            SchedulerReply::Cancelled { .. } => Ok(()),
            SchedulerReply::Error { reason } => Err(SystemError::Scheduler { reason }),
            other => Err(SystemError::Scheduler {
                reason: format!("unexpected scheduler reply: {other:?}"),
            }),
        }
    }

    /// Register a shutdown handler, run (in registration order) during
    /// `stop`. Errors are logged, never propagated.
    pub fn on_shutdown<F>(&self, hook: F)
    where
        F: FnOnce() -> Result<(), Box<dyn StdError + Send + Sync>> + Send + 'static,
    {
        self.core.shutdown_hooks.lock().push(Box::new(hook));
    }

    /// Reverse-topological drain: refuse new work, flush mailboxes up to the
    /// shutdown budget, tear actors down leaves-first, then the scheduler,
    /// correlation manager, and directory. Idempotent once stopped.
    pub async fn stop(&self) -> Result<(), SystemError> {
        let core = &self.core;
        {
            let mut state = core.state.write();
            match *state {
                SystemState::Stopped | SystemState::Stopping => return Ok(()),
                _ => *state = SystemState::Stopping,
            }
        }
        core.publish_event(SystemEventKind::Stopping).await;

        let deadline = Instant::now() + core.config.shutdown_timeout;
        core.flush_until(Some(deadline)).await;

        // User actors, leaves first.
        let order = { core.supervision.lock().cleanup_order() };
        for node_id in order {
            let supervised = { core.supervision.lock().supervised_by(node_id) };
            for address in supervised {
                core.stop_actor(&address, remaining(deadline)).await;
            }
        }
        // Anything unsupervised and not internal.
        let leftovers: Vec<Address> = core
            .actors
            .read()
            .values()
            .filter(|cell| !cell.internal)
            .map(|cell| cell.instance.address().clone())
            .collect();
        for address in leftovers {
            core.stop_actor(&address, remaining(deadline)).await;
        }

        // Scheduler teardown: cancel everything, then stop its actor.
        if let Some(address) = core.scheduler_address.read().clone() {
            core.deliver_internal(&address, Message::of(CLEANUP)).await;
        }
        if let Some(state) = core.scheduler_state.read().clone() {
            state.cleanup();
        }
        let janitor = core.janitor_address.write().take();
        if let Some(address) = janitor {
            core.stop_actor(&address, remaining(deadline)).await;
        }
        let scheduler = core.scheduler_address.write().take();
        if let Some(address) = scheduler {
            core.stop_actor(&address, remaining(deadline)).await;
        }
        *core.scheduler_state.write() = None;

        core.correlations.clear_all("actor system stopped");

        let events_actor = core.events.event_actor();
        core.events.set_event_actor(None);
        if let Some(address) = events_actor {
            core.stop_actor(&address, remaining(deadline)).await;
        }

        core.directory.teardown();

        let hooks: Vec<ShutdownHook> = core.shutdown_hooks.lock().drain(..).collect();
        for hook in hooks {
            if let Err(err) = hook() {
                error!(%err, "shutdown handler failed");
            }
        }

        *core.state.write() = SystemState::Stopped;
        core.publish_event(SystemEventKind::Stopped).await;
        debug!("actor system stopped");
        Ok(())
    }

    /// Test hook: block until every mailbox is drained, no handler is in
    /// flight, and the scheduler has no due entries.
    pub async fn flush(&self) {
        self.core.flush_until(None).await;
    }

    async fn scheduler_request(&self, message: Message) -> Result<SchedulerReply, SystemError> {
        let address = self
            .core
            .scheduler_address
            .read()
            .clone()
            .ok_or(SystemError::NotRunning)?;
        let reply = self.core.ask_from(&address, message, None, None).await?;
        serde_json::from_value(reply).map_err(|err| SystemError::Scheduler {
            reason: err.to_string(),
        })
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

impl SystemCore {
    fn is_running(&self) -> bool {
        *self.state.read() == SystemState::Running
    }

    fn cell(&self, address: &Address) -> Option<Arc<ActorCell>> {
        self.actors.read().get(address.path()).cloned()
    }

    pub(crate) fn dependencies_for(&self, address: &Address) -> Dependencies {
        Dependencies::new(
            address.clone(),
            SystemHandle::from_weak(self.weak_self.clone()),
            Arc::clone(&self.clock),
        )
    }

    /// Spawn an actor child-attached next to `parent` (used by
    /// `Dependencies::spawn_child`).
    pub(crate) async fn spawn_child_of(
        &self,
        parent: &Address,
        behavior: Behavior,
        options: SpawnOptions,
    ) -> Result<Address, SystemError> {
        self.spawn_with(behavior, options, false, Some(parent)).await
    }

    async fn spawn_with(
        &self,
        behavior: Behavior,
        options: SpawnOptions,
        internal: bool,
        parent_of: Option<&Address>,
    ) -> Result<Address, SystemError> {
        {
            let state = *self.state.read();
            let allowed = match state {
                SystemState::Running => true,
                SystemState::Starting => internal,
                _ => false,
            };
            if !allowed {
                return Err(SystemError::SpawnFailed {
                    id: options.id.clone().unwrap_or_default(),
                    reason: format!("actor system is {state}"),
                });
            }
        }

        let actor_type = options
            .actor_type
            .clone()
            .unwrap_or_else(|| "actor".to_string());
        let address = match options.id.clone() {
            Some(id) => Address::new(&self.config.node_address, &actor_type, id),
            None => Address::generate(&self.config.node_address, &actor_type),
        };
        let path = address.path().to_string();

        let capacity = options
            .mailbox_capacity
            .unwrap_or(self.config.mailbox_capacity);
        let overflow = options.overflow.unwrap_or(self.config.mailbox_overflow);

        let instance = Arc::new(ActorInstance::new(
            address.clone(),
            behavior,
            capacity,
            overflow,
            Arc::clone(&self.clock),
        ));
        let cell = Arc::new(ActorCell {
            instance: Arc::clone(&instance),
            task: Mutex::new(None),
            internal,
        });

        {
            let mut actors = self.actors.write();
            if actors.contains_key(&path) {
                return Err(SystemError::SpawnFailed {
                    id: address.id().to_string(),
                    reason: "id collision".to_string(),
                });
            }
            actors.insert(path.clone(), Arc::clone(&cell));
        }

        self.directory
            .register(address.clone(), self.local_location.clone());

        if !internal {
            let supervised: Result<(), SystemError> = {
                let mut tree = self.supervision.lock();
                let node_id = match (&options.supervisor, parent_of) {
                    (Some(name), _) => {
                        tree.find_by_name(name)
                            .ok_or_else(|| SystemError::SupervisorNotFound {
                                name: name.clone(),
                            })
                    }
                    (None, Some(parent)) => Ok(tree
                        .node_for_actor(parent.path())
                        .unwrap_or_else(|| tree.root_id())),
                    (None, None) => Ok(tree.root_id()),
                };
                node_id.and_then(|node_id| {
                    tree.supervise(node_id, address.clone())
                        .map_err(SystemError::from)
                })
            };
            if let Err(err) = supervised {
                self.actors.write().remove(&path);
                self.directory.unregister(&address);
                return Err(err);
            }
        }

        let deps = self.dependencies_for(&address);
        if let Err(err) = instance.start(deps).await {
            self.actors.write().remove(&path);
            self.directory.unregister(&address);
            {
                self.supervision.lock().unsupervise(&address);
            }
            return Err(SystemError::SpawnFailed {
                id: address.id().to_string(),
                reason: err.to_string(),
            });
        }

        let Some(core) = self.weak_self.upgrade() else {
            self.actors.write().remove(&path);
            self.directory.unregister(&address);
            return Err(SystemError::SpawnFailed {
                id: address.id().to_string(),
                reason: "actor system is gone".to_string(),
            });
        };
        let task = tokio::spawn(SystemCore::run_actor(core, Arc::clone(&instance)));
        *cell.task.lock() = Some(task);

        self.publish_event(SystemEventKind::ActorSpawned { path }).await;
        Ok(address)
    }

    /// The dispatch loop: one task per actor, strictly one message at a
    /// time; side effects of message N land before message N+1 starts.
    pub(crate) fn run_actor(
        core: Arc<SystemCore>,
        instance: Arc<ActorInstance>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(Self::run_actor_inner(core, instance))
    }

    async fn run_actor_inner(core: Arc<SystemCore>, instance: Arc<ActorInstance>) {
        let deps = core.dependencies_for(instance.address());
        loop {
            match instance.state() {
                ActorState::Stopping | ActorState::Stopped => break,
                ActorState::Error => {
                    instance.await_state_change(ActorState::Error).await;
                    continue;
                }
                _ => {}
            }

            let envelope = tokio::select! {
                envelope = instance.mailbox().dequeue() => envelope,
                _ = instance.state_changed() => continue,
            };
            let Some(envelope) = envelope else { break };

            // Reply envelopes are the correlation manager's, not the handler's.
            if envelope.message.is_reply() {
                match &envelope.correlation_id {
                    Some(token) => core
                        .correlations
                        .resolve(token, envelope.message.body().clone()),
                    None => warn!(
                        path = instance.address().path(),
                        "reply envelope without correlation token discarded"
                    ),
                }
                continue;
            }

            core.process_envelope(&instance, envelope, &deps).await;
        }

        // Whatever is still queued can no longer be processed.
        for envelope in instance.mailbox().clear() {
            core.dead_letter(
                instance.address().clone(),
                envelope,
                DeadLetterReason::MailboxClosed,
            )
            .await;
        }
        if let Err(err) = instance.finalize_stop(deps).await {
            warn!(path = instance.address().path(), %err, "stop hook failed");
        }
        core.publish_event(SystemEventKind::ActorStopped {
            path: instance.address().path().to_string(),
        })
        .await;
    }

    async fn process_envelope(
        &self,
        instance: &Arc<ActorInstance>,
        envelope: Envelope,
        deps: &Dependencies,
    ) {
        instance.set_processing(true);
        let current = instance.context();
        let (working, transition_event) = instance
            .behavior()
            .tick_machine(&current, envelope.message.kind());

        trace!(
            path = instance.address().path(),
            kind = envelope.message.kind(),
            "dispatch"
        );
        let params = HandlerParams {
            message: envelope.message.clone(),
            context: working.clone(),
            deps: deps.clone(),
            sender: envelope.sender.clone(),
            correlation_id: envelope.correlation_id.clone(),
        };
        let handler = instance.behavior().handle(params);
        let result = match AssertUnwindSafe(handler).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(HandlerError::Panicked {
                reason: panic_reason(panic),
            }),
        };

        match result {
            Ok(outcome) => {
                let (context, reply, events, plan) = split_outcome(outcome);
                let effective = context.unwrap_or(working);
                instance.set_context(instance.behavior().persist_context(effective));
                instance.counters().record_processed();

                if let Some(reply) = reply {
                    match &envelope.correlation_id {
                        Some(token) => self.correlations.resolve(token, reply),
                        None => {
                            if self.config.dev_mode {
                                warn!(
                                    path = instance.address().path(),
                                    kind = envelope.message.kind(),
                                    "reply returned for a message with no correlation token"
                                );
                            }
                        }
                    }
                }

                for event in transition_event.into_iter().chain(events) {
                    self.emit_from(instance.address(), event).await;
                }
                if let Some(plan) = plan {
                    self.execute_plan(instance.address(), plan).await;
                }
                instance.set_processing(false);
            }
            Err(err) => {
                instance.counters().record_error();
                instance.set_state(ActorState::Error);
                instance.set_processing(false);
                warn!(
                    path = instance.address().path(),
                    kind = envelope.message.kind(),
                    %err,
                    "handler failed"
                );
                self.handle_actor_failure(instance, err.to_string()).await;
            }
        }
    }

    async fn handle_actor_failure(&self, instance: &Arc<ActorInstance>, error: String) {
        let address = instance.address().clone();
        let path = address.path().to_string();
        let now = self.clock.now();

        let outcome = { self.supervision.lock().decide_failure(&path, now) };
        match outcome {
            FailureOutcome::Unsupervised => {
                warn!(path = %path, %error, "failure in unsupervised actor; resuming");
                instance.set_state(ActorState::Running);
            }
            FailureOutcome::AlreadyHandling => {
                debug!(path = %path, "failure while one is already being handled; ignored");
            }
            FailureOutcome::Apply {
                node,
                assigned,
                decision,
                exceeded_limit,
                restart_delay,
            } => match decision {
                SupervisionDecision::Resume => {
                    {
                        self.supervision.lock().end_handling(assigned, &path);
                    }
                    instance.set_state(ActorState::Running);
                }
                SupervisionDecision::Restart => {
                    {
                        self.supervision.lock().record_restart(node, &path, now);
                    }
                    instance.begin_stop();
                    match self.weak_self.upgrade() {
                        Some(core) => {
                            tokio::spawn(async move {
                                core.restart_actor(address, node, assigned, restart_delay)
                                    .await;
                            });
                        }
                        None => {
                            self.supervision.lock().end_handling(assigned, &path);
                        }
                    }
                }
                SupervisionDecision::Stop => {
                    if exceeded_limit {
                        let restarts = {
                            self.supervision
                                .lock()
                                .node(node)
                                .map(|n| n.max_restarts())
                                .unwrap_or(0)
                        };
                        self.publish_event(SystemEventKind::ExceededRestartLimit {
                            path: path.clone(),
                            restarts,
                        })
                        .await;
                    }
                    self.publish_event(SystemEventKind::ActorStopping {
                        path: path.clone(),
                    })
                    .await;
                    {
                        let mut tree = self.supervision.lock();
                        tree.end_handling(assigned, &path);
                        tree.unsupervise(&address);
                    }
                    self.directory.unregister(&address);
                    self.actors.write().remove(&path);
                    instance.begin_stop();
                }
            },
            FailureOutcome::Unhandled {
                assigned,
                supervisor_path,
            } => {
                {
                    self.supervision.lock().end_handling(assigned, &path);
                }
                error!(path = %path, %error, "unhandled supervisor failure");
                self.publish_event(SystemEventKind::UnhandledFailure {
                    actor_path: path,
                    error,
                    supervisor_path,
                })
                .await;
            }
        }
    }

    /// Replace a failed actor with a fresh instance from its initial
    /// context, honoring the restart delay and the restart budget.
    async fn restart_actor(
        self: Arc<Self>,
        address: Address,
        deciding: SupervisorId,
        assigned: SupervisorId,
        delay: Duration,
    ) {
        let path = address.path().to_string();
        let Some(old_cell) = self.cell(&address) else {
            self.supervision.lock().end_handling(assigned, &path);
            return;
        };
        old_cell.instance.await_stopped().await;

        let behavior = old_cell.instance.behavior().clone();
        let capacity = old_cell.instance.mailbox().capacity();
        let policy = old_cell.instance.mailbox().policy();

        loop {
            tokio::time::sleep(delay).await;
            if !self.is_running() {
                break;
            }

            let instance = Arc::new(ActorInstance::new(
                address.clone(),
                behavior.clone(),
                capacity,
                policy,
                Arc::clone(&self.clock),
            ));
            let deps = self.dependencies_for(&address);
            match instance.start(deps).await {
                Ok(()) => {
                    let cell = Arc::new(ActorCell {
                        instance: Arc::clone(&instance),
                        task: Mutex::new(None),
                        internal: old_cell.internal,
                    });
                    self.actors.write().insert(path.clone(), Arc::clone(&cell));
                    self.directory
                        .refresh(address.clone(), self.local_location.clone());

                    let task = tokio::spawn(SystemCore::run_actor(
                        Arc::clone(&self),
                        Arc::clone(&instance),
                    ));
                    *cell.task.lock() = Some(task);

                    let restarts = {
                        let mut tree = self.supervision.lock();
                        tree.node_mut(deciding)
                            .map(|n| n.restart_count(&path, self.clock.now()))
                            .unwrap_or(0)
                    };
                    self.publish_event(SystemEventKind::ActorRestarted {
                        path: path.clone(),
                        restarts,
                    })
                    .await;
                    break;
                }
                Err(err) => {
                    warn!(path = %path, %err, "restarted actor failed to start");
                    let now = self.clock.now();
                    let next = {
                        let mut tree = self.supervision.lock();
                        match tree.node_mut(deciding).map(|n| n.decide(&path, now)) {
                            Some(NodeDecision::Apply {
                                decision: SupervisionDecision::Restart,
                                ..
                            }) => {
                                tree.record_restart(deciding, &path, now);
                                true
                            }
                            _ => false,
                        }
                    };
                    if next {
                        continue;
                    }

                    let restarts = {
                        self.supervision
                            .lock()
                            .node(deciding)
                            .map(|n| n.max_restarts())
                            .unwrap_or(0)
                    };
                    self.publish_event(SystemEventKind::ExceededRestartLimit {
                        path: path.clone(),
                        restarts,
                    })
                    .await;
                    {
                        let mut tree = self.supervision.lock();
                        tree.unsupervise(&address);
                    }
                    self.directory.unregister(&address);
                    self.actors.write().remove(&path);
                    break;
                }
            }
        }

        self.supervision.lock().end_handling(assigned, &path);
    }

    /// Gracefully stop one actor, forcing it down past the budget.
    async fn stop_actor(&self, address: &Address, budget: Duration) {
        let Some(cell) = self.cell(address) else { return };
        let path = address.path().to_string();

        self.publish_event(SystemEventKind::ActorStopping { path: path.clone() })
            .await;
        cell.instance.begin_stop();

        if tokio::time::timeout(budget, cell.instance.await_stopped())
            .await
            .is_err()
        {
            if let Some(task) = cell.task.lock().take() {
                task.abort();
            }
            for envelope in cell.instance.mailbox().clear() {
                self.dead_letters
                    .publish(address.clone(), envelope, DeadLetterReason::MailboxClosed);
            }
            cell.instance.set_state(ActorState::Stopped);
            self.publish_event(SystemEventKind::ShutdownTimeout { path }).await;
        }

        self.directory.unregister(address);
        {
            self.supervision.lock().unsupervise(address);
        }
        self.actors.write().remove(address.path());
    }

    pub(crate) async fn send_from(
        &self,
        to: &Address,
        message: Message,
        sender: Option<Address>,
    ) {
        let mut envelope = Envelope::new(message);
        if let Some(sender) = sender {
            envelope = envelope.with_sender(sender);
        }
        self.route(to, envelope).await;
    }

    pub(crate) async fn ask_from(
        &self,
        to: &Address,
        message: Message,
        timeout: Option<Duration>,
        sender: Option<Address>,
    ) -> Result<Value, AskError> {
        if !self.is_running() {
            return Err(AskError::Failed {
                reason: "actor system is not running".into(),
            });
        }
        let timeout_dur = timeout.unwrap_or(self.config.ask_timeout);
        let message_kind = message.kind().to_string();
        let token = self.correlations.generate_id();
        let future =
            self.correlations
                .register(token.clone(), timeout_dur, to.path(), message_kind.clone())?;

        let mut envelope = Envelope::new(message).with_correlation_id(token.clone());
        if let Some(sender) = sender {
            envelope = envelope.with_sender(sender);
        }
        self.route(to, envelope).await;

        match tokio::time::timeout(timeout_dur, future.recv()).await {
            Ok(result) => result,
            Err(_) => {
                let err = AskError::Timeout {
                    target_path: to.path().to_string(),
                    message_kind,
                    timeout_ms: timeout_dur.as_millis() as u64,
                    token: token.clone(),
                };
                self.correlations.fail(&token, err.clone());
                Err(err)
            }
        }
    }

    /// Deliver a domain event to each matching subscriber's mailbox.
    pub(crate) async fn emit_from(&self, publisher: &Address, event: DomainEvent) {
        let Some(cell) = self.cell(publisher) else { return };
        for subscriber in cell.instance.subscribers_for(event.event_type()) {
            let envelope = Envelope::new(event.to_message()).with_sender(publisher.clone());
            self.route(&subscriber, envelope).await;
        }
    }

    async fn execute_plan(&self, origin: &Address, plan: MessagePlan) {
        for instruction in plan.into_instructions() {
            match instruction {
                Instruction::Send { to, message, mode } => {
                    let attempts = match mode {
                        DeliveryMode::FireAndForget => 1,
                        DeliveryMode::Retry(retries) => retries.saturating_add(1),
                    };
                    self.send_with_attempts(&to, message, origin.clone(), attempts)
                        .await;
                }
                Instruction::Ask(ask) => self.execute_ask_instruction(origin, ask).await,
                Instruction::Emit(event) => self.emit_from(origin, event).await,
            }
        }
    }

    async fn send_with_attempts(
        &self,
        to: &Address,
        message: Message,
        sender: Address,
        attempts: u32,
    ) {
        let attempts = attempts.max(1);
        for attempt in 1..=attempts {
            let envelope = Envelope::new(message.clone()).with_sender(sender.clone());
            if self.route_inner(to, envelope, attempt == attempts).await {
                return;
            }
        }
    }

    /// Register the ask, send the correlated envelope in document order, and
    /// hand the outcome back to the origin as a follow-up self-message.
    async fn execute_ask_instruction(&self, origin: &Address, ask: AskInstruction) {
        let AskInstruction {
            to,
            message,
            timeout,
            on_ok,
            on_error,
        } = ask;
        let timeout_dur = timeout.unwrap_or(self.config.ask_timeout);
        let message_kind = message.kind().to_string();
        let token = self.correlations.generate_id();

        let future = match self
            .correlations
            .register(token.clone(), timeout_dur, to.path(), message_kind.clone())
        {
            Ok(future) => future,
            Err(err) => {
                if let Some(continuation) = on_error {
                    let follow_up = continuation.to_message(Err(err));
                    self.send_from(origin, follow_up, Some(origin.clone())).await;
                }
                return;
            }
        };

        let envelope = Envelope::new(message)
            .with_correlation_id(token.clone())
            .with_sender(origin.clone());
        self.route(&to, envelope).await;

        let Some(core) = self.weak_self.upgrade() else { return };
        let origin = origin.clone();
        let target_path = to.path().to_string();
        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout_dur, future.recv()).await {
                Ok(result) => result,
                Err(_) => {
                    let err = AskError::Timeout {
                        target_path,
                        message_kind,
                        timeout_ms: timeout_dur.as_millis() as u64,
                        token: token.clone(),
                    };
                    core.correlations.fail(&token, err.clone());
                    Err(err)
                }
            };
            let continuation = match &outcome {
                Ok(_) => on_ok,
                Err(_) => on_error,
            };
            if let Some(continuation) = continuation {
                let follow_up = continuation.to_message(outcome);
                core.send_from(&origin, follow_up, Some(origin.clone())).await;
            }
        });
    }

    async fn route(&self, to: &Address, envelope: Envelope) {
        self.route_inner(to, envelope, true).await;
    }

    /// Resolve through the directory and enqueue. Returns whether the
    /// envelope was accepted; failures dead-letter when `report` is set
    /// (retried sends only report their final attempt).
    async fn route_inner(&self, to: &Address, envelope: Envelope, report: bool) -> bool {
        if !self.is_running() {
            if report {
                self.dead_letter(to.clone(), envelope, DeadLetterReason::SystemNotRunning)
                    .await;
            }
            return false;
        }

        let Some(location) = self.directory.lookup(to).await else {
            if report {
                self.dead_letter(to.clone(), envelope, DeadLetterReason::UnknownAddress)
                    .await;
            }
            return false;
        };

        if location != self.local_location {
            // A remote location needs a transport; the core has none.
            if report {
                self.dead_letter(to.clone(), envelope, DeadLetterReason::Unroutable)
                    .await;
            }
            return false;
        }

        let Some(cell) = self.cell(to) else {
            if report {
                self.dead_letter(to.clone(), envelope, DeadLetterReason::NotAccepting)
                    .await;
            }
            return false;
        };

        match cell.instance.deliver(envelope).await {
            Err(refused) => {
                if report {
                    self.dead_letter(to.clone(), refused.envelope, DeadLetterReason::NotAccepting)
                        .await;
                }
                false
            }
            Ok(outcome) => match outcome.verdict {
                EnqueueVerdict::Enqueued | EnqueueVerdict::Blocked => true,
                EnqueueVerdict::DroppedOldest => {
                    // The displaced head is a different message; always record it.
                    if let Some(displaced) = outcome.discarded {
                        self.dead_letter(to.clone(), displaced, DeadLetterReason::MailboxOverflow)
                            .await;
                    }
                    true
                }
                EnqueueVerdict::DroppedNewest => {
                    if report {
                        if let Some(envelope) = outcome.discarded {
                            self.dead_letter(
                                to.clone(),
                                envelope,
                                DeadLetterReason::MailboxOverflow,
                            )
                            .await;
                        }
                    }
                    false
                }
                EnqueueVerdict::Failed => {
                    if report {
                        if let Some(envelope) = outcome.discarded {
                            let reason = if cell.instance.mailbox().is_closed() {
                                DeadLetterReason::MailboxClosed
                            } else {
                                DeadLetterReason::MailboxOverflow
                            };
                            self.dead_letter(to.clone(), envelope, reason).await;
                        }
                    }
                    false
                }
            },
        }
    }

    async fn dead_letter(&self, target: Address, envelope: Envelope, reason: DeadLetterReason) {
        let kind = SystemEventKind::DeadLetter {
            target: target.path().to_string(),
            message_kind: envelope.message_kind().to_string(),
            reason: reason.as_str().to_string(),
        };
        self.dead_letters.publish(target, envelope, reason);
        self.publish_event(kind).await;
    }

    /// Publish on the system event stream, through the event actor when one
    /// is running, directly to listeners otherwise.
    pub(crate) async fn publish_event(&self, kind: SystemEventKind) {
        let event = SystemEvent::new(self.clock.now(), kind);
        if let Some(address) = self.events.event_actor() {
            let body = serde_json::to_value(&event).unwrap_or(Value::Null);
            if self
                .deliver_internal(&address, Message::new(SYSTEM_EVENT_KIND, body))
                .await
            {
                return;
            }
        }
        self.events.dispatch(&event);
    }

    /// Direct-to-mailbox delivery for runtime-internal traffic; bypasses the
    /// directory and the running-state check.
    async fn deliver_internal(&self, address: &Address, message: Message) -> bool {
        match self.cell(address) {
            Some(cell) => matches!(
                cell.instance.deliver(Envelope::new(message)).await,
                Ok(outcome) if outcome.verdict.accepted()
            ),
            None => false,
        }
    }

    /// Renew directory leases for live local actors so they stay resolvable
    /// while stale records still age out. Driven by the janitor sweep.
    pub(crate) fn renew_registrations(&self) {
        let live: Vec<Address> = self
            .actors
            .read()
            .values()
            .filter(|cell| cell.instance.state() == ActorState::Running)
            .map(|cell| cell.instance.address().clone())
            .collect();
        for address in live {
            self.directory.refresh(address, self.local_location.clone());
        }
    }

    async fn flush_until(&self, deadline: Option<Instant>) {
        loop {
            if self.is_drained() {
                return;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return;
                }
            }
            tokio::time::sleep(FLUSH_POLL).await;
        }
    }

    fn is_drained(&self) -> bool {
        let actors_idle = self.actors.read().values().all(|cell| {
            let state = cell.instance.state();
            // Actors that can no longer process are not waited on.
            !state.accepts_messages() || cell.instance.is_quiescent()
        });
        let scheduler_idle = self
            .scheduler_state
            .read()
            .as_ref()
            .map(|state| !state.has_due_entries(self.clock.now()))
            .unwrap_or(true);
        actors_idle && scheduler_idle
    }
}

fn split_outcome(
    outcome: HandlerResult,
) -> (
    Option<Value>,
    Option<Value>,
    Vec<DomainEvent>,
    Option<MessagePlan>,
) {
    match outcome {
        HandlerResult::Unchanged => (None, None, Vec::new(), None),
        HandlerResult::Context(context) => (Some(context), None, Vec::new(), None),
        HandlerResult::Reply { context, reply } => (context, Some(reply), Vec::new(), None),
        HandlerResult::Emit { context, events } => (context, None, events, None),
        HandlerResult::Plan { context, plan } => (context, None, Vec::new(), Some(plan)),
    }
}

fn panic_reason(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Behavior of the internal event actor: decode the event, invoke callback
/// listeners, forward to subscribed addresses.
fn event_behavior(hub: Arc<EventHub>) -> Behavior {
    Behavior::stateless(move |params| {
        let hub = Arc::clone(&hub);
        async move {
            if params.message.kind() != SYSTEM_EVENT_KIND {
                return Ok(HandlerResult::unchanged());
            }
            let event: SystemEvent = params.message.decode()?;
            hub.dispatch(&event);

            let body = serde_json::to_value(&event).unwrap_or(Value::Null);
            for address in hub.addresses_for(event.event_type()) {
                params
                    .deps
                    .send(&address, Message::new(event.event_type(), body.clone()))
                    .await;
            }
            Ok(HandlerResult::unchanged())
        }
    })
}

/// Behavior of the internal janitor actor: expiry sweeps for the directory
/// and the correlation manager, plus directory lease renewal.
fn janitor_behavior(
    directory: Arc<Directory>,
    correlations: Arc<CorrelationManager>,
    system: SystemHandle,
) -> Behavior {
    Behavior::stateless(move |params| {
        let directory = Arc::clone(&directory);
        let correlations = Arc::clone(&correlations);
        let system = system.clone();
        async move {
            if params.message.kind() == JANITOR_SWEEP {
                if let Some(core) = system.upgrade() {
                    core.renew_registrations();
                }
                let (registry_removed, cache_removed) = directory.sweep_expired();
                let asks_expired = correlations.sweep_expired();
                if registry_removed + cache_removed + asks_expired > 0 {
                    debug!(
                        registry_removed,
                        cache_removed, asks_expired, "sweep pass"
                    );
                }
            }
            Ok(HandlerResult::unchanged())
        }
    })
}
