//! The behavior descriptor and its handler plumbing.

// Layer 1: Standard library imports
use std::fmt;
use std::future::Future;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use thiserror::Error;

// Layer 3: Internal module imports
use super::machine::MachineDescriptor;
use super::result::HandlerResult;
use crate::actor::Dependencies;
use crate::message::{DomainEvent, Message, MessageError};
use crate::util::{Address, CorrelationId};

/// Error returned by a message handler or lifecycle hook.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler reported a failure.
    #[error("handler failed: {reason}")]
    Failed { reason: String },

    /// The handler panicked; the panic was captured at the dispatch boundary.
    #[error("handler panicked: {reason}")]
    Panicked { reason: String },

    /// A message body did not decode into the handler's expected type.
    #[error(transparent)]
    Message(#[from] MessageError),
}

impl HandlerError {
    /// Convenience constructor for ad-hoc failures.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Everything a handler invocation receives.
pub struct HandlerParams {
    /// The message being processed.
    pub message: Message,

    /// The actor's current context (post machine tick, when applicable).
    pub context: Value,

    /// Injected runtime capabilities: self address, send/ask/emit/spawn,
    /// and the system clock.
    pub deps: Dependencies,

    /// Address of the sender, when known.
    pub sender: Option<Address>,

    /// Correlation token when this message belongs to an ask exchange.
    pub correlation_id: Option<CorrelationId>,
}

/// Parameters passed to the optional start/stop hooks.
pub struct HookParams {
    /// The actor's context at hook time.
    pub context: Value,

    /// Injected runtime capabilities.
    pub deps: Dependencies,
}

type HandlerFuture = BoxFuture<'static, Result<HandlerResult, HandlerError>>;
type HandlerFn = Arc<dyn Fn(HandlerParams) -> HandlerFuture + Send + Sync>;
type HookFuture = BoxFuture<'static, Result<(), HandlerError>>;
type HookFn = Arc<dyn Fn(HookParams) -> HookFuture + Send + Sync>;

/// How an actor's context is persisted between messages.
#[derive(Clone)]
pub enum BehaviorKind {
    /// No context: the runtime persists nothing between messages.
    Stateless,

    /// A context value, replaced atomically at each message boundary.
    WithContext(Value),

    /// A state chart; the context carries the current state plus user data.
    WithMachine(MachineDescriptor),
}

impl fmt::Debug for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stateless => write!(f, "Stateless"),
            Self::WithContext(_) => write!(f, "WithContext"),
            Self::WithMachine(m) => write!(f, "WithMachine(initial={})", m.initial()),
        }
    }
}

/// A complete behavior: kind tag, message handler, optional hooks.
///
/// # Examples
///
/// ```rust
/// use lattice_rt::behavior::{Behavior, HandlerResult};
/// use serde_json::json;
///
/// let counter = Behavior::with_context(json!({ "count": 0 }), |params| async move {
///     let count = params.context["count"].as_i64().unwrap_or(0);
///     match params.message.kind() {
///         "INCREMENT" => Ok(HandlerResult::context(json!({ "count": count + 1 }))),
///         "GET_COUNT" => Ok(HandlerResult::reply(json!({ "count": count }))),
///         _ => Ok(HandlerResult::unchanged()),
///     }
/// });
/// assert!(counter.initial_context()["count"].as_i64() == Some(0));
/// ```
#[derive(Clone)]
pub struct Behavior {
    kind: BehaviorKind,
    handler: HandlerFn,
    on_start: Option<HookFn>,
    on_stop: Option<HookFn>,
}

impl Behavior {
    fn from_parts<F, Fut>(kind: BehaviorKind, handler: F) -> Self
    where
        F: Fn(HandlerParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HandlerResult, HandlerError>> + Send + 'static,
    {
        Self {
            kind,
            handler: Arc::new(move |params| handler(params).boxed()),
            on_start: None,
            on_stop: None,
        }
    }

    /// A behavior with no persisted context.
    pub fn stateless<F, Fut>(handler: F) -> Self
    where
        F: Fn(HandlerParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HandlerResult, HandlerError>> + Send + 'static,
    {
        Self::from_parts(BehaviorKind::Stateless, handler)
    }

    /// A behavior with an initial context value.
    pub fn with_context<F, Fut>(initial: Value, handler: F) -> Self
    where
        F: Fn(HandlerParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HandlerResult, HandlerError>> + Send + 'static,
    {
        Self::from_parts(BehaviorKind::WithContext(initial), handler)
    }

    /// A behavior driven by a state chart.
    pub fn with_machine<F, Fut>(machine: MachineDescriptor, handler: F) -> Self
    where
        F: Fn(HandlerParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HandlerResult, HandlerError>> + Send + 'static,
    {
        Self::from_parts(BehaviorKind::WithMachine(machine), handler)
    }

    /// Builder method: hook invoked once before the actor starts.
    pub fn on_start<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.on_start = Some(Arc::new(move |params| hook(params).boxed()));
        self
    }

    /// Builder method: hook invoked once while the actor stops.
    pub fn on_stop<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.on_stop = Some(Arc::new(move |params| hook(params).boxed()));
        self
    }

    /// The kind tag.
    pub fn kind(&self) -> &BehaviorKind {
        &self.kind
    }

    /// The context a fresh instance starts from.
    pub fn initial_context(&self) -> Value {
        match &self.kind {
            BehaviorKind::Stateless => Value::Null,
            BehaviorKind::WithContext(initial) => initial.clone(),
            BehaviorKind::WithMachine(machine) => machine.initial_context(),
        }
    }

    /// Tick the machine for this message kind, when the behavior has one.
    ///
    /// Returns the (possibly advanced) working context and any event the
    /// transition publishes. For non-machine behaviors the context passes
    /// through unchanged.
    pub(crate) fn tick_machine(
        &self,
        context: &Value,
        message_kind: &str,
    ) -> (Value, Option<DomainEvent>) {
        match &self.kind {
            BehaviorKind::WithMachine(machine) => match machine.tick(context, message_kind) {
                Some((updated, event)) => (updated, event),
                None => (context.clone(), None),
            },
            _ => (context.clone(), None),
        }
    }

    /// Decide what to persist given the context a handler produced.
    ///
    /// This is the single place the kind tag changes persistence: stateless
    /// behaviors never keep context, the others keep whatever the handler
    /// (or the machine tick) produced.
    pub(crate) fn persist_context(&self, produced: Value) -> Value {
        match &self.kind {
            BehaviorKind::Stateless => Value::Null,
            _ => produced,
        }
    }

    /// Invoke the message handler.
    pub(crate) fn handle(&self, params: HandlerParams) -> HandlerFuture {
        (self.handler)(params)
    }

    /// Invoke the start hook if present.
    pub(crate) fn run_start(&self, params: HookParams) -> HookFuture {
        match &self.on_start {
            Some(hook) => hook(params),
            None => futures::future::ready(Ok(())).boxed(),
        }
    }

    /// Invoke the stop hook if present.
    pub(crate) fn run_stop(&self, params: HookParams) -> HookFuture {
        match &self.on_stop {
            Some(hook) => hook(params),
            None => futures::future::ready(Ok(())).boxed(),
        }
    }

    /// Whether a start hook was provided.
    pub fn has_start_hook(&self) -> bool {
        self.on_start.is_some()
    }

    /// Whether a stop hook was provided.
    pub fn has_stop_hook(&self) -> bool {
        self.on_stop.is_some()
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behavior")
            .field("kind", &self.kind)
            .field("on_start", &self.on_start.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}
