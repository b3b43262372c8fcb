//! Values a message handler can return.
//!
//! Handlers either mutate their context, reply to an ask, emit domain
//! events, or return a [`MessagePlan`] — an ordered list of declarative
//! instructions the dispatcher executes after the context is persisted.

// Layer 1: Standard library imports
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde_json::Value;

// Layer 3: Internal module imports
use crate::correlation::AskError;
use crate::message::{DomainEvent, Message};
use crate::util::Address;

/// Outcome of one handler invocation.
///
/// `context: None` in the compound variants means "keep the current context".
#[derive(Debug)]
pub enum HandlerResult {
    /// No state change, no effects.
    Unchanged,

    /// Replace the context.
    Context(Value),

    /// Reply to the ask bound to the current correlation token.
    ///
    /// Without a token the reply is discarded (and warned about in dev mode).
    Reply {
        context: Option<Value>,
        reply: Value,
    },

    /// Publish domain events to this actor's subscribers.
    Emit {
        context: Option<Value>,
        events: Vec<DomainEvent>,
    },

    /// Execute a declarative instruction list in document order.
    Plan {
        context: Option<Value>,
        plan: MessagePlan,
    },
}

impl HandlerResult {
    /// Keep everything as is.
    pub fn unchanged() -> Self {
        Self::Unchanged
    }

    /// Replace the context.
    pub fn context(context: Value) -> Self {
        Self::Context(context)
    }

    /// Reply without touching the context.
    pub fn reply(reply: Value) -> Self {
        Self::Reply {
            context: None,
            reply,
        }
    }

    /// Replace the context and reply.
    pub fn context_and_reply(context: Value, reply: Value) -> Self {
        Self::Reply {
            context: Some(context),
            reply,
        }
    }

    /// Emit a single event without touching the context.
    pub fn emit(event: DomainEvent) -> Self {
        Self::Emit {
            context: None,
            events: vec![event],
        }
    }

    /// Emit several events without touching the context.
    pub fn emit_all(events: Vec<DomainEvent>) -> Self {
        Self::Emit {
            context: None,
            events,
        }
    }

    /// Replace the context and emit events.
    pub fn context_and_emit(context: Value, events: Vec<DomainEvent>) -> Self {
        Self::Emit {
            context: Some(context),
            events,
        }
    }

    /// Execute a plan without touching the context.
    pub fn plan(plan: MessagePlan) -> Self {
        Self::Plan {
            context: None,
            plan,
        }
    }

    /// Replace the context and execute a plan.
    pub fn context_and_plan(context: Value, plan: MessagePlan) -> Self {
        Self::Plan {
            context: Some(context),
            plan,
        }
    }
}

// A bare event (or list of events) is shorthand for emit.
impl From<DomainEvent> for HandlerResult {
    fn from(event: DomainEvent) -> Self {
        Self::emit(event)
    }
}

impl From<Vec<DomainEvent>> for HandlerResult {
    fn from(events: Vec<DomainEvent>) -> Self {
        Self::emit_all(events)
    }
}

impl From<MessagePlan> for HandlerResult {
    fn from(plan: MessagePlan) -> Self {
        Self::plan(plan)
    }
}

/// Delivery mode for a plan `Send` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// One attempt; drops are not retried.
    FireAndForget,

    /// Retry rejected deliveries up to this many additional attempts.
    Retry(u32),
}

/// What to do with the outcome of a plan-based ask.
///
/// Continuations are delivered back to the asking actor as follow-up
/// self-messages, so their effects observe the same ordering guarantees as
/// any other message.
#[derive(Clone)]
pub enum Continuation {
    /// Deliver this event's message form to self, ignoring the outcome value.
    Event(DomainEvent),

    /// Build the follow-up message from the outcome.
    Map(Arc<dyn Fn(Result<Value, AskError>) -> Message + Send + Sync>),
}

impl Continuation {
    /// Continuation that delivers a fixed event.
    pub fn event(event: DomainEvent) -> Self {
        Self::Event(event)
    }

    /// Continuation that maps the outcome into a message.
    pub fn map<F>(f: F) -> Self
    where
        F: Fn(Result<Value, AskError>) -> Message + Send + Sync + 'static,
    {
        Self::Map(Arc::new(f))
    }

    /// Resolve the follow-up message for an outcome.
    pub(crate) fn to_message(&self, outcome: Result<Value, AskError>) -> Message {
        match self {
            Self::Event(event) => event.to_message(),
            Self::Map(f) => f(outcome),
        }
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event(event) => f.debug_tuple("Event").field(event).finish(),
            Self::Map(_) => write!(f, "Map(<fn>)"),
        }
    }
}

/// A plan-based ask with its continuations.
#[derive(Debug, Clone)]
pub struct AskInstruction {
    pub to: Address,
    pub message: Message,
    /// `None` uses the system's default ask timeout.
    pub timeout: Option<Duration>,
    pub on_ok: Option<Continuation>,
    pub on_error: Option<Continuation>,
}

impl AskInstruction {
    /// Create an ask instruction with default timeout and no continuations.
    pub fn new(to: Address, message: Message) -> Self {
        Self {
            to,
            message,
            timeout: None,
            on_ok: None,
            on_error: None,
        }
    }

    /// Builder method: override the ask timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builder method: continuation for a successful reply.
    pub fn on_ok(mut self, continuation: Continuation) -> Self {
        self.on_ok = Some(continuation);
        self
    }

    /// Builder method: continuation for a failed or timed-out ask.
    pub fn on_error(mut self, continuation: Continuation) -> Self {
        self.on_error = Some(continuation);
        self
    }
}

/// One step of a [`MessagePlan`].
#[derive(Debug, Clone)]
pub enum Instruction {
    /// Fire a message at an address.
    Send {
        to: Address,
        message: Message,
        mode: DeliveryMode,
    },

    /// Ask an address and deliver the outcome back to self.
    Ask(AskInstruction),

    /// Publish a domain event to this actor's subscribers.
    Emit(DomainEvent),
}

/// Ordered list of instructions executed after a handler returns.
///
/// # Example
///
/// ```rust
/// use lattice_rt::behavior::MessagePlan;
/// use lattice_rt::message::{DomainEvent, Message};
/// use lattice_rt::util::{Address, LOCAL_NODE};
/// use serde_json::json;
///
/// let worker = Address::new(LOCAL_NODE, "worker", "w1");
/// let plan = MessagePlan::new()
///     .send(worker, Message::new("WORK", json!({ "job": 1 })))
///     .emit(DomainEvent::of("workDispatched"));
/// assert_eq!(plan.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MessagePlan {
    instructions: Vec<Instruction>,
}

impl MessagePlan {
    /// Create an empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: append a fire-and-forget send.
    pub fn send(mut self, to: Address, message: Message) -> Self {
        self.instructions.push(Instruction::Send {
            to,
            message,
            mode: DeliveryMode::FireAndForget,
        });
        self
    }

    /// Builder method: append a send retried on rejection.
    pub fn send_with_retry(mut self, to: Address, message: Message, retries: u32) -> Self {
        self.instructions.push(Instruction::Send {
            to,
            message,
            mode: DeliveryMode::Retry(retries),
        });
        self
    }

    /// Builder method: append an ask.
    pub fn ask(mut self, ask: AskInstruction) -> Self {
        self.instructions.push(Instruction::Ask(ask));
        self
    }

    /// Builder method: append an event emission.
    pub fn emit(mut self, event: DomainEvent) -> Self {
        self.instructions.push(Instruction::Emit(event));
        self
    }

    /// Append an instruction in place.
    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// The instructions in document order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Consume the plan.
    pub fn into_instructions(self) -> Vec<Instruction> {
        self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::LOCAL_NODE;
    use serde_json::json;

    #[test]
    fn test_plan_preserves_document_order() {
        let target = Address::new(LOCAL_NODE, "worker", "w1");
        let plan = MessagePlan::new()
            .send(target.clone(), Message::of("FIRST"))
            .emit(DomainEvent::of("second"))
            .send_with_retry(target, Message::of("THIRD"), 2);

        assert_eq!(plan.len(), 3);
        assert!(matches!(
            plan.instructions()[0],
            Instruction::Send {
                mode: DeliveryMode::FireAndForget,
                ..
            }
        ));
        assert!(matches!(plan.instructions()[1], Instruction::Emit(_)));
        assert!(matches!(
            plan.instructions()[2],
            Instruction::Send {
                mode: DeliveryMode::Retry(2),
                ..
            }
        ));
    }

    #[test]
    fn test_event_shorthand_becomes_emit() {
        let result: HandlerResult = DomainEvent::of("done").into();
        match result {
            HandlerResult::Emit { context, events } => {
                assert!(context.is_none());
                assert_eq!(events.len(), 1);
            }
            other => unreachable!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_continuation_event_ignores_outcome() {
        let continuation = Continuation::event(DomainEvent::new("ok", json!({ "fixed": true })));
        let msg = continuation.to_message(Ok(json!("ignored")));
        assert_eq!(msg.kind(), "ok");
        assert_eq!(msg.body(), &json!({ "fixed": true }));
    }

    #[test]
    fn test_continuation_map_sees_outcome() {
        let continuation = Continuation::map(|outcome| match outcome {
            Ok(value) => Message::new("gotReply", value),
            Err(err) => Message::new("askFailed", json!({ "error": err.to_string() })),
        });

        let ok = continuation.to_message(Ok(json!({ "count": 3 })));
        assert_eq!(ok.kind(), "gotReply");

        let err = continuation.to_message(Err(AskError::Failed {
            reason: "gone".into(),
        }));
        assert_eq!(err.kind(), "askFailed");
    }

    #[test]
    fn test_ask_instruction_builder() {
        let ask = AskInstruction::new(
            Address::new(LOCAL_NODE, "svc", "s1"),
            Message::of("QUERY"),
        )
        .timeout(Duration::from_millis(250))
        .on_ok(Continuation::event(DomainEvent::of("queryOk")))
        .on_error(Continuation::event(DomainEvent::of("queryFailed")));

        assert_eq!(ask.timeout, Some(Duration::from_millis(250)));
        assert!(ask.on_ok.is_some());
        assert!(ask.on_error.is_some());
    }
}
