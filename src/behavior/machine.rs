//! Declarative state-chart descriptor for machine-driven behaviors.
//!
//! A machine is a flat chart: named states, each with a map from message
//! kind to a transition. The runtime keeps the current state inside the
//! actor's context under `"state"` (user data lives under `"data"`) and
//! applies at most one transition per message before the handler runs.

// Layer 1: Standard library imports
use std::collections::HashMap;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// Layer 3: Internal module imports
use crate::message::DomainEvent;

/// Context key holding the current machine state.
pub const STATE_KEY: &str = "state";

/// Context key holding user data alongside the machine state.
pub const DATA_KEY: &str = "data";

/// A transition: the target state plus an optional event published when the
/// transition fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emit: Option<DomainEvent>,
}

/// One named state and its outgoing transitions, keyed by message kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSpec {
    #[serde(default)]
    pub on: HashMap<String, TransitionSpec>,
}

impl StateSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: transition to `target` on `message_kind`.
    pub fn on(mut self, message_kind: impl Into<String>, target: impl Into<String>) -> Self {
        self.on.insert(
            message_kind.into(),
            TransitionSpec {
                target: target.into(),
                emit: None,
            },
        );
        self
    }

    /// Builder method: transition that also publishes an event.
    pub fn on_emit(
        mut self,
        message_kind: impl Into<String>,
        target: impl Into<String>,
        emit: DomainEvent,
    ) -> Self {
        self.on.insert(
            message_kind.into(),
            TransitionSpec {
                target: target.into(),
                emit: Some(emit),
            },
        );
        self
    }
}

/// A complete machine: initial state, states, and initial user data.
///
/// # Example
///
/// ```rust
/// use lattice_rt::behavior::{MachineDescriptor, StateSpec};
///
/// let machine = MachineDescriptor::new("idle")
///     .state("idle", StateSpec::new().on("START", "running"))
///     .state("running", StateSpec::new().on("STOP", "idle"));
///
/// let ctx = machine.initial_context();
/// assert_eq!(ctx["state"], "idle");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineDescriptor {
    initial: String,
    #[serde(default)]
    states: HashMap<String, StateSpec>,
    #[serde(default)]
    initial_data: Value,
}

impl MachineDescriptor {
    /// Create a machine whose first state is `initial`.
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            initial: initial.into(),
            states: HashMap::new(),
            initial_data: Value::Null,
        }
    }

    /// Builder method: set the initial user data.
    pub fn with_data(mut self, data: Value) -> Self {
        self.initial_data = data;
        self
    }

    /// Builder method: add a named state.
    pub fn state(mut self, name: impl Into<String>, spec: StateSpec) -> Self {
        self.states.insert(name.into(), spec);
        self
    }

    /// The initial state name.
    pub fn initial(&self) -> &str {
        &self.initial
    }

    /// The context value a fresh instance starts from.
    pub fn initial_context(&self) -> Value {
        json!({ STATE_KEY: self.initial, DATA_KEY: self.initial_data })
    }

    /// The transition out of `from` on `message_kind`, if declared.
    pub fn transition(&self, from: &str, message_kind: &str) -> Option<&TransitionSpec> {
        self.states.get(from)?.on.get(message_kind)
    }

    /// Apply one tick: advance the context's state for this message kind.
    ///
    /// Returns the updated context and the transition's event, or `None`
    /// when the current state has no transition for the kind (the context is
    /// left untouched and the handler still runs).
    pub(crate) fn tick(
        &self,
        context: &Value,
        message_kind: &str,
    ) -> Option<(Value, Option<DomainEvent>)> {
        let current = context
            .get(STATE_KEY)
            .and_then(Value::as_str)
            .unwrap_or(&self.initial);
        let transition = self.transition(current, message_kind)?;

        let mut updated = context.clone();
        if !updated.is_object() {
            updated = json!({ DATA_KEY: Value::Null });
        }
        if let Some(object) = updated.as_object_mut() {
            object.insert(STATE_KEY.to_string(), Value::String(transition.target.clone()));
        }
        Some((updated, transition.emit.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn machine() -> MachineDescriptor {
        MachineDescriptor::new("idle")
            .with_data(json!({ "ticks": 0 }))
            .state("idle", StateSpec::new().on("START", "running"))
            .state(
                "running",
                StateSpec::new()
                    .on("STOP", "idle")
                    .on_emit("FINISH", "done", DomainEvent::of("finished")),
            )
            .state("done", StateSpec::new())
    }

    #[test]
    fn test_initial_context_shape() {
        let ctx = machine().initial_context();
        assert_eq!(ctx[STATE_KEY], "idle");
        assert_eq!(ctx[DATA_KEY], json!({ "ticks": 0 }));
    }

    #[test]
    fn test_tick_advances_state() {
        let machine = machine();
        let ctx = machine.initial_context();

        let (ctx, event) = machine.tick(&ctx, "START").unwrap();
        assert_eq!(ctx[STATE_KEY], "running");
        assert!(event.is_none());
        // User data rides along untouched.
        assert_eq!(ctx[DATA_KEY], json!({ "ticks": 0 }));
    }

    #[test]
    fn test_tick_emits_transition_event() {
        let machine = machine();
        let (ctx, _) = machine.tick(&machine.initial_context(), "START").unwrap();

        let (ctx, event) = machine.tick(&ctx, "FINISH").unwrap();
        assert_eq!(ctx[STATE_KEY], "done");
        assert_eq!(event.unwrap().event_type(), "finished");
    }

    #[test]
    fn test_unknown_kind_does_not_transition() {
        let machine = machine();
        let ctx = machine.initial_context();
        assert!(machine.tick(&ctx, "NOPE").is_none());
    }

    #[test]
    fn test_terminal_state_has_no_transitions() {
        let machine = machine();
        let ctx = json!({ STATE_KEY: "done", DATA_KEY: null });
        assert!(machine.tick(&ctx, "START").is_none());
    }

    #[test]
    fn test_serde_round_trip() {
        let machine = machine();
        let json = serde_json::to_string(&machine).unwrap();
        let back: MachineDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, machine);
    }
}
