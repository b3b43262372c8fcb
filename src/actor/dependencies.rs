//! Capabilities injected into message handlers.
//!
//! Handlers never touch the actor system directly; everything they can do —
//! send, ask, emit, spawn a child, read the clock — goes through a
//! [`Dependencies`] value cloned per invocation. The system reference is
//! weak, so captured dependencies cannot keep a stopped system alive.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde_json::Value;

// Layer 3: Internal module imports
use crate::behavior::Behavior;
use crate::correlation::AskError;
use crate::message::{DomainEvent, Message};
use crate::system::{SpawnOptions, SystemError, SystemHandle};
use crate::util::{Address, SharedClock};

/// Runtime capabilities handed to a handler invocation.
#[derive(Clone)]
pub struct Dependencies {
    self_address: Address,
    system: SystemHandle,
    clock: SharedClock,
}

impl Dependencies {
    pub(crate) fn new(self_address: Address, system: SystemHandle, clock: SharedClock) -> Self {
        Self {
            self_address,
            system,
            clock,
        }
    }

    /// The address of the actor whose handler is running.
    pub fn self_address(&self) -> &Address {
        &self.self_address
    }

    /// The current instant, from the system clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The system clock itself.
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// The underlying system handle, for operations beyond the shorthands.
    pub fn system(&self) -> &SystemHandle {
        &self.system
    }

    /// Fire a message at an address, recording self as the sender.
    ///
    /// Never fails: undeliverable messages go to the dead-letter sink.
    pub async fn send(&self, to: &Address, message: Message) {
        self.system
            .send_from(to, message, Some(self.self_address.clone()))
            .await;
    }

    /// Ask an address and await the reply.
    ///
    /// `timeout: None` uses the system's configured default. Note that an
    /// actor asking itself would deadlock by design: the reply cannot be
    /// produced while this handler is suspended on it.
    pub async fn ask(
        &self,
        to: &Address,
        message: Message,
        timeout: Option<Duration>,
    ) -> Result<Value, AskError> {
        self.system
            .ask_from(to, message, timeout, Some(self.self_address.clone()))
            .await
    }

    /// Publish a domain event to this actor's subscribers.
    pub async fn emit(&self, event: DomainEvent) {
        self.system.emit(&self.self_address, event).await;
    }

    /// Spawn a child actor.
    ///
    /// Unless the options name a supervisor, the child is attached to the
    /// same supervisor node as this actor.
    pub async fn spawn_child(
        &self,
        behavior: Behavior,
        options: SpawnOptions,
    ) -> Result<Address, SystemError> {
        self.system
            .spawn_child_of(&self.self_address, behavior, options)
            .await
    }
}
