//! Weak handle to the actor system.
//!
//! Handlers, timer tasks, and subscribers capture a [`SystemHandle`] rather
//! than the system itself, so captured state can never keep a stopped
//! system alive. Operations on a handle whose system is gone degrade the
//! way undeliverable traffic always does: sends vanish, asks fail.

// Layer 1: Standard library imports
use std::sync::{Arc, Weak};
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde_json::Value;

// Layer 3: Internal module imports
use super::actor_system::SystemCore;
use super::errors::SystemError;
use super::events::SystemEventKind;
use super::options::SpawnOptions;
use crate::behavior::Behavior;
use crate::correlation::AskError;
use crate::message::{DomainEvent, Message};
use crate::util::Address;

/// Cheaply cloneable weak reference to a running system.
#[derive(Clone)]
pub struct SystemHandle {
    core: Weak<SystemCore>,
}

impl SystemHandle {
    pub(crate) fn new(core: &Arc<SystemCore>) -> Self {
        Self {
            core: Arc::downgrade(core),
        }
    }

    pub(crate) fn from_weak(core: Weak<SystemCore>) -> Self {
        Self { core }
    }

    /// A handle bound to no system; every operation is a no-op or failure.
    /// Useful for unit tests of components that take a handle.
    pub fn detached() -> Self {
        Self { core: Weak::new() }
    }

    pub(crate) fn upgrade(&self) -> Option<Arc<SystemCore>> {
        self.core.upgrade()
    }

    /// Fire a message at an address with an explicit sender.
    ///
    /// Never fails; undeliverable messages go to the dead-letter sink (or
    /// nowhere, if the system itself is gone).
    pub async fn send_from(&self, to: &Address, message: Message, sender: Option<Address>) {
        if let Some(core) = self.upgrade() {
            core.send_from(to, message, sender).await;
        }
    }

    /// Fire a message at an address with no sender recorded.
    pub async fn send(&self, to: &Address, message: Message) {
        self.send_from(to, message, None).await;
    }

    /// Ask an address and await the reply.
    pub async fn ask_from(
        &self,
        to: &Address,
        message: Message,
        timeout: Option<Duration>,
        sender: Option<Address>,
    ) -> Result<Value, AskError> {
        match self.upgrade() {
            Some(core) => core.ask_from(to, message, timeout, sender).await,
            None => Err(AskError::Failed {
                reason: "actor system is gone".into(),
            }),
        }
    }

    /// Publish a domain event to a publisher's subscribers.
    pub async fn emit(&self, publisher: &Address, event: DomainEvent) {
        if let Some(core) = self.upgrade() {
            core.emit_from(publisher, event).await;
        }
    }

    /// Spawn an actor attached to the same supervisor as `parent` (unless
    /// the options name one).
    pub async fn spawn_child_of(
        &self,
        parent: &Address,
        behavior: Behavior,
        options: SpawnOptions,
    ) -> Result<Address, SystemError> {
        match self.upgrade() {
            Some(core) => core.spawn_child_of(parent, behavior, options).await,
            None => Err(SystemError::NotRunning),
        }
    }

    /// Publish a system event (internal plumbing for runtime actors).
    pub(crate) async fn publish(&self, kind: SystemEventKind) {
        if let Some(core) = self.upgrade() {
            core.publish_event(kind).await;
        }
    }
}
