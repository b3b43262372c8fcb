//! Peer-broadcast seam for multi-node deployments.
//!
//! The directory calls these hooks fire-and-forget: a failing or slow hook
//! degrades resolution to local-only but never fails registration. The
//! default [`NoopBroadcast`] is what single-node deployments run with; a
//! cluster layer plugs in its own implementation.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use async_trait::async_trait;

// Layer 3: Internal module imports
use super::error::BroadcastError;
use crate::util::Address;

/// Hooks a cluster protocol implements to share directory state.
#[async_trait]
pub trait BroadcastHook: Send + Sync + 'static {
    /// Announce a registration to peers.
    async fn broadcast_register(
        &self,
        address: &Address,
        location: &str,
    ) -> Result<(), BroadcastError>;

    /// Announce an unregistration to peers.
    async fn broadcast_unregister(&self, address: &Address) -> Result<(), BroadcastError>;

    /// Ask peers where an address lives.
    async fn broadcast_lookup(&self, address: &Address) -> Option<String>;
}

/// No-op hook for single-node deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBroadcast;

#[async_trait]
impl BroadcastHook for NoopBroadcast {
    async fn broadcast_register(
        &self,
        _address: &Address,
        _location: &str,
    ) -> Result<(), BroadcastError> {
        Ok(())
    }

    async fn broadcast_unregister(&self, _address: &Address) -> Result<(), BroadcastError> {
        Ok(())
    }

    async fn broadcast_lookup(&self, _address: &Address) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::LOCAL_NODE;

    #[tokio::test]
    async fn test_noop_hook_does_nothing() {
        let hook = NoopBroadcast;
        let addr = Address::new(LOCAL_NODE, "worker", "w1");
        assert!(hook.broadcast_register(&addr, "local://local").await.is_ok());
        assert!(hook.broadcast_unregister(&addr).await.is_ok());
        assert!(hook.broadcast_lookup(&addr).await.is_none());
    }
}
