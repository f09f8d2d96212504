//! Remote delivery capability.
//!
//! Side-effect handlers schedule remote fan-out through this trait without
//! depending on the delivery scheduler implementation; the queue crate
//! provides the channel-backed implementation.

use std::sync::Arc;

use async_trait::async_trait;
use corvid_common::AppResult;
use serde_json::Value;
use url::Url;

/// Capability for scheduling delivery of a serialized activity payload to a
/// set of remote inboxes.
///
/// The payload is opaque to the scheduler; signing and transport belong to
/// the federation client behind it. Queueing must never block on remote I/O.
#[async_trait]
pub trait ActivityDelivery: Send + Sync {
    /// Schedule one fan-out: deliver `activity` to each of `inboxes`.
    ///
    /// The inbox list is expected to already be deduplicated (shared inboxes
    /// collapsed to one entry). An empty list is a no-op.
    async fn queue_activity(
        &self,
        actor_id: &str,
        activity: Value,
        inboxes: Vec<Url>,
    ) -> AppResult<()>;
}

/// A no-op implementation for tests or when federation is disabled.
#[derive(Clone, Default)]
pub struct NoOpDelivery;

#[async_trait]
impl ActivityDelivery for NoOpDelivery {
    async fn queue_activity(
        &self,
        _actor_id: &str,
        _activity: Value,
        _inboxes: Vec<Url>,
    ) -> AppResult<()> {
        Ok(())
    }
}

/// Shared handle to a delivery capability.
pub type DeliveryService = Arc<dyn ActivityDelivery>;
