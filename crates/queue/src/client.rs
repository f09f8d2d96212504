//! Federation transport capability.

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

/// Outcome of a single delivery attempt to one inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The inbox accepted the payload.
    Delivered,
    /// Transient failure (server error, network failure, timeout); the inbox
    /// stays pending and is retried on the next pass.
    Transient,
    /// Permanent failure (client error, remote actor gone); the inbox is
    /// dropped without further attempts.
    Permanent,
}

/// Transport for posting a signed activity payload to a remote inbox.
///
/// Implementations own signing, content negotiation and status-code
/// classification; the scheduler only consumes the tri-state outcome.
#[async_trait]
pub trait FederationClient: Send + Sync {
    /// POST `payload` to `inbox` and classify the result.
    async fn deliver(&self, payload: &Value, inbox: &Url) -> DeliveryOutcome;
}
