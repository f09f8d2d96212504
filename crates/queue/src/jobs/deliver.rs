//! Remote delivery job.

use serde::{Deserialize, Serialize};
use url::Url;

/// Job to deliver one activity payload to a set of remote inboxes.
///
/// The job carries only the inboxes still awaiting a successful delivery;
/// each failed attempt pass shrinks `pending` and bumps `attempt` before the
/// job is parked for its backoff delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryJob {
    /// The account ID on whose behalf the activity is sent.
    pub actor_id: String,

    /// Serialized activity payload.
    pub payload: serde_json::Value,

    /// Inbox URLs that have not yet accepted the payload.
    pub pending: Vec<Url>,

    /// Number of attempt passes already made.
    pub attempt: u32,
}

impl DeliveryJob {
    /// Create a fresh job with no attempts made yet.
    #[must_use]
    pub const fn new(actor_id: String, payload: serde_json::Value, pending: Vec<Url>) -> Self {
        Self {
            actor_id,
            payload,
            pending,
            attempt: 0,
        }
    }
}
