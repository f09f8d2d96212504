//! Channel-backed delivery capability.
//!
//! Bridges the side-effect handlers to the delivery scheduler: queueing a
//! fan-out pushes one [`DeliveryJob`] onto the scheduler's bounded channel
//! and returns without touching the network.

use async_trait::async_trait;
use corvid_common::{AppError, AppResult};
use corvid_core::services::ActivityDelivery;
use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use crate::jobs::DeliveryJob;
use crate::scheduler::DeliveryScheduler;

/// Delivery capability backed by the scheduler's job channel.
#[derive(Clone)]
pub struct ChannelDelivery {
    job_tx: mpsc::Sender<DeliveryJob>,
}

impl ChannelDelivery {
    /// Wire a delivery capability to the given scheduler.
    #[must_use]
    pub fn new(scheduler: &DeliveryScheduler) -> Self {
        Self {
            job_tx: scheduler.sender(),
        }
    }
}

#[async_trait]
impl ActivityDelivery for ChannelDelivery {
    async fn queue_activity(
        &self,
        actor_id: &str,
        activity: Value,
        inboxes: Vec<Url>,
    ) -> AppResult<()> {
        if inboxes.is_empty() {
            return Ok(());
        }

        // Collapse duplicates so each inbox sees the payload once per job.
        let mut pending: Vec<Url> = Vec::with_capacity(inboxes.len());
        for inbox in inboxes {
            if !pending.contains(&inbox) {
                pending.push(inbox);
            }
        }

        tracing::debug!(
            actor_id = %actor_id,
            inbox_count = pending.len(),
            "queueing activity delivery"
        );

        let job = DeliveryJob::new(actor_id.to_string(), activity, pending);
        self.job_tx
            .send(job)
            .await
            .map_err(|_| AppError::Delivery("delivery job channel closed".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use corvid_common::DeliveryConfig;
    use crate::client::{DeliveryOutcome, FederationClient};
    use std::sync::Arc;

    struct RefuseAll;

    #[async_trait]
    impl FederationClient for RefuseAll {
        async fn deliver(&self, _payload: &Value, _inbox: &Url) -> DeliveryOutcome {
            DeliveryOutcome::Permanent
        }
    }

    #[tokio::test]
    async fn empty_inbox_list_is_a_no_op() {
        let scheduler = DeliveryScheduler::new(DeliveryConfig::default(), Arc::new(RefuseAll));
        let delivery = ChannelDelivery::new(&scheduler);

        // Nothing is pushed, so this succeeds even though the scheduler
        // never started.
        delivery
            .queue_activity("acct_1", serde_json::json!({}), Vec::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn duplicate_inboxes_collapse_into_one_recipient() {
        let scheduler = DeliveryScheduler::new(DeliveryConfig::default(), Arc::new(RefuseAll));
        let delivery = ChannelDelivery::new(&scheduler);

        let inbox: Url = "https://remote.example/inbox".parse().unwrap();
        delivery
            .queue_activity(
                "acct_1",
                serde_json::json!({"type": "Create"}),
                vec![inbox.clone(), inbox.clone(), inbox],
            )
            .await
            .unwrap();
    }
}
