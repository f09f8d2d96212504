//! Deletion side effects: statuses and whole accounts.

use std::sync::Arc;

use async_trait::async_trait;
use corvid_common::AppResult;
use tracing::info;

use crate::activity::{Activity, ActivityOrigin};

use super::{HandlerContext, SideEffectHandler};

/// Handles `Status/Delete` from both origins.
///
/// Cascades locally (timeline caches, notification tombstones) and, for
/// client-originated deletes, sends a Tombstone to the same audience the
/// Create used. The status row itself may already be gone, since the root
/// write committed before enqueue, so the cascade works from identifiers
/// alone.
pub struct StatusDeleteHandler {
    ctx: Arc<HandlerContext>,
}

impl StatusDeleteHandler {
    /// Create the handler.
    #[must_use]
    pub const fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SideEffectHandler for StatusDeleteHandler {
    async fn handle(&self, activity: &Activity) -> AppResult<()> {
        let status_id = &activity.entity_id;
        let storage = &self.ctx.storage;

        storage.timeline_remove_status(status_id).await?;
        self.ctx.notifier.invalidate(status_id).await?;
        storage.delete_status(status_id).await?;

        if activity.origin == ActivityOrigin::ClientApi {
            let inboxes = self.ctx.remote_follower_inboxes(&activity.actor_id).await?;
            if !inboxes.is_empty() {
                let payload = self
                    .ctx
                    .payloads
                    .delete_status(&activity.actor_id, status_id);
                self.ctx
                    .delivery
                    .queue_activity(&activity.actor_id, payload, inboxes)
                    .await?;
            }
        }

        info!(
            status_id = %status_id,
            actor = %activity.actor_id,
            origin = activity.origin.as_str(),
            "status delete processed"
        );
        Ok(())
    }
}

/// Handles `Account/Delete` from both origins.
///
/// Purges the account's statuses from every timeline, tombstones its
/// notifications, removes its relationships, and, for local self-deletes,
/// announces the deletion to the account's remote followers.
pub struct AccountDeleteHandler {
    ctx: Arc<HandlerContext>,
}

impl AccountDeleteHandler {
    /// Create the handler.
    #[must_use]
    pub const fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SideEffectHandler for AccountDeleteHandler {
    async fn handle(&self, activity: &Activity) -> AppResult<()> {
        let account_id = &activity.entity_id;
        let storage = &self.ctx.storage;

        // Collect the delivery audience before relationships are purged.
        let inboxes = if activity.origin == ActivityOrigin::ClientApi {
            self.ctx.remote_follower_inboxes(account_id).await?
        } else {
            Vec::new()
        };

        for status in storage.statuses_by_account(account_id).await? {
            storage.timeline_remove_status(&status.id).await?;
            self.ctx.notifier.invalidate(&status.id).await?;
            storage.delete_status(&status.id).await?;
        }

        storage.purge_relationships(account_id).await?;
        self.ctx.notifier.invalidate(account_id).await?;
        storage.delete_account(account_id).await?;

        if !inboxes.is_empty() {
            let payload = self.ctx.payloads.delete_account(account_id);
            self.ctx
                .delivery
                .queue_activity(account_id, payload, inboxes)
                .await?;
        }

        info!(
            account_id = %account_id,
            origin = activity.origin.as_str(),
            "account delete processed"
        );
        Ok(())
    }
}
