//! Block side effects.

use std::sync::Arc;

use async_trait::async_trait;
use corvid_common::AppResult;
use tracing::info;

use crate::activity::{Activity, ActivityOrigin};
use crate::model::Block;
use crate::payload::collect_inboxes;

use super::{HandlerContext, SideEffectHandler};

/// Handles `Block/Create` from both origins.
///
/// Purges any follow relationship in both directions, removes the blocked
/// actor's statuses already materialised in the blocker's timeline, and,
/// for client-originated blocks of remote accounts, delivers the Block.
pub struct BlockCreateHandler {
    ctx: Arc<HandlerContext>,
}

impl BlockCreateHandler {
    /// Create the handler.
    #[must_use]
    pub const fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SideEffectHandler for BlockCreateHandler {
    async fn handle(&self, activity: &Activity) -> AppResult<()> {
        let target = self.ctx.require_target(activity).await?;
        let storage = &self.ctx.storage;
        let blocker_id = &activity.actor_id;

        // Sever follows and pending requests in both directions.
        for (a, b) in [(blocker_id.as_str(), target.id.as_str()), (target.id.as_str(), blocker_id.as_str())] {
            if let Some(follow) = storage.follow_between(a, b).await? {
                storage.delete_follow(&follow.id).await?;
            }
            if let Some(request) = storage.follow_request_between(a, b).await? {
                storage.delete_follow_request(&request.id).await?;
            }
        }

        storage
            .timeline_remove_author(blocker_id, &target.id)
            .await?;

        storage
            .upsert_block(Block {
                id: activity.entity_id.clone(),
                account_id: blocker_id.clone(),
                target_account_id: target.id.clone(),
            })
            .await?;

        if activity.origin == ActivityOrigin::ClientApi && target.is_remote() {
            let inboxes = collect_inboxes(std::slice::from_ref(&target));
            if !inboxes.is_empty() {
                let block = Block {
                    id: activity.entity_id.clone(),
                    account_id: blocker_id.clone(),
                    target_account_id: target.id.clone(),
                };
                let payload = self.ctx.payloads.block(&block, &target);
                self.ctx
                    .delivery
                    .queue_activity(blocker_id, payload, inboxes)
                    .await?;
            }
        }

        info!(
            block_id = %activity.entity_id,
            blocker = %blocker_id,
            blocked = %target.id,
            origin = activity.origin.as_str(),
            "block create processed"
        );
        Ok(())
    }
}
