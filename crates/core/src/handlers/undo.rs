//! Undo side effects: unfollow, unfave, unboost, unblock.

use std::sync::Arc;

use async_trait::async_trait;
use corvid_common::AppResult;
use tracing::{debug, info};

use crate::activity::{Activity, ActivityOrigin};
use crate::model::{Block, Follow};
use crate::payload::collect_inboxes;

use super::{HandlerContext, SideEffectHandler};

/// Handles `Follow/Undo` from both origins.
///
/// Removes the follow (and any still-pending request) between actor and
/// target; a client-originated unfollow of a remote account also delivers
/// the wrapping Undo.
pub struct FollowUndoHandler {
    ctx: Arc<HandlerContext>,
}

impl FollowUndoHandler {
    /// Create the handler.
    #[must_use]
    pub const fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SideEffectHandler for FollowUndoHandler {
    async fn handle(&self, activity: &Activity) -> AppResult<()> {
        let target = self.ctx.require_target(activity).await?;
        let storage = &self.ctx.storage;

        if let Some(follow) = storage.follow_between(&activity.actor_id, &target.id).await? {
            storage.delete_follow(&follow.id).await?;
        }
        if let Some(request) = storage
            .follow_request_between(&activity.actor_id, &target.id)
            .await?
        {
            storage.delete_follow_request(&request.id).await?;
        }
        self.ctx.notifier.invalidate(&activity.entity_id).await?;

        if activity.origin == ActivityOrigin::ClientApi && target.is_remote() {
            let inboxes = collect_inboxes(std::slice::from_ref(&target));
            if !inboxes.is_empty() {
                let follow = Follow {
                    id: activity.entity_id.clone(),
                    account_id: activity.actor_id.clone(),
                    target_account_id: target.id.clone(),
                };
                let object = self.ctx.payloads.follow(&follow, &target);
                let payload = self.ctx.payloads.undo(&activity.actor_id, object);
                self.ctx
                    .delivery
                    .queue_activity(&activity.actor_id, payload, inboxes)
                    .await?;
            }
        }

        info!(
            follow_id = %activity.entity_id,
            follower = %activity.actor_id,
            target = %target.id,
            origin = activity.origin.as_str(),
            "follow undo processed"
        );
        Ok(())
    }
}

/// Handles `Like/Undo` from both origins.
///
/// Drops the fave row, tombstones its notification, and, for a
/// client-originated unfave of a remote author's status, delivers the Undo
/// to that author.
pub struct LikeUndoHandler {
    ctx: Arc<HandlerContext>,
}

impl LikeUndoHandler {
    /// Create the handler.
    #[must_use]
    pub const fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SideEffectHandler for LikeUndoHandler {
    async fn handle(&self, activity: &Activity) -> AppResult<()> {
        let storage = &self.ctx.storage;
        let fave = storage.fave(&activity.entity_id).await?;

        self.ctx.notifier.invalidate(&activity.entity_id).await?;
        storage.delete_fave(&activity.entity_id).await?;

        if activity.origin == ActivityOrigin::ClientApi {
            let author = self.ctx.require_target(activity).await?;
            if author.is_remote() {
                match fave {
                    Some(fave) => {
                        let inboxes = collect_inboxes(std::slice::from_ref(&author));
                        if !inboxes.is_empty() {
                            let object = self.ctx.payloads.like(&fave);
                            let payload = self.ctx.payloads.undo(&activity.actor_id, object);
                            self.ctx
                                .delivery
                                .queue_activity(&activity.actor_id, payload, inboxes)
                                .await?;
                        }
                    }
                    None => {
                        // Already gone before we could read it; the Undo
                        // payload cannot be reconstructed from the id alone.
                        debug!(
                            fave_id = %activity.entity_id,
                            "fave missing, skipping undo delivery"
                        );
                    }
                }
            }
        }

        info!(
            fave_id = %activity.entity_id,
            actor = %activity.actor_id,
            origin = activity.origin.as_str(),
            "like undo processed"
        );
        Ok(())
    }
}

/// Handles `Boost/Undo` from the client.
///
/// Removes the boost status from every timeline, tombstones notifications
/// referencing it, and delivers the Undo of the original Announce to the
/// booster's remote followers.
pub struct BoostUndoHandler {
    ctx: Arc<HandlerContext>,
}

impl BoostUndoHandler {
    /// Create the handler.
    #[must_use]
    pub const fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SideEffectHandler for BoostUndoHandler {
    async fn handle(&self, activity: &Activity) -> AppResult<()> {
        let storage = &self.ctx.storage;
        let boost = storage.status(&activity.entity_id).await?;

        storage.timeline_remove_status(&activity.entity_id).await?;
        self.ctx.notifier.invalidate(&activity.entity_id).await?;
        storage.delete_status(&activity.entity_id).await?;

        if let Some(boost) = boost {
            let inboxes = self.ctx.remote_follower_inboxes(&activity.actor_id).await?;
            if !inboxes.is_empty() {
                let boosted_url = boost
                    .boost_of_id
                    .as_deref()
                    .map(|id| self.ctx.payloads.status_url(id))
                    .unwrap_or_default();
                let object = self.ctx.payloads.announce(&boost, &boosted_url);
                let payload = self.ctx.payloads.undo(&activity.actor_id, object);
                self.ctx
                    .delivery
                    .queue_activity(&activity.actor_id, payload, inboxes)
                    .await?;
            }
        }

        info!(
            boost_id = %activity.entity_id,
            actor = %activity.actor_id,
            "boost undo processed"
        );
        Ok(())
    }
}

/// Handles `Block/Undo` from the client.
pub struct BlockUndoHandler {
    ctx: Arc<HandlerContext>,
}

impl BlockUndoHandler {
    /// Create the handler.
    #[must_use]
    pub const fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SideEffectHandler for BlockUndoHandler {
    async fn handle(&self, activity: &Activity) -> AppResult<()> {
        let target = self.ctx.require_target(activity).await?;

        self.ctx.storage.delete_block(&activity.entity_id).await?;

        if target.is_remote() {
            let inboxes = collect_inboxes(std::slice::from_ref(&target));
            if !inboxes.is_empty() {
                let block = Block {
                    id: activity.entity_id.clone(),
                    account_id: activity.actor_id.clone(),
                    target_account_id: target.id.clone(),
                };
                let object = self.ctx.payloads.block(&block, &target);
                let payload = self.ctx.payloads.undo(&activity.actor_id, object);
                self.ctx
                    .delivery
                    .queue_activity(&activity.actor_id, payload, inboxes)
                    .await?;
            }
        }

        info!(
            block_id = %activity.entity_id,
            actor = %activity.actor_id,
            target = %target.id,
            "block undo processed"
        );
        Ok(())
    }
}
