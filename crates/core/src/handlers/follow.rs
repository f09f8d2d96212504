//! Follow creation side effects.

use std::sync::Arc;

use async_trait::async_trait;
use corvid_common::AppResult;
use tracing::info;

use crate::activity::{Activity, ActivityOrigin};
use crate::model::{Account, Follow, FollowRequest};
use crate::payload::collect_inboxes;
use crate::services::NotificationKind;

use super::{HandlerContext, SideEffectHandler};

/// Handles `Follow/Create` from both origins.
///
/// Client origin: a remote target gets a pending request plus a Follow
/// delivery; a local target resolves per its manual-approval setting.
/// Federator origin: an inbound follow of a local account, answered with an
/// Accept delivery when the target is unlocked.
pub struct FollowCreateHandler {
    ctx: Arc<HandlerContext>,
}

impl FollowCreateHandler {
    /// Create the handler.
    #[must_use]
    pub const fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }

    async fn record_request(&self, activity: &Activity, target: &Account) -> AppResult<()> {
        self.ctx
            .storage
            .upsert_follow_request(FollowRequest {
                id: activity.entity_id.clone(),
                account_id: activity.actor_id.clone(),
                target_account_id: target.id.clone(),
            })
            .await
    }

    async fn record_follow(&self, activity: &Activity, target: &Account) -> AppResult<()> {
        self.ctx
            .storage
            .upsert_follow(Follow {
                id: activity.entity_id.clone(),
                account_id: activity.actor_id.clone(),
                target_account_id: target.id.clone(),
            })
            .await
    }

    async fn from_client(&self, activity: &Activity, target: &Account) -> AppResult<()> {
        if target.is_remote() {
            self.record_request(activity, target).await?;

            let inboxes = collect_inboxes(std::slice::from_ref(target));
            if !inboxes.is_empty() {
                let follow = Follow {
                    id: activity.entity_id.clone(),
                    account_id: activity.actor_id.clone(),
                    target_account_id: target.id.clone(),
                };
                let payload = self.ctx.payloads.follow(&follow, target);
                self.ctx
                    .delivery
                    .queue_activity(&activity.actor_id, payload, inboxes)
                    .await?;
            }
            return Ok(());
        }

        if target.locked {
            self.record_request(activity, target).await?;
            self.ctx
                .notifier
                .notify(&target.id, NotificationKind::FollowRequest, &activity.entity_id)
                .await?;
        } else {
            self.record_follow(activity, target).await?;
            self.ctx
                .notifier
                .notify(&target.id, NotificationKind::Follow, &activity.entity_id)
                .await?;
        }
        Ok(())
    }

    async fn from_federator(&self, activity: &Activity, target: &Account) -> AppResult<()> {
        if target.locked {
            self.record_request(activity, target).await?;
            self.ctx
                .notifier
                .notify(&target.id, NotificationKind::FollowRequest, &activity.entity_id)
                .await?;
            return Ok(());
        }

        self.record_follow(activity, target).await?;
        self.ctx
            .notifier
            .notify(&target.id, NotificationKind::Follow, &activity.entity_id)
            .await?;

        // Answer the unlocked follow with an Accept.
        let follower = self.ctx.require_account(&activity.actor_id).await?;
        let inboxes = collect_inboxes(std::slice::from_ref(&follower));
        if !inboxes.is_empty() {
            let payload =
                self.ctx
                    .payloads
                    .accept_follow(&target.id, &follower, &activity.entity_id);
            self.ctx
                .delivery
                .queue_activity(&target.id, payload, inboxes)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SideEffectHandler for FollowCreateHandler {
    async fn handle(&self, activity: &Activity) -> AppResult<()> {
        let target = self.ctx.require_target(activity).await?;

        match activity.origin {
            ActivityOrigin::ClientApi => self.from_client(activity, &target).await?,
            ActivityOrigin::Federator => self.from_federator(activity, &target).await?,
        }

        info!(
            follow_id = %activity.entity_id,
            follower = %activity.actor_id,
            target = %target.id,
            origin = activity.origin.as_str(),
            "follow create processed"
        );
        Ok(())
    }
}
