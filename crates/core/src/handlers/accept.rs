//! Follow acceptance side effects.

use std::sync::Arc;

use async_trait::async_trait;
use corvid_common::{AppError, AppResult};
use tracing::{debug, info};

use crate::activity::Activity;
use crate::model::Follow;
use crate::services::NotificationKind;

use super::{HandlerContext, SideEffectHandler};

/// Handles `Follow/Accept` from the federator.
///
/// A remote account (`actor_id`) accepted a pending outgoing follow request
/// from a local account (`target_account_id`): flip the request into a
/// follow and tell the requester.
pub struct FollowAcceptHandler {
    ctx: Arc<HandlerContext>,
}

impl FollowAcceptHandler {
    /// Create the handler.
    #[must_use]
    pub const fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SideEffectHandler for FollowAcceptHandler {
    async fn handle(&self, activity: &Activity) -> AppResult<()> {
        let requester_id = activity.target_account_id.as_deref().ok_or_else(|| {
            AppError::BadRequest(format!(
                "accept activity {} names no requester",
                activity.entity_id
            ))
        })?;

        match self
            .ctx
            .storage
            .follow_request_between(requester_id, &activity.actor_id)
            .await?
        {
            Some(request) => {
                self.ctx.storage.delete_follow_request(&request.id).await?;
                self.ctx
                    .storage
                    .upsert_follow(Follow {
                        id: request.id,
                        account_id: request.account_id,
                        target_account_id: request.target_account_id,
                    })
                    .await?;
            }
            None => {
                // Duplicate Accept or a request already flipped; nothing to do
                // beyond the (idempotent) notification below.
                debug!(
                    requester = %requester_id,
                    accepter = %activity.actor_id,
                    "no pending follow request for accept"
                );
            }
        }

        self.ctx
            .notifier
            .notify(
                requester_id,
                NotificationKind::FollowAccepted,
                &activity.entity_id,
            )
            .await?;

        info!(
            follow_id = %activity.entity_id,
            requester = %requester_id,
            accepter = %activity.actor_id,
            "follow accept processed"
        );
        Ok(())
    }
}
