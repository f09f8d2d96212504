//! Follow rejection side effects.

use std::sync::Arc;

use async_trait::async_trait;
use corvid_common::{AppError, AppResult};
use tracing::info;

use crate::activity::Activity;

use super::{HandlerContext, SideEffectHandler};

/// Handles `Follow/Reject` from the federator.
///
/// A remote account declined a local account's follow request; the pending
/// request is dropped quietly (no notification, matching the client-facing
/// convention of not surfacing rejections).
pub struct FollowRejectHandler {
    ctx: Arc<HandlerContext>,
}

impl FollowRejectHandler {
    /// Create the handler.
    #[must_use]
    pub const fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SideEffectHandler for FollowRejectHandler {
    async fn handle(&self, activity: &Activity) -> AppResult<()> {
        let requester_id = activity.target_account_id.as_deref().ok_or_else(|| {
            AppError::BadRequest(format!(
                "reject activity {} names no requester",
                activity.entity_id
            ))
        })?;

        if let Some(request) = self
            .ctx
            .storage
            .follow_request_between(requester_id, &activity.actor_id)
            .await?
        {
            self.ctx.storage.delete_follow_request(&request.id).await?;
        }

        info!(
            follow_id = %activity.entity_id,
            requester = %requester_id,
            rejecter = %activity.actor_id,
            "follow reject processed"
        );
        Ok(())
    }
}
