//! Fave (like) side effects.

use std::sync::Arc;

use async_trait::async_trait;
use corvid_common::{AppError, AppResult};
use tracing::info;

use crate::activity::{Activity, ActivityOrigin};
use crate::payload::collect_inboxes;
use crate::services::NotificationKind;

use super::{HandlerContext, SideEffectHandler};

/// Handles `Like/Create` from both origins.
///
/// Notifies the faved status's author when local; a client-originated fave
/// of a remote author's status is additionally delivered to that author.
pub struct LikeCreateHandler {
    ctx: Arc<HandlerContext>,
}

impl LikeCreateHandler {
    /// Create the handler.
    #[must_use]
    pub const fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SideEffectHandler for LikeCreateHandler {
    async fn handle(&self, activity: &Activity) -> AppResult<()> {
        let fave = self
            .ctx
            .storage
            .fave(&activity.entity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("fave {}", activity.entity_id)))?;
        let author = self.ctx.require_target(activity).await?;

        if author.is_remote() {
            if activity.origin == ActivityOrigin::ClientApi {
                let inboxes = collect_inboxes(std::slice::from_ref(&author));
                if !inboxes.is_empty() {
                    let payload = self.ctx.payloads.like(&fave);
                    self.ctx
                        .delivery
                        .queue_activity(&activity.actor_id, payload, inboxes)
                        .await?;
                }
            }
        } else {
            self.ctx
                .notifier
                .notify(&author.id, NotificationKind::Fave, &fave.id)
                .await?;
        }

        info!(
            fave_id = %fave.id,
            status_id = %fave.status_id,
            actor = %activity.actor_id,
            origin = activity.origin.as_str(),
            "like create processed"
        );
        Ok(())
    }
}
