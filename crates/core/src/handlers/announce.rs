//! Boost (announce) side effects.

use std::sync::Arc;

use async_trait::async_trait;
use corvid_common::{AppError, AppResult};
use tracing::{debug, info};

use crate::activity::{Activity, ActivityOrigin};
use crate::model::Account;
use crate::payload::collect_inboxes;
use crate::services::NotificationKind;

use super::{HandlerContext, SideEffectHandler};

/// Handles `Boost/Create` from both origins.
///
/// A boost is a status row whose `boost_of_id` names the boosted status.
/// Fan-out mirrors `Status/Create`; additionally the boosted author is
/// notified when local.
pub struct BoostCreateHandler {
    ctx: Arc<HandlerContext>,
}

impl BoostCreateHandler {
    /// Create the handler.
    #[must_use]
    pub const fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }

    async fn notify_boosted_author(&self, boost_id: &str, boosted_status_id: &str) -> AppResult<()> {
        let Some(boosted) = self.ctx.storage.status(boosted_status_id).await? else {
            debug!(status_id = %boosted_status_id, "boosted status unknown, skipping notification");
            return Ok(());
        };
        if let Some(author) = self.ctx.storage.account(&boosted.account_id).await? {
            if !author.is_remote() {
                self.ctx
                    .notifier
                    .notify(&author.id, NotificationKind::Boost, boost_id)
                    .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SideEffectHandler for BoostCreateHandler {
    async fn handle(&self, activity: &Activity) -> AppResult<()> {
        let boost = self
            .ctx
            .storage
            .status(&activity.entity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("boost {}", activity.entity_id)))?;
        let boosted_status_id = boost.boost_of_id.clone().ok_or_else(|| {
            AppError::BadRequest(format!("status {} is not a boost", boost.id))
        })?;

        let followers = self.ctx.storage.followers_of(&boost.account_id).await?;
        let local_followers: Vec<&Account> =
            followers.iter().filter(|f| !f.is_remote()).collect();

        match activity.origin {
            ActivityOrigin::ClientApi => {
                self.ctx
                    .storage
                    .timeline_insert(&boost.account_id, &boost.id)
                    .await?;
                for follower in &local_followers {
                    self.ctx
                        .storage
                        .timeline_insert(&follower.id, &boost.id)
                        .await?;
                }
                self.notify_boosted_author(&boost.id, &boosted_status_id)
                    .await?;

                let inboxes = collect_inboxes(&followers);
                if !inboxes.is_empty() {
                    let boosted_url = self.ctx.payloads.status_url(&boosted_status_id);
                    let payload = self.ctx.payloads.announce(&boost, &boosted_url);
                    self.ctx
                        .delivery
                        .queue_activity(&boost.account_id, payload, inboxes)
                        .await?;
                }
            }
            ActivityOrigin::Federator => {
                if local_followers.is_empty() {
                    debug!(
                        boost_id = %boost.id,
                        booster = %boost.account_id,
                        "remote boost relevant to no local account, discarding"
                    );
                    return Ok(());
                }
                for follower in &local_followers {
                    self.ctx
                        .storage
                        .timeline_insert(&follower.id, &boost.id)
                        .await?;
                }
                self.notify_boosted_author(&boost.id, &boosted_status_id)
                    .await?;
            }
        }

        info!(
            boost_id = %boost.id,
            boosted = %boosted_status_id,
            actor = %activity.actor_id,
            origin = activity.origin.as_str(),
            "boost create processed"
        );
        Ok(())
    }
}
