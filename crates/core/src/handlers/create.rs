//! Status creation side effects.

use std::sync::Arc;

use async_trait::async_trait;
use corvid_common::{AppError, AppResult};
use tracing::{debug, info};

use crate::activity::{Activity, ActivityOrigin};
use crate::model::{Account, Status, Visibility};
use crate::payload::collect_inboxes;
use crate::services::NotificationKind;

use super::{HandlerContext, SideEffectHandler};

/// Handles `Status/Create` from both origins.
///
/// Client origin: home-timeline fan-in, mention notifications and remote
/// delivery. Federator origin: relevance check first; a status nobody local
/// follows or is mentioned in is discarded without side effects.
pub struct StatusCreateHandler {
    ctx: Arc<HandlerContext>,
}

impl StatusCreateHandler {
    /// Create the handler.
    #[must_use]
    pub const fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }

    async fn from_client(&self, status: &Status) -> AppResult<()> {
        let storage = &self.ctx.storage;
        let followers = storage.followers_of(&status.account_id).await?;

        // Author sees their own status.
        storage
            .timeline_insert(&status.account_id, &status.id)
            .await?;

        if status.visibility != Visibility::Direct {
            for follower in followers.iter().filter(|f| !f.is_remote()) {
                storage.timeline_insert(&follower.id, &status.id).await?;
            }
        }

        let mut remote_audience: Vec<Account> = if status.visibility == Visibility::Direct {
            Vec::new()
        } else {
            followers.into_iter().filter(Account::is_remote).collect()
        };

        for mention_id in &status.mention_ids {
            let Some(mentioned) = storage.account(mention_id).await? else {
                debug!(account_id = %mention_id, "mentioned account unknown, skipping");
                continue;
            };
            if mentioned.is_remote() {
                remote_audience.push(mentioned);
            } else {
                self.ctx
                    .notifier
                    .notify(&mentioned.id, NotificationKind::Mention, &status.id)
                    .await?;
            }
        }

        // Local effects are complete; only now schedule remote fan-out.
        let inboxes = collect_inboxes(&remote_audience);
        if !inboxes.is_empty() {
            let payload = self.ctx.payloads.create_status(status);
            self.ctx
                .delivery
                .queue_activity(&status.account_id, payload, inboxes)
                .await?;
        }

        Ok(())
    }

    async fn from_federator(&self, status: &Status) -> AppResult<()> {
        let storage = &self.ctx.storage;
        let followers = storage.followers_of(&status.account_id).await?;
        let local_followers: Vec<Account> = followers
            .into_iter()
            .filter(|f| !f.is_remote())
            .collect();

        let mut local_mentions: Vec<Account> = Vec::new();
        for mention_id in &status.mention_ids {
            if let Some(account) = storage.account(mention_id).await? {
                if !account.is_remote() {
                    local_mentions.push(account);
                }
            }
        }

        let replied_to_local = match &status.in_reply_to_account_id {
            Some(id) => storage.account(id).await?.is_some_and(|a| !a.is_remote()),
            None => false,
        };

        if local_followers.is_empty() && local_mentions.is_empty() && !replied_to_local {
            debug!(
                status_id = %status.id,
                author = %status.account_id,
                "remote status relevant to no local account, discarding"
            );
            return Ok(());
        }

        if status.visibility != Visibility::Direct {
            for follower in &local_followers {
                storage.timeline_insert(&follower.id, &status.id).await?;
            }
        }

        for mentioned in &local_mentions {
            self.ctx
                .notifier
                .notify(&mentioned.id, NotificationKind::Mention, &status.id)
                .await?;
        }

        if replied_to_local {
            if let Some(replied_to) = &status.in_reply_to_account_id {
                if !status.mention_ids.contains(replied_to) {
                    self.ctx
                        .notifier
                        .notify(replied_to, NotificationKind::Reply, &status.id)
                        .await?;
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl SideEffectHandler for StatusCreateHandler {
    async fn handle(&self, activity: &Activity) -> AppResult<()> {
        let status = self
            .ctx
            .storage
            .status(&activity.entity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("status {}", activity.entity_id)))?;

        match activity.origin {
            ActivityOrigin::ClientApi => self.from_client(&status).await?,
            ActivityOrigin::Federator => self.from_federator(&status).await?,
        }

        info!(
            status_id = %status.id,
            author = %status.account_id,
            origin = activity.origin.as_str(),
            "status create processed"
        );
        Ok(())
    }
}
