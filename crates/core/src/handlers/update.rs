//! Account update side effects.

use std::sync::Arc;

use async_trait::async_trait;
use corvid_common::AppResult;
use tracing::{debug, info};

use crate::activity::{Activity, ActivityOrigin};

use super::{HandlerContext, SideEffectHandler};

/// Handles `Account/Update` from both origins.
///
/// The refreshed record itself was written before enqueue, like every root
/// write. Client origin fans the Update out to the account's remote
/// followers; federator origin has no further local effect.
pub struct AccountUpdateHandler {
    ctx: Arc<HandlerContext>,
}

impl AccountUpdateHandler {
    /// Create the handler.
    #[must_use]
    pub const fn new(ctx: Arc<HandlerContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl SideEffectHandler for AccountUpdateHandler {
    async fn handle(&self, activity: &Activity) -> AppResult<()> {
        let account = self.ctx.require_account(&activity.entity_id).await?;

        match activity.origin {
            ActivityOrigin::ClientApi => {
                let inboxes = self.ctx.remote_follower_inboxes(&account.id).await?;
                if !inboxes.is_empty() {
                    let payload = self.ctx.payloads.update_account(&account);
                    self.ctx
                        .delivery
                        .queue_activity(&account.id, payload, inboxes)
                        .await?;
                }
            }
            ActivityOrigin::Federator => {
                debug!(account_id = %account.id, "remote account record refreshed");
            }
        }

        info!(
            account_id = %account.id,
            origin = activity.origin.as_str(),
            "account update processed"
        );
        Ok(())
    }
}
