//! Side-effect handlers, one per (origin, entity kind, verb) combination.
//!
//! Handlers realise an activity's consequences: local fan-out into timelines
//! and notifications, plus scheduling of remote delivery. Every handler is
//! idempotent (re-applying the same activity produces no additional visible
//! change) because the engine offers no replay protection of its own.

mod accept;
mod announce;
mod block;
mod create;
mod delete;
mod follow;
mod like;
mod reject;
mod undo;
mod update;

pub use accept::FollowAcceptHandler;
pub use announce::BoostCreateHandler;
pub use block::BlockCreateHandler;
pub use create::StatusCreateHandler;
pub use delete::{AccountDeleteHandler, StatusDeleteHandler};
pub use follow::FollowCreateHandler;
pub use like::LikeCreateHandler;
pub use reject::FollowRejectHandler;
pub use undo::{BlockUndoHandler, BoostUndoHandler, FollowUndoHandler, LikeUndoHandler};
pub use update::AccountUpdateHandler;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use corvid_common::{AppError, AppResult};
use url::Url;

use crate::activity::{Activity, ActivityOrigin, ActivityVerb, EntityKind};
use crate::model::Account;
use crate::payload::{PayloadBuilder, collect_inboxes};
use crate::services::{ActivityDelivery, NotificationSink, Storage};

/// Shared collaborators available to every handler.
pub struct HandlerContext {
    /// Persistence capability.
    pub storage: Arc<dyn Storage>,
    /// Notification capability.
    pub notifier: Arc<dyn NotificationSink>,
    /// Remote delivery capability.
    pub delivery: Arc<dyn ActivityDelivery>,
    /// Payload builder bound to this instance.
    pub payloads: PayloadBuilder,
}

impl HandlerContext {
    /// Create a context from the capability handles.
    #[must_use]
    pub const fn new(
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn NotificationSink>,
        delivery: Arc<dyn ActivityDelivery>,
        payloads: PayloadBuilder,
    ) -> Self {
        Self {
            storage,
            notifier,
            delivery,
            payloads,
        }
    }

    /// Fetch an account, failing with `NotFound` when it is missing.
    pub async fn require_account(&self, id: &str) -> AppResult<Account> {
        self.storage
            .account(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {id}")))
    }

    /// The target account named by an activity, or a `BadRequest` error.
    pub async fn require_target(&self, activity: &Activity) -> AppResult<Account> {
        let target_id = activity.target_account_id.as_deref().ok_or_else(|| {
            AppError::BadRequest(format!(
                "{} activity {} names no target account",
                activity.verb.as_str(),
                activity.entity_id
            ))
        })?;
        self.require_account(target_id).await
    }

    /// Deduplicated remote inboxes of the given account's followers.
    pub async fn remote_follower_inboxes(&self, account_id: &str) -> AppResult<Vec<Url>> {
        let followers = self.storage.followers_of(account_id).await?;
        Ok(collect_inboxes(&followers))
    }
}

/// The unit of logic executed per (origin, entity kind, verb) combination.
#[async_trait]
pub trait SideEffectHandler: Send + Sync {
    /// Apply the activity's side effects. Local effects complete before any
    /// remote delivery is scheduled.
    async fn handle(&self, activity: &Activity) -> AppResult<()>;
}

type HandlerKey = (ActivityOrigin, EntityKind, ActivityVerb);

/// Immutable dispatch table from (origin, entity kind, verb) to handler.
///
/// Built once at processor construction; combinations without an entry are
/// dropped by the dispatcher as protocol-extension no-ops.
pub struct HandlerRegistry {
    handlers: HashMap<HandlerKey, Arc<dyn SideEffectHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Build the full default handler set over the given context.
    #[must_use]
    pub fn with_defaults(ctx: Arc<HandlerContext>) -> Self {
        use ActivityOrigin::{ClientApi, Federator};
        use ActivityVerb::{Accept, Create, Delete, Reject, Undo, Update};
        use EntityKind::{Account, Block, Boost, Follow, Like, Status};

        let mut registry = Self::new();

        let status_create = Arc::new(StatusCreateHandler::new(ctx.clone()));
        registry.register(ClientApi, Status, Create, status_create.clone());
        registry.register(Federator, Status, Create, status_create);

        let status_delete = Arc::new(StatusDeleteHandler::new(ctx.clone()));
        registry.register(ClientApi, Status, Delete, status_delete.clone());
        registry.register(Federator, Status, Delete, status_delete);

        let follow_create = Arc::new(FollowCreateHandler::new(ctx.clone()));
        registry.register(ClientApi, Follow, Create, follow_create.clone());
        registry.register(Federator, Follow, Create, follow_create.clone());
        // The bare Follow verb routes to the same handler as Follow/Create.
        registry.register(ClientApi, Follow, ActivityVerb::Follow, follow_create.clone());
        registry.register(Federator, Follow, ActivityVerb::Follow, follow_create);

        registry.register(
            Federator,
            Follow,
            Accept,
            Arc::new(FollowAcceptHandler::new(ctx.clone())),
        );
        registry.register(
            Federator,
            Follow,
            Reject,
            Arc::new(FollowRejectHandler::new(ctx.clone())),
        );

        let follow_undo = Arc::new(FollowUndoHandler::new(ctx.clone()));
        registry.register(ClientApi, Follow, Undo, follow_undo.clone());
        registry.register(Federator, Follow, Undo, follow_undo);

        let like_create = Arc::new(LikeCreateHandler::new(ctx.clone()));
        registry.register(ClientApi, Like, Create, like_create.clone());
        registry.register(Federator, Like, Create, like_create);

        let like_undo = Arc::new(LikeUndoHandler::new(ctx.clone()));
        registry.register(ClientApi, Like, Undo, like_undo.clone());
        registry.register(Federator, Like, Undo, like_undo);

        let boost_create = Arc::new(BoostCreateHandler::new(ctx.clone()));
        registry.register(ClientApi, Boost, Create, boost_create.clone());
        registry.register(Federator, Boost, Create, boost_create);

        registry.register(
            ClientApi,
            Boost,
            Undo,
            Arc::new(BoostUndoHandler::new(ctx.clone())),
        );

        let block_create = Arc::new(BlockCreateHandler::new(ctx.clone()));
        registry.register(ClientApi, Block, Create, block_create.clone());
        registry.register(Federator, Block, Create, block_create);

        registry.register(
            ClientApi,
            Block,
            Undo,
            Arc::new(BlockUndoHandler::new(ctx.clone())),
        );

        let account_update = Arc::new(AccountUpdateHandler::new(ctx.clone()));
        registry.register(ClientApi, Account, Update, account_update.clone());
        registry.register(Federator, Account, Update, account_update);

        let account_delete = Arc::new(AccountDeleteHandler::new(ctx.clone()));
        registry.register(ClientApi, Account, Delete, account_delete.clone());
        registry.register(Federator, Account, Delete, account_delete);

        registry
    }

    /// Register a handler for one combination, replacing any existing entry.
    pub fn register(
        &mut self,
        origin: ActivityOrigin,
        entity_kind: EntityKind,
        verb: ActivityVerb,
        handler: Arc<dyn SideEffectHandler>,
    ) {
        self.handlers.insert((origin, entity_kind, verb), handler);
    }

    /// Look up the handler for an activity.
    #[must_use]
    pub fn get(&self, activity: &Activity) -> Option<Arc<dyn SideEffectHandler>> {
        self.handlers
            .get(&(activity.origin, activity.entity_kind, activity.verb))
            .cloned()
    }

    /// Number of registered combinations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{MemoryNotifications, MemoryStorage, NoOpDelivery};

    fn test_context() -> Arc<HandlerContext> {
        let base: Url = "https://corvid.example/"
            .parse()
            .unwrap_or_else(|_| unreachable!());
        Arc::new(HandlerContext::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryNotifications::new()),
            Arc::new(NoOpDelivery),
            PayloadBuilder::new(base),
        ))
    }

    #[test]
    fn test_default_registry_covers_both_origins() {
        let registry = HandlerRegistry::with_defaults(test_context());

        let client_follow = Activity::new(
            ActivityOrigin::ClientApi,
            ActivityVerb::Create,
            EntityKind::Follow,
            "f1",
            "a1",
        );
        let federated_accept = Activity::new(
            ActivityOrigin::Federator,
            ActivityVerb::Accept,
            EntityKind::Follow,
            "f1",
            "a1",
        );

        assert!(registry.get(&client_follow).is_some());
        assert!(registry.get(&federated_accept).is_some());
    }

    #[test]
    fn test_follow_verb_aliases_follow_create() {
        let registry = HandlerRegistry::with_defaults(test_context());

        for origin in [ActivityOrigin::ClientApi, ActivityOrigin::Federator] {
            let aliased = Activity::new(
                origin,
                ActivityVerb::Follow,
                EntityKind::Follow,
                "f1",
                "a1",
            );
            assert!(registry.get(&aliased).is_some());
        }
    }

    #[test]
    fn test_report_flag_is_unregistered() {
        let registry = HandlerRegistry::with_defaults(test_context());

        let report = Activity::new(
            ActivityOrigin::ClientApi,
            ActivityVerb::Flag,
            EntityKind::Report,
            "r1",
            "a1",
        );

        assert!(registry.get(&report).is_none());
    }
}
