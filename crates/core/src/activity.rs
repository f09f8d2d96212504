//! The activity model: the unit of work flowing through the engine.

#![allow(missing_docs)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an activity entered the engine.
///
/// The origin determines the trust level and which handler subset applies:
/// client-originated activities fan out to remote peers, federator-originated
/// activities materialise remote events into local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityOrigin {
    /// Enqueued by the client-facing API after a local write committed.
    ClientApi,
    /// Enqueued by the inbound federation handler after authentication.
    Federator,
}

impl ActivityOrigin {
    /// Short label used in structured logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClientApi => "client_api",
            Self::Federator => "federator",
        }
    }
}

/// The verb an activity carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ActivityVerb {
    Create,
    Update,
    Delete,
    Accept,
    Reject,
    Follow,
    Undo,
    /// Boost in client terms.
    Announce,
    Like,
    Block,
    Flag,
}

impl ActivityVerb {
    /// Short label used in structured logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Follow => "follow",
            Self::Undo => "undo",
            Self::Announce => "announce",
            Self::Like => "like",
            Self::Block => "block",
            Self::Flag => "flag",
        }
    }
}

/// The logical object type an activity operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum EntityKind {
    Account,
    Status,
    Follow,
    FollowRequest,
    Like,
    Boost,
    Block,
    Report,
}

impl EntityKind {
    /// Short label used in structured logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Status => "status",
            Self::Follow => "follow",
            Self::FollowRequest => "follow_request",
            Self::Like => "like",
            Self::Boost => "boost",
            Self::Block => "block",
            Self::Report => "report",
        }
    }
}

/// The unit of work flowing through the engine.
///
/// An activity is immutable after construction: handlers read it but never
/// mutate it. The `actor_id` is already resolved and authenticated by the
/// caller before enqueue; the engine never re-derives that trust decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Where this activity entered the engine.
    pub origin: ActivityOrigin,
    /// The verb performed.
    pub verb: ActivityVerb,
    /// The logical object type carried.
    pub entity_kind: EntityKind,
    /// Identifier of the object to operate on (owned by the persistence layer).
    pub entity_id: String,
    /// Identifier of the account performing the action.
    pub actor_id: String,
    /// Identifier of the account the action targets, if any.
    pub target_account_id: Option<String>,
    /// When the activity was enqueued. Diagnostics only, never used for ordering.
    pub received_at: DateTime<Utc>,
}

impl Activity {
    /// Create a new activity stamped with the current time.
    #[must_use]
    pub fn new(
        origin: ActivityOrigin,
        verb: ActivityVerb,
        entity_kind: EntityKind,
        entity_id: impl Into<String>,
        actor_id: impl Into<String>,
    ) -> Self {
        Self {
            origin,
            verb,
            entity_kind,
            entity_id: entity_id.into(),
            actor_id: actor_id.into(),
            target_account_id: None,
            received_at: Utc::now(),
        }
    }

    /// Set the target account for actions aimed at another account.
    #[must_use]
    pub fn with_target(mut self, target_account_id: impl Into<String>) -> Self {
        self.target_account_id = Some(target_account_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_construction() {
        let activity = Activity::new(
            ActivityOrigin::ClientApi,
            ActivityVerb::Follow,
            EntityKind::Follow,
            "follow-1",
            "account-a",
        )
        .with_target("account-b");

        assert_eq!(activity.entity_id, "follow-1");
        assert_eq!(activity.actor_id, "account-a");
        assert_eq!(activity.target_account_id.as_deref(), Some("account-b"));
        assert_eq!(activity.origin.as_str(), "client_api");
        assert_eq!(activity.verb.as_str(), "follow");
        assert_eq!(activity.entity_kind.as_str(), "follow");
    }
}
