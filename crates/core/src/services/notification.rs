//! Notification sink capability.

use std::fmt;

use async_trait::async_trait;
use corvid_common::AppResult;
use tokio::sync::Mutex;

/// Kinds of notifications the handlers emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// Someone followed the account.
    Follow,
    /// Someone requested to follow the account.
    FollowRequest,
    /// An outgoing follow request was accepted.
    FollowAccepted,
    /// The account was mentioned in a status.
    Mention,
    /// Someone replied to the account's status.
    Reply,
    /// Someone faved the account's status.
    Fave,
    /// Someone boosted the account's status.
    Boost,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Follow => "follow",
            Self::FollowRequest => "follow_request",
            Self::FollowAccepted => "follow_accepted",
            Self::Mention => "mention",
            Self::Reply => "reply",
            Self::Fave => "fave",
            Self::Boost => "boost",
        };
        f.write_str(label)
    }
}

/// A notification as recorded by the sink.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Notification {
    /// The account being notified.
    pub account_id: String,
    /// What happened.
    pub kind: NotificationKind,
    /// The entity that caused the notification.
    pub source_entity_id: String,
}

/// Notification capability.
///
/// `notify` must be idempotent on (account, kind, source entity) so that
/// re-processing an activity never produces a duplicate notification.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Record a notification for an account.
    async fn notify(
        &self,
        account_id: &str,
        kind: NotificationKind,
        source_entity_id: &str,
    ) -> AppResult<()>;

    /// Tombstone every notification referencing the given entity.
    async fn invalidate(&self, source_entity_id: &str) -> AppResult<()>;
}

/// In-memory [`NotificationSink`] implementation used by the test suites.
#[derive(Default)]
pub struct MemoryNotifications {
    entries: Mutex<Vec<Notification>>,
}

impl MemoryNotifications {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All currently live notifications, in emission order.
    pub async fn all(&self) -> Vec<Notification> {
        self.entries.lock().await.clone()
    }

    /// Live notifications for one account.
    pub async fn for_account(&self, account_id: &str) -> Vec<Notification> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|n| n.account_id == account_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotifications {
    async fn notify(
        &self,
        account_id: &str,
        kind: NotificationKind,
        source_entity_id: &str,
    ) -> AppResult<()> {
        let notification = Notification {
            account_id: account_id.to_string(),
            kind,
            source_entity_id: source_entity_id.to_string(),
        };
        let mut entries = self.entries.lock().await;
        if !entries.contains(&notification) {
            entries.push(notification);
        }
        Ok(())
    }

    async fn invalidate(&self, source_entity_id: &str) -> AppResult<()> {
        self.entries
            .lock()
            .await
            .retain(|n| n.source_entity_id != source_entity_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[tokio::test]
    async fn test_notify_is_idempotent() {
        let sink = MemoryNotifications::new();

        sink.notify("a", NotificationKind::Fave, "fave-1").await.ok();
        sink.notify("a", NotificationKind::Fave, "fave-1").await.ok();

        assert_eq!(sink.all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_removes_by_source() {
        let sink = MemoryNotifications::new();

        sink.notify("a", NotificationKind::Mention, "status-1").await.ok();
        sink.notify("b", NotificationKind::Reply, "status-1").await.ok();
        sink.notify("a", NotificationKind::Fave, "fave-1").await.ok();

        sink.invalidate("status-1").await.ok();

        let remaining = sink.all().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].source_entity_id, "fave-1");
    }

    #[test]
    fn test_kind_labels_are_unique() {
        let kinds = [
            NotificationKind::Follow,
            NotificationKind::FollowRequest,
            NotificationKind::FollowAccepted,
            NotificationKind::Mention,
            NotificationKind::Reply,
            NotificationKind::Fave,
            NotificationKind::Boost,
        ];
        let labels: HashSet<String> = kinds.iter().map(ToString::to_string).collect();
        assert_eq!(labels.len(), kinds.len());
    }
}
