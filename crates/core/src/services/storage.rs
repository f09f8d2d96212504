//! Persistence capability consumed by the side-effect handlers.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use corvid_common::AppResult;
use tokio::sync::RwLock;

use crate::model::{Account, Block, Fave, Follow, FollowRequest, Status};

/// Persistence capability.
///
/// Every operation is assumed individually atomic and durable once it
/// returns success; the engine relies on that plus idempotent handler design
/// instead of multi-row transactions. Upserts must be safe to re-apply.
#[async_trait]
pub trait Storage: Send + Sync {
    // === Accounts ===
    async fn account(&self, id: &str) -> AppResult<Option<Account>>;
    async fn upsert_account(&self, account: Account) -> AppResult<()>;
    async fn delete_account(&self, id: &str) -> AppResult<()>;

    // === Statuses ===
    async fn status(&self, id: &str) -> AppResult<Option<Status>>;
    async fn upsert_status(&self, status: Status) -> AppResult<()>;
    async fn delete_status(&self, id: &str) -> AppResult<()>;
    async fn statuses_by_account(&self, account_id: &str) -> AppResult<Vec<Status>>;

    // === Follows ===
    async fn follow_between(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<Follow>>;
    async fn upsert_follow(&self, follow: Follow) -> AppResult<()>;
    async fn delete_follow(&self, id: &str) -> AppResult<()>;
    /// Accounts following the given account.
    async fn followers_of(&self, account_id: &str) -> AppResult<Vec<Account>>;

    // === Follow requests ===
    async fn follow_request_between(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<FollowRequest>>;
    async fn upsert_follow_request(&self, request: FollowRequest) -> AppResult<()>;
    async fn delete_follow_request(&self, id: &str) -> AppResult<()>;

    // === Faves ===
    async fn fave(&self, id: &str) -> AppResult<Option<Fave>>;
    async fn upsert_fave(&self, fave: Fave) -> AppResult<()>;
    async fn delete_fave(&self, id: &str) -> AppResult<()>;

    // === Blocks ===
    async fn upsert_block(&self, block: Block) -> AppResult<()>;
    async fn delete_block(&self, id: &str) -> AppResult<()>;

    // === Relationships cleanup ===
    /// Remove all follows, follow requests, faves and blocks involving the
    /// given account, in either direction.
    async fn purge_relationships(&self, account_id: &str) -> AppResult<()>;

    // === Home timelines ===
    /// Insert a status into an account's home timeline. Idempotent.
    async fn timeline_insert(&self, owner_id: &str, status_id: &str) -> AppResult<()>;
    /// Remove a status from every timeline it was materialised into.
    async fn timeline_remove_status(&self, status_id: &str) -> AppResult<()>;
    /// Remove all of one author's statuses from one owner's timeline.
    async fn timeline_remove_author(&self, owner_id: &str, author_id: &str) -> AppResult<()>;
    /// The owner's home timeline, in insertion order.
    async fn home_timeline(&self, owner_id: &str) -> AppResult<Vec<String>>;
}

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    statuses: HashMap<String, Status>,
    follows: HashMap<String, Follow>,
    follow_requests: HashMap<String, FollowRequest>,
    faves: HashMap<String, Fave>,
    blocks: HashMap<String, Block>,
    /// owner id -> status ids in insertion order
    timelines: HashMap<String, Vec<String>>,
}

/// In-memory [`Storage`] implementation.
///
/// Used by the test suites and usable as a stand-in where no external
/// persistence collaborator is wired up.
#[derive(Default)]
pub struct MemoryStorage {
    state: RwLock<MemoryState>,
    latency: Option<Duration>,
}

impl MemoryStorage {
    /// Create an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that sleeps before every operation.
    ///
    /// Timing-sensitive tests use this to widen race windows.
    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            state: RwLock::default(),
            latency: Some(latency),
        }
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn account(&self, id: &str) -> AppResult<Option<Account>> {
        self.pause().await;
        Ok(self.state.read().await.accounts.get(id).cloned())
    }

    async fn upsert_account(&self, account: Account) -> AppResult<()> {
        self.pause().await;
        self.state
            .write()
            .await
            .accounts
            .insert(account.id.clone(), account);
        Ok(())
    }

    async fn delete_account(&self, id: &str) -> AppResult<()> {
        self.pause().await;
        self.state.write().await.accounts.remove(id);
        Ok(())
    }

    async fn status(&self, id: &str) -> AppResult<Option<Status>> {
        self.pause().await;
        Ok(self.state.read().await.statuses.get(id).cloned())
    }

    async fn upsert_status(&self, status: Status) -> AppResult<()> {
        self.pause().await;
        self.state
            .write()
            .await
            .statuses
            .insert(status.id.clone(), status);
        Ok(())
    }

    async fn delete_status(&self, id: &str) -> AppResult<()> {
        self.pause().await;
        self.state.write().await.statuses.remove(id);
        Ok(())
    }

    async fn statuses_by_account(&self, account_id: &str) -> AppResult<Vec<Status>> {
        self.pause().await;
        Ok(self
            .state
            .read()
            .await
            .statuses
            .values()
            .filter(|s| s.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn follow_between(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<Follow>> {
        self.pause().await;
        Ok(self
            .state
            .read()
            .await
            .follows
            .values()
            .find(|f| f.account_id == account_id && f.target_account_id == target_account_id)
            .cloned())
    }

    async fn upsert_follow(&self, follow: Follow) -> AppResult<()> {
        self.pause().await;
        let mut state = self.state.write().await;
        // Re-applying the same relationship must not create a second row.
        let duplicate = state
            .follows
            .values()
            .any(|f| f.account_id == follow.account_id && f.target_account_id == follow.target_account_id);
        if !duplicate {
            state.follows.insert(follow.id.clone(), follow);
        }
        Ok(())
    }

    async fn delete_follow(&self, id: &str) -> AppResult<()> {
        self.pause().await;
        self.state.write().await.follows.remove(id);
        Ok(())
    }

    async fn followers_of(&self, account_id: &str) -> AppResult<Vec<Account>> {
        self.pause().await;
        let state = self.state.read().await;
        Ok(state
            .follows
            .values()
            .filter(|f| f.target_account_id == account_id)
            .filter_map(|f| state.accounts.get(&f.account_id).cloned())
            .collect())
    }

    async fn follow_request_between(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> AppResult<Option<FollowRequest>> {
        self.pause().await;
        Ok(self
            .state
            .read()
            .await
            .follow_requests
            .values()
            .find(|r| r.account_id == account_id && r.target_account_id == target_account_id)
            .cloned())
    }

    async fn upsert_follow_request(&self, request: FollowRequest) -> AppResult<()> {
        self.pause().await;
        let mut state = self.state.write().await;
        let duplicate = state.follow_requests.values().any(|r| {
            r.account_id == request.account_id && r.target_account_id == request.target_account_id
        });
        if !duplicate {
            state.follow_requests.insert(request.id.clone(), request);
        }
        Ok(())
    }

    async fn delete_follow_request(&self, id: &str) -> AppResult<()> {
        self.pause().await;
        self.state.write().await.follow_requests.remove(id);
        Ok(())
    }

    async fn fave(&self, id: &str) -> AppResult<Option<Fave>> {
        self.pause().await;
        Ok(self.state.read().await.faves.get(id).cloned())
    }

    async fn upsert_fave(&self, fave: Fave) -> AppResult<()> {
        self.pause().await;
        self.state.write().await.faves.insert(fave.id.clone(), fave);
        Ok(())
    }

    async fn delete_fave(&self, id: &str) -> AppResult<()> {
        self.pause().await;
        self.state.write().await.faves.remove(id);
        Ok(())
    }

    async fn upsert_block(&self, block: Block) -> AppResult<()> {
        self.pause().await;
        self.state
            .write()
            .await
            .blocks
            .insert(block.id.clone(), block);
        Ok(())
    }

    async fn delete_block(&self, id: &str) -> AppResult<()> {
        self.pause().await;
        self.state.write().await.blocks.remove(id);
        Ok(())
    }

    async fn purge_relationships(&self, account_id: &str) -> AppResult<()> {
        self.pause().await;
        let mut state = self.state.write().await;
        state
            .follows
            .retain(|_, f| f.account_id != account_id && f.target_account_id != account_id);
        state
            .follow_requests
            .retain(|_, r| r.account_id != account_id && r.target_account_id != account_id);
        state.faves.retain(|_, f| f.account_id != account_id);
        state
            .blocks
            .retain(|_, b| b.account_id != account_id && b.target_account_id != account_id);
        Ok(())
    }

    async fn timeline_insert(&self, owner_id: &str, status_id: &str) -> AppResult<()> {
        self.pause().await;
        let mut state = self.state.write().await;
        let timeline = state.timelines.entry(owner_id.to_string()).or_default();
        if !timeline.iter().any(|id| id == status_id) {
            timeline.push(status_id.to_string());
        }
        Ok(())
    }

    async fn timeline_remove_status(&self, status_id: &str) -> AppResult<()> {
        self.pause().await;
        let mut state = self.state.write().await;
        for timeline in state.timelines.values_mut() {
            timeline.retain(|id| id != status_id);
        }
        Ok(())
    }

    async fn timeline_remove_author(&self, owner_id: &str, author_id: &str) -> AppResult<()> {
        self.pause().await;
        let mut state = self.state.write().await;
        let authored: Vec<String> = state
            .statuses
            .values()
            .filter(|s| s.account_id == author_id)
            .map(|s| s.id.clone())
            .collect();
        if let Some(timeline) = state.timelines.get_mut(owner_id) {
            timeline.retain(|id| !authored.contains(id));
        }
        Ok(())
    }

    async fn home_timeline(&self, owner_id: &str) -> AppResult<Vec<String>> {
        self.pause().await;
        Ok(self
            .state
            .read()
            .await
            .timelines
            .get(owner_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeline_insert_is_idempotent() {
        let storage = MemoryStorage::new();

        storage.timeline_insert("owner", "status-1").await.ok();
        storage.timeline_insert("owner", "status-1").await.ok();
        storage.timeline_insert("owner", "status-2").await.ok();

        let timeline = storage.home_timeline("owner").await.unwrap_or_default();
        assert_eq!(timeline, vec!["status-1", "status-2"]);
    }

    #[tokio::test]
    async fn test_upsert_follow_deduplicates_relationship() {
        let storage = MemoryStorage::new();

        let follow = Follow {
            id: "follow-1".to_string(),
            account_id: "a".to_string(),
            target_account_id: "b".to_string(),
        };
        storage.upsert_follow(follow.clone()).await.ok();
        storage
            .upsert_follow(Follow {
                id: "follow-2".to_string(),
                ..follow
            })
            .await
            .ok();

        let found = storage
            .follow_between("a", "b")
            .await
            .unwrap_or_default()
            .map(|f| f.id);
        assert_eq!(found.as_deref(), Some("follow-1"));
    }

    #[tokio::test]
    async fn test_purge_relationships_covers_both_directions() {
        let storage = MemoryStorage::new();

        storage
            .upsert_follow(Follow {
                id: "f1".to_string(),
                account_id: "a".to_string(),
                target_account_id: "b".to_string(),
            })
            .await
            .ok();
        storage
            .upsert_follow(Follow {
                id: "f2".to_string(),
                account_id: "b".to_string(),
                target_account_id: "a".to_string(),
            })
            .await
            .ok();

        storage.purge_relationships("a").await.ok();

        assert!(storage.follow_between("a", "b").await.unwrap_or_default().is_none());
        assert!(storage.follow_between("b", "a").await.unwrap_or_default().is_none());
    }
}
