//! Lightweight typed records the handlers read and write through the
//! storage capability.
//!
//! These are projections of whatever schema the persistence collaborator
//! owns; the engine only needs the fields that drive fan-out decisions.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};
use url::Url;

/// An account, local or remote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    /// Host of the account's home instance; `None` for local accounts.
    pub domain: Option<String>,
    /// Inbox URL for remote accounts.
    pub inbox: Option<Url>,
    /// Shared (instance-level) inbox URL, preferred for fan-out when present.
    pub shared_inbox: Option<Url>,
    /// Whether follows of this account require manual approval.
    pub locked: bool,
}

impl Account {
    /// Create a local account record.
    #[must_use]
    pub fn local(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            domain: None,
            inbox: None,
            shared_inbox: None,
            locked: false,
        }
    }

    /// Create a remote account record.
    #[must_use]
    pub fn remote(
        id: impl Into<String>,
        username: impl Into<String>,
        domain: impl Into<String>,
        inbox: Url,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            domain: Some(domain.into()),
            inbox: Some(inbox),
            shared_inbox: None,
            locked: false,
        }
    }

    /// Whether the account lives on a remote instance.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        self.domain.is_some()
    }
}

/// Visibility of a status, as far as fan-out is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    /// Addressed to the world; fans out to all followers.
    Public,
    /// Addressed to followers only.
    Followers,
    /// Addressed only to mentioned accounts.
    Direct,
}

/// A status (post), possibly a boost of another status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    /// The authoring account.
    pub account_id: String,
    /// Account being replied to, if this is a reply.
    pub in_reply_to_account_id: Option<String>,
    /// The boosted status, if this is a boost.
    pub boost_of_id: Option<String>,
    /// Accounts mentioned in the status body.
    pub mention_ids: Vec<String>,
    pub visibility: Visibility,
}

impl Status {
    /// Create a plain public status.
    #[must_use]
    pub fn new(id: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            account_id: account_id.into(),
            in_reply_to_account_id: None,
            boost_of_id: None,
            mention_ids: Vec::new(),
            visibility: Visibility::Public,
        }
    }
}

/// An accepted follow relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    pub id: String,
    /// The follower.
    pub account_id: String,
    /// The followed account.
    pub target_account_id: String,
}

/// A pending follow request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowRequest {
    pub id: String,
    /// The requester.
    pub account_id: String,
    /// The account being asked.
    pub target_account_id: String,
}

/// A fave (like) of a status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fave {
    pub id: String,
    /// The faving account.
    pub account_id: String,
    /// The faved status.
    pub status_id: String,
}

/// A block of one account by another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    /// The blocking account.
    pub account_id: String,
    /// The blocked account.
    pub target_account_id: String,
}
