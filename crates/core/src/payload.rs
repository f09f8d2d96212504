//! Activity payload construction for remote delivery.
//!
//! Builds the serialized activity documents handed to the delivery
//! scheduler. The documents stay opaque downstream of the handlers; signing
//! them is the federation transport's concern.

use corvid_common::IdGenerator;
use serde_json::{Value, json};
use url::Url;

use crate::model::{Account, Block, Fave, Follow, Status};

const PUBLIC: &str = "https://www.w3.org/ns/activitystreams#Public";

/// Payload builder bound to this instance's base URL.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    base_url: Url,
    id_gen: IdGenerator,
}

impl PayloadBuilder {
    /// Create a builder for the given instance base URL.
    #[must_use]
    pub const fn new(base_url: Url) -> Self {
        Self {
            base_url,
            id_gen: IdGenerator::new(),
        }
    }

    fn actor_url(&self, account_id: &str) -> String {
        format!("{}users/{account_id}", self.base_url)
    }

    /// Canonical URL of a local status.
    #[must_use]
    pub fn status_url(&self, status_id: &str) -> String {
        format!("{}statuses/{status_id}", self.base_url)
    }

    /// Build a Create activity for a status.
    #[must_use]
    pub fn create_status(&self, status: &Status) -> Value {
        let actor_url = self.actor_url(&status.account_id);
        let status_url = self.status_url(&status.id);
        let followers = format!("{actor_url}/followers");

        json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "id": format!("{status_url}/activity"),
            "type": "Create",
            "actor": actor_url,
            "object": {
                "id": status_url,
                "type": "Note",
                "attributedTo": actor_url,
            },
            "to": [PUBLIC],
            "cc": [followers],
        })
    }

    /// Build a Delete activity carrying a Tombstone for an entity.
    #[must_use]
    pub fn delete(&self, actor_id: &str, object_url: &str) -> Value {
        let actor_url = self.actor_url(actor_id);

        json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "id": format!("{}/delete/{}", actor_url, self.id_gen.generate()),
            "type": "Delete",
            "actor": actor_url,
            "object": {
                "id": object_url,
                "type": "Tombstone"
            }
        })
    }

    /// Build a Delete activity for a status.
    #[must_use]
    pub fn delete_status(&self, actor_id: &str, status_id: &str) -> Value {
        self.delete(actor_id, &self.status_url(status_id))
    }

    /// Build a Delete activity for an account (self-delete).
    #[must_use]
    pub fn delete_account(&self, account_id: &str) -> Value {
        self.delete(account_id, &self.actor_url(account_id))
    }

    /// Build an Update activity for an account.
    #[must_use]
    pub fn update_account(&self, account: &Account) -> Value {
        let actor_url = self.actor_url(&account.id);

        json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "id": format!("{}/update/{}", actor_url, self.id_gen.generate()),
            "type": "Update",
            "actor": actor_url,
            "object": {
                "id": actor_url,
                "type": "Person",
                "preferredUsername": account.username,
            },
            "to": [PUBLIC],
        })
    }

    /// Build a Follow activity.
    #[must_use]
    pub fn follow(&self, follow: &Follow, target: &Account) -> Value {
        let actor_url = self.actor_url(&follow.account_id);
        let target_url = self.remote_actor_url(target);

        json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "id": format!("{}/follow/{}", actor_url, follow.id),
            "type": "Follow",
            "actor": actor_url,
            "object": target_url
        })
    }

    /// Build an Accept activity for an incoming follow.
    #[must_use]
    pub fn accept_follow(&self, local_account_id: &str, remote_follower: &Account, follow_id: &str) -> Value {
        let actor_url = self.actor_url(local_account_id);
        let follower_url = self.remote_actor_url(remote_follower);

        json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "id": format!("{}/accept/{}", actor_url, self.id_gen.generate()),
            "type": "Accept",
            "actor": actor_url,
            "object": {
                "id": format!("{follower_url}/follow/{follow_id}"),
                "type": "Follow",
                "actor": follower_url,
                "object": actor_url,
            }
        })
    }

    /// Build an Undo activity wrapping a previously delivered activity.
    #[must_use]
    pub fn undo(&self, actor_id: &str, object: Value) -> Value {
        let actor_url = self.actor_url(actor_id);

        json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "id": format!("{}/undo/{}", actor_url, self.id_gen.generate()),
            "type": "Undo",
            "actor": actor_url,
            "object": object
        })
    }

    /// Build a Like activity for a fave.
    #[must_use]
    pub fn like(&self, fave: &Fave) -> Value {
        let actor_url = self.actor_url(&fave.account_id);

        json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "id": format!("{}/like/{}", actor_url, fave.id),
            "type": "Like",
            "actor": actor_url,
            "object": self.status_url(&fave.status_id)
        })
    }

    /// Build an Announce activity for a boost.
    #[must_use]
    pub fn announce(&self, boost: &Status, boosted_status_url: &str) -> Value {
        let actor_url = self.actor_url(&boost.account_id);

        json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "id": format!("{}/announce/{}", actor_url, boost.id),
            "type": "Announce",
            "actor": actor_url,
            "object": boosted_status_url,
            "to": [PUBLIC],
            "cc": [format!("{actor_url}/followers")]
        })
    }

    /// Build a Block activity.
    #[must_use]
    pub fn block(&self, block: &Block, target: &Account) -> Value {
        let actor_url = self.actor_url(&block.account_id);

        json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "id": format!("{}/block/{}", actor_url, block.id),
            "type": "Block",
            "actor": actor_url,
            "object": self.remote_actor_url(target)
        })
    }

    /// Canonical URL of an account, remote accounts keep their own identity.
    fn remote_actor_url(&self, account: &Account) -> String {
        match (&account.domain, &account.inbox) {
            (Some(domain), _) => format!("https://{domain}/users/{}", account.username),
            _ => self.actor_url(&account.id),
        }
    }
}

/// Collapse a recipient set into a deduplicated list of inbox URLs.
///
/// Local accounts are skipped; remote accounts contribute their shared inbox
/// when one is known, their own inbox otherwise.
#[must_use]
pub fn collect_inboxes(accounts: &[Account]) -> Vec<Url> {
    let mut inboxes: Vec<Url> = Vec::new();
    for account in accounts {
        if !account.is_remote() {
            continue;
        }
        let inbox = account.shared_inbox.as_ref().or(account.inbox.as_ref());
        if let Some(inbox) = inbox {
            if !inboxes.contains(inbox) {
                inboxes.push(inbox.clone());
            }
        }
    }
    inboxes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://corvid.example/").unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn test_create_status_payload() {
        let builder = PayloadBuilder::new(base_url());
        let status = Status::new("s1", "a1");

        let payload = builder.create_status(&status);

        assert_eq!(payload["type"], "Create");
        assert_eq!(payload["actor"], "https://corvid.example/users/a1");
        assert_eq!(payload["object"]["id"], "https://corvid.example/statuses/s1");
    }

    #[test]
    fn test_delete_payload_carries_tombstone() {
        let builder = PayloadBuilder::new(base_url());

        let payload = builder.delete_status("a1", "s1");

        assert_eq!(payload["type"], "Delete");
        assert_eq!(payload["object"]["type"], "Tombstone");
    }

    #[test]
    fn test_collect_inboxes_prefers_shared_and_deduplicates() {
        let shared: Url = "https://remote.example/inbox".parse().unwrap_or_else(|_| unreachable!());
        let personal: Url = "https://remote.example/users/bob/inbox"
            .parse()
            .unwrap_or_else(|_| unreachable!());

        let mut alice = Account::remote("r1", "alice", "remote.example", personal.clone());
        alice.shared_inbox = Some(shared.clone());
        let mut bob = Account::remote("r2", "bob", "remote.example", personal);
        bob.shared_inbox = Some(shared.clone());
        let local = Account::local("l1", "carol");

        let inboxes = collect_inboxes(&[alice, bob, local]);

        assert_eq!(inboxes, vec![shared]);
    }
}
