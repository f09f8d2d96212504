//! Processor integration tests.
//!
//! These drive the full engine (queues, dispatch loop, handler registry)
//! against the in-memory capabilities.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use corvid_common::{AppError, AppResult, ProcessorConfig};
use corvid_core::handlers::{HandlerContext, HandlerRegistry};
use corvid_core::model::{Account, Follow, Status};
use corvid_core::payload::PayloadBuilder;
use corvid_core::services::{
    ActivityDelivery, MemoryNotifications, MemoryStorage, NoOpDelivery, NotificationKind, Storage,
};
use corvid_core::{Activity, ActivityOrigin, ActivityVerb, EntityKind, Processor, ProcessorState};
use serde_json::Value;
use url::Url;

fn base_url() -> Url {
    "https://corvid.example/".parse().unwrap()
}

fn quick_config() -> ProcessorConfig {
    ProcessorConfig {
        queue_capacity: 100,
        workers: 4,
        fairness_bound: 8,
        handler_timeout_secs: 5,
        drain_deadline_secs: 5,
    }
}

fn build_processor(
    config: ProcessorConfig,
    storage: &Arc<MemoryStorage>,
    notifier: &Arc<MemoryNotifications>,
    delivery: Arc<dyn ActivityDelivery>,
) -> Processor {
    let ctx = Arc::new(HandlerContext::new(
        storage.clone(),
        notifier.clone(),
        delivery,
        PayloadBuilder::new(base_url()),
    ));
    Processor::new(config, HandlerRegistry::with_defaults(ctx)).unwrap()
}

/// Delivery capability that always fails, for isolating local side effects.
struct FailingDelivery;

#[async_trait]
impl ActivityDelivery for FailingDelivery {
    async fn queue_activity(
        &self,
        _actor_id: &str,
        _activity: Value,
        _inboxes: Vec<Url>,
    ) -> AppResult<()> {
        Err(AppError::Delivery("remote unavailable".to_string()))
    }
}

async fn seed_local_pair(storage: &MemoryStorage) {
    // alice with local follower bob
    storage.upsert_account(Account::local("alice", "alice")).await.unwrap();
    storage.upsert_account(Account::local("bob", "bob")).await.unwrap();
    storage
        .upsert_follow(Follow {
            id: "follow_bob_alice".to_string(),
            account_id: "bob".to_string(),
            target_account_id: "alice".to_string(),
        })
        .await
        .unwrap();
}

fn create_status_activity(status_id: &str, author: &str) -> Activity {
    Activity::new(
        ActivityOrigin::ClientApi,
        ActivityVerb::Create,
        EntityKind::Status,
        status_id,
        author,
    )
}

#[tokio::test]
async fn status_create_fans_out_to_author_and_follower_timelines() {
    let storage = Arc::new(MemoryStorage::new());
    let notifier = Arc::new(MemoryNotifications::new());
    seed_local_pair(&storage).await;
    storage.upsert_status(Status::new("st_1", "alice")).await.unwrap();

    let processor = build_processor(quick_config(), &storage, &notifier, Arc::new(NoOpDelivery));
    processor.start().await.unwrap();

    processor
        .submit_from_client_api(create_status_activity("st_1", "alice"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(storage.home_timeline("alice").await.unwrap(), vec!["st_1"]);
    assert_eq!(storage.home_timeline("bob").await.unwrap(), vec!["st_1"]);

    processor.stop().await.unwrap();
}

#[tokio::test]
async fn reprocessing_the_same_activity_changes_nothing() {
    let storage = Arc::new(MemoryStorage::new());
    let notifier = Arc::new(MemoryNotifications::new());
    seed_local_pair(&storage).await;

    let mut status = Status::new("st_1", "alice");
    status.mention_ids = vec!["bob".to_string()];
    storage.upsert_status(status).await.unwrap();

    let processor = build_processor(quick_config(), &storage, &notifier, Arc::new(NoOpDelivery));
    processor.start().await.unwrap();

    for _ in 0..2 {
        processor
            .submit_from_client_api(create_status_activity("st_1", "alice"))
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(storage.home_timeline("bob").await.unwrap(), vec!["st_1"]);
    let mentions = notifier.for_account("bob").await;
    assert_eq!(mentions.len(), 1);
    assert_eq!(mentions[0].kind, NotificationKind::Mention);

    processor.stop().await.unwrap();
}

#[tokio::test]
async fn activities_from_one_actor_apply_in_submission_order() {
    // Slow storage widens the race window if serialization is broken.
    let storage = Arc::new(MemoryStorage::with_latency(Duration::from_millis(5)));
    let notifier = Arc::new(MemoryNotifications::new());
    seed_local_pair(&storage).await;

    let mut expected = Vec::new();
    for n in 0..10 {
        let id = format!("st_{n}");
        storage.upsert_status(Status::new(&id, "alice")).await.unwrap();
        expected.push(id);
    }

    let processor = build_processor(quick_config(), &storage, &notifier, Arc::new(NoOpDelivery));
    processor.start().await.unwrap();

    for id in &expected {
        processor
            .submit_from_client_api(create_status_activity(id, "alice"))
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(storage.home_timeline("alice").await.unwrap(), expected);
    assert_eq!(storage.home_timeline("bob").await.unwrap(), expected);

    processor.stop().await.unwrap();
}

#[tokio::test]
async fn submitted_follow_records_the_relationship() {
    let storage = Arc::new(MemoryStorage::new());
    let notifier = Arc::new(MemoryNotifications::new());
    storage.upsert_account(Account::local("alice", "alice")).await.unwrap();
    storage.upsert_account(Account::local("bob", "bob")).await.unwrap();

    let processor = build_processor(quick_config(), &storage, &notifier, Arc::new(NoOpDelivery));
    processor.start().await.unwrap();

    // The bare Follow verb routes the same as Follow/Create.
    let follow = Activity::new(
        ActivityOrigin::ClientApi,
        ActivityVerb::Follow,
        EntityKind::Follow,
        "follow_1",
        "alice",
    )
    .with_target("bob");
    processor.submit_from_client_api(follow).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let follow = storage.follow_between("alice", "bob").await.unwrap();
    assert!(follow.is_some(), "follow row must exist after processing");
    let notified = notifier.for_account("bob").await;
    assert_eq!(notified.len(), 1);
    assert_eq!(notified[0].kind, NotificationKind::Follow);

    processor.stop().await.unwrap();
}

#[tokio::test]
async fn follow_then_unfollow_back_to_back_leaves_no_relationship() {
    let storage = Arc::new(MemoryStorage::with_latency(Duration::from_millis(5)));
    let notifier = Arc::new(MemoryNotifications::new());
    storage.upsert_account(Account::local("alice", "alice")).await.unwrap();
    storage.upsert_account(Account::local("bob", "bob")).await.unwrap();

    let processor = build_processor(quick_config(), &storage, &notifier, Arc::new(NoOpDelivery));
    processor.start().await.unwrap();

    let follow = Activity::new(
        ActivityOrigin::ClientApi,
        ActivityVerb::Create,
        EntityKind::Follow,
        "follow_1",
        "alice",
    )
    .with_target("bob");
    let undo = Activity::new(
        ActivityOrigin::ClientApi,
        ActivityVerb::Undo,
        EntityKind::Follow,
        "follow_1",
        "alice",
    )
    .with_target("bob");

    processor.submit_from_client_api(follow).await.unwrap();
    processor.submit_from_client_api(undo).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(storage.follow_between("alice", "bob").await.unwrap().is_none());
    assert!(notifier.for_account("bob").await.is_empty(), "undo invalidates the notification");

    processor.stop().await.unwrap();
}

#[tokio::test]
async fn full_queue_rejects_try_submit_and_stalls_submit() {
    let storage = Arc::new(MemoryStorage::new());
    let notifier = Arc::new(MemoryNotifications::new());
    let config = ProcessorConfig {
        queue_capacity: 2,
        ..quick_config()
    };

    // Never started: nothing drains the queues.
    let processor = build_processor(config, &storage, &notifier, Arc::new(NoOpDelivery));

    processor
        .try_submit_from_client_api(create_status_activity("st_1", "alice"))
        .unwrap();
    processor
        .try_submit_from_client_api(create_status_activity("st_2", "alice"))
        .unwrap();

    match processor.try_submit_from_client_api(create_status_activity("st_3", "alice")) {
        Err(AppError::QueueFull(queue)) => assert_eq!(queue, "client"),
        other => panic!("expected QueueFull, got {other:?}"),
    }

    // The blocking variant applies backpressure instead of erroring.
    let stalled = tokio::time::timeout(
        Duration::from_millis(50),
        processor.submit_from_client_api(create_status_activity("st_4", "alice")),
    )
    .await;
    assert!(stalled.is_err(), "submit must wait while the queue is full");
}

#[tokio::test]
async fn unroutable_activities_are_dropped_without_stalling_the_engine() {
    let storage = Arc::new(MemoryStorage::new());
    let notifier = Arc::new(MemoryNotifications::new());
    seed_local_pair(&storage).await;
    storage.upsert_status(Status::new("st_1", "alice")).await.unwrap();

    let processor = build_processor(quick_config(), &storage, &notifier, Arc::new(NoOpDelivery));
    processor.start().await.unwrap();

    // No handler is registered for reports.
    let report = Activity::new(
        ActivityOrigin::ClientApi,
        ActivityVerb::Flag,
        EntityKind::Report,
        "report_1",
        "bob",
    )
    .with_target("alice");
    processor.submit_from_client_api(report).await.unwrap();
    processor
        .submit_from_client_api(create_status_activity("st_1", "alice"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(storage.home_timeline("bob").await.unwrap(), vec!["st_1"]);
    assert!(notifier.for_account("alice").await.is_empty());

    processor.stop().await.unwrap();
}

#[tokio::test]
async fn stop_drains_everything_already_queued() {
    let storage = Arc::new(MemoryStorage::new());
    let notifier = Arc::new(MemoryNotifications::new());
    seed_local_pair(&storage).await;

    let mut ids = Vec::new();
    for n in 0..20 {
        let id = format!("st_{n}");
        storage.upsert_status(Status::new(&id, "alice")).await.unwrap();
        ids.push(id);
    }

    let processor = build_processor(quick_config(), &storage, &notifier, Arc::new(NoOpDelivery));
    for id in &ids {
        processor
            .try_submit_from_client_api(create_status_activity(id, "alice"))
            .unwrap();
    }

    processor.start().await.unwrap();
    processor.stop().await.unwrap();

    assert_eq!(processor.state().await, ProcessorState::Stopped);
    assert_eq!(storage.home_timeline("alice").await.unwrap(), ids);
}

#[tokio::test]
async fn local_side_effects_survive_a_failing_delivery_capability() {
    let storage = Arc::new(MemoryStorage::new());
    let notifier = Arc::new(MemoryNotifications::new());
    seed_local_pair(&storage).await;
    // carol is remote, so delivery is actually attempted
    storage
        .upsert_account(Account::remote(
            "carol",
            "carol",
            "remote.example",
            "https://remote.example/users/carol/inbox".parse().unwrap(),
        ))
        .await
        .unwrap();
    storage
        .upsert_follow(Follow {
            id: "follow_carol_alice".to_string(),
            account_id: "carol".to_string(),
            target_account_id: "alice".to_string(),
        })
        .await
        .unwrap();
    storage.upsert_status(Status::new("st_1", "alice")).await.unwrap();

    let processor = build_processor(quick_config(), &storage, &notifier, Arc::new(FailingDelivery));
    processor.start().await.unwrap();

    processor
        .submit_from_client_api(create_status_activity("st_1", "alice"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Local fan-out completed before the delivery error surfaced.
    assert_eq!(storage.home_timeline("alice").await.unwrap(), vec!["st_1"]);
    assert_eq!(storage.home_timeline("bob").await.unwrap(), vec!["st_1"]);

    processor.stop().await.unwrap();
}

#[tokio::test]
async fn both_queues_feed_the_same_handler_set() {
    let storage = Arc::new(MemoryStorage::new());
    let notifier = Arc::new(MemoryNotifications::new());
    seed_local_pair(&storage).await;
    // dave is remote with local follower alice
    storage
        .upsert_account(Account::remote(
            "dave",
            "dave",
            "remote.example",
            "https://remote.example/users/dave/inbox".parse().unwrap(),
        ))
        .await
        .unwrap();
    storage
        .upsert_follow(Follow {
            id: "follow_alice_dave".to_string(),
            account_id: "alice".to_string(),
            target_account_id: "dave".to_string(),
        })
        .await
        .unwrap();
    storage.upsert_status(Status::new("st_local", "alice")).await.unwrap();
    storage.upsert_status(Status::new("st_remote", "dave")).await.unwrap();

    let processor = build_processor(quick_config(), &storage, &notifier, Arc::new(NoOpDelivery));
    processor.start().await.unwrap();

    processor
        .submit_from_client_api(create_status_activity("st_local", "alice"))
        .await
        .unwrap();
    processor
        .submit_from_federator(Activity::new(
            ActivityOrigin::Federator,
            ActivityVerb::Create,
            EntityKind::Status,
            "st_remote",
            "dave",
        ))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let alice_timeline = storage.home_timeline("alice").await.unwrap();
    assert!(alice_timeline.contains(&"st_local".to_string()));
    assert!(alice_timeline.contains(&"st_remote".to_string()));

    processor.stop().await.unwrap();
}

#[tokio::test]
async fn lifecycle_transitions_and_restart() {
    let storage = Arc::new(MemoryStorage::new());
    let notifier = Arc::new(MemoryNotifications::new());
    seed_local_pair(&storage).await;
    storage.upsert_status(Status::new("st_1", "alice")).await.unwrap();
    storage.upsert_status(Status::new("st_2", "alice")).await.unwrap();

    let processor = build_processor(quick_config(), &storage, &notifier, Arc::new(NoOpDelivery));
    assert_eq!(processor.state().await, ProcessorState::Created);

    assert_eq!(processor.start().await.unwrap(), ProcessorState::Running);
    // Starting again is a no-op.
    assert_eq!(processor.start().await.unwrap(), ProcessorState::Running);

    processor
        .submit_from_client_api(create_status_activity("st_1", "alice"))
        .await
        .unwrap();
    processor.stop().await.unwrap();
    assert_eq!(processor.state().await, ProcessorState::Stopped);
    // Stopping again is a no-op.
    assert_eq!(processor.stop().await.unwrap(), ProcessorState::Stopped);

    // A stopped processor can be started again.
    processor.start().await.unwrap();
    processor
        .submit_from_client_api(create_status_activity("st_2", "alice"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    processor.stop().await.unwrap();

    assert_eq!(
        storage.home_timeline("alice").await.unwrap(),
        vec!["st_1", "st_2"]
    );
}
