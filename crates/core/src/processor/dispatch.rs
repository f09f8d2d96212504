//! The dispatch loop: fair two-queue selection, bounded workers, and
//! per-actor serialization.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use corvid_common::AppError;
use tokio::sync::{Mutex, Semaphore, mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::activity::Activity;
use crate::handlers::HandlerRegistry;

/// Which inbound queue an activity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueSource {
    Client,
    Federator,
}

/// Tail of one actor's completion chain.
///
/// Each dispatched task waits on the previous same-actor task's completion
/// before it may run, which yields enqueue-order execution and mutual
/// exclusion per actor without ever blocking the dispatch loop itself.
struct ChainSlot {
    seq: u64,
    tail: Option<oneshot::Receiver<()>>,
}

pub(super) struct DispatchLoop {
    pub client_rx: mpsc::Receiver<Activity>,
    pub federator_rx: mpsc::Receiver<Activity>,
    pub registry: Arc<HandlerRegistry>,
    pub pool: Arc<Semaphore>,
    pub fairness_bound: u32,
    pub handler_timeout: Duration,
    pub drain_deadline: Duration,
    pub stop_rx: watch::Receiver<bool>,
}

impl DispatchLoop {
    /// Run until stopped, then drain both queues and return the receivers
    /// for a later restart.
    pub async fn run(mut self) -> (mpsc::Receiver<Activity>, mpsc::Receiver<Activity>) {
        let chains: Arc<Mutex<HashMap<String, ChainSlot>>> = Arc::new(Mutex::new(HashMap::new()));
        let mut tasks = JoinSet::new();
        let mut streak: Option<(QueueSource, u32)> = None;

        loop {
            if *self.stop_rx.borrow() {
                break;
            }

            // Fairness bound: after too many consecutive activities from one
            // queue, service the other queue first if it has anything ready.
            if let Some((source, count)) = streak {
                if count >= self.fairness_bound {
                    let preempted = match source {
                        QueueSource::Client => self.federator_rx.try_recv(),
                        QueueSource::Federator => self.client_rx.try_recv(),
                    };
                    if let Ok(activity) = preempted {
                        let other = match source {
                            QueueSource::Client => QueueSource::Federator,
                            QueueSource::Federator => QueueSource::Client,
                        };
                        streak = Some((other, 1));
                        Self::dispatch(
                            &mut tasks,
                            &chains,
                            &self.registry,
                            &self.pool,
                            self.handler_timeout,
                            activity,
                        )
                        .await;
                        continue;
                    }
                }
            }

            tokio::select! {
                changed = self.stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                maybe = self.client_rx.recv() => match maybe {
                    Some(activity) => {
                        streak = Some(bump(streak, QueueSource::Client));
                        Self::dispatch(
                            &mut tasks,
                            &chains,
                            &self.registry,
                            &self.pool,
                            self.handler_timeout,
                            activity,
                        )
                        .await;
                    }
                    None => break,
                },
                maybe = self.federator_rx.recv() => match maybe {
                    Some(activity) => {
                        streak = Some(bump(streak, QueueSource::Federator));
                        Self::dispatch(
                            &mut tasks,
                            &chains,
                            &self.registry,
                            &self.pool,
                            self.handler_timeout,
                            activity,
                        )
                        .await;
                    }
                    None => break,
                },
            }
        }

        // Stop accepting new iterations only once both queues are empty.
        while let Ok(activity) = self.client_rx.try_recv() {
            Self::dispatch(
                &mut tasks,
                &chains,
                &self.registry,
                &self.pool,
                self.handler_timeout,
                activity,
            )
            .await;
        }
        while let Ok(activity) = self.federator_rx.try_recv() {
            Self::dispatch(
                &mut tasks,
                &chains,
                &self.registry,
                &self.pool,
                self.handler_timeout,
                activity,
            )
            .await;
        }

        // Let in-flight handler invocations finish, bounded by the drain
        // deadline; stragglers are detached, never aborted.
        let deadline = tokio::time::Instant::now() + self.drain_deadline;
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(_) => {
                    let err = AppError::ShutdownTimeout(format!(
                        "{} handler invocations still in flight",
                        tasks.len()
                    ));
                    warn!(error = %err, "detaching in-flight handlers");
                    tasks.detach_all();
                    break;
                }
            }
        }

        (self.client_rx, self.federator_rx)
    }

    async fn dispatch(
        tasks: &mut JoinSet<()>,
        chains: &Arc<Mutex<HashMap<String, ChainSlot>>>,
        registry: &Arc<HandlerRegistry>,
        pool: &Arc<Semaphore>,
        handler_timeout: Duration,
        activity: Activity,
    ) {
        let Some(handler) = registry.get(&activity) else {
            let err = AppError::UnknownActivity(format!(
                "{}/{}/{}",
                activity.origin.as_str(),
                activity.entity_kind.as_str(),
                activity.verb.as_str()
            ));
            debug!(entity_id = %activity.entity_id, error = %err, "dropping activity");
            return;
        };

        let actor_id = activity.actor_id.clone();
        let (done_tx, done_rx) = oneshot::channel();
        let (prev, seq) = {
            let mut chains = chains.lock().await;
            let slot = chains
                .entry(actor_id.clone())
                .or_insert_with(|| ChainSlot { seq: 0, tail: None });
            slot.seq += 1;
            (slot.tail.replace(done_rx), slot.seq)
        };

        let chains = chains.clone();
        let pool = pool.clone();
        tasks.spawn(async move {
            // Serialize on the actor: wait for the previous same-actor
            // invocation before taking a worker permit.
            if let Some(prev) = prev {
                let _ = prev.await;
            }
            let _permit = pool.acquire_owned().await.ok();

            match tokio::time::timeout(handler_timeout, handler.handle(&activity)).await {
                Ok(Ok(())) => {
                    debug!(
                        origin = activity.origin.as_str(),
                        entity_kind = activity.entity_kind.as_str(),
                        verb = activity.verb.as_str(),
                        entity_id = %activity.entity_id,
                        actor_id = %activity.actor_id,
                        "activity processed"
                    );
                }
                Ok(Err(err)) => {
                    // Failures are final here: the root write committed
                    // before enqueue, only this fan-out is lost.
                    error!(
                        origin = activity.origin.as_str(),
                        entity_kind = activity.entity_kind.as_str(),
                        verb = activity.verb.as_str(),
                        entity_id = %activity.entity_id,
                        actor_id = %activity.actor_id,
                        target_account_id = activity.target_account_id.as_deref().unwrap_or(""),
                        error = %err,
                        "side-effect handler failed"
                    );
                }
                Err(_) => {
                    let err = AppError::Handler(format!(
                        "exceeded the {handler_timeout:?} deadline"
                    ));
                    error!(
                        origin = activity.origin.as_str(),
                        entity_kind = activity.entity_kind.as_str(),
                        verb = activity.verb.as_str(),
                        entity_id = %activity.entity_id,
                        actor_id = %activity.actor_id,
                        error = %err,
                        "side-effect handler failed"
                    );
                }
            }

            let _ = done_tx.send(());

            // Drop the chain entry unless a newer task already extended it.
            let mut chains = chains.lock().await;
            if chains.get(&actor_id).is_some_and(|slot| slot.seq == seq) {
                chains.remove(&actor_id);
            }
        });
    }
}

fn bump(streak: Option<(QueueSource, u32)>, source: QueueSource) -> (QueueSource, u32) {
    match streak {
        Some((prev, count)) if prev == source => (source, count.saturating_add(1)),
        _ => (source, 1),
    }
}
