//! Delivery scheduler: bounded intake, fan-out attempt passes, backoff retries.
//!
//! Jobs arrive on a bounded channel, get one attempt pass across all pending
//! inboxes, and are parked on a sleeping task for the backoff delay when any
//! recipient fails transiently. Delivery is at-most-once per recipient: jobs
//! live only in process memory and do not survive a restart.

use std::sync::Arc;
use std::time::Duration;

use corvid_common::{AppError, AppResult, DeliveryConfig};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, error, info, warn};

use crate::client::{DeliveryOutcome, FederationClient};
use crate::jobs::DeliveryJob;
use crate::retry::{AbandonedDelivery, RetryConfig};

/// Shared sink for recipients the scheduler gave up on.
type AbandonedLog = Arc<Mutex<Vec<AbandonedDelivery>>>;

struct SchedulerInner {
    running: bool,
    job_rx: Option<mpsc::Receiver<DeliveryJob>>,
    stop_tx: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<mpsc::Receiver<DeliveryJob>>>,
}

/// Outbound delivery scheduler.
///
/// Owns the bounded job channel and the run loop that drains it. Like the
/// processor, it is constructed once, injected where needed, and driven by
/// the owning process's startup and shutdown sequence.
pub struct DeliveryScheduler {
    config: DeliveryConfig,
    retry: RetryConfig,
    client: Arc<dyn FederationClient>,
    job_tx: mpsc::Sender<DeliveryJob>,
    abandoned: AbandonedLog,
    inner: Mutex<SchedulerInner>,
}

impl DeliveryScheduler {
    /// Create a scheduler over the given federation transport.
    #[must_use]
    pub fn new(config: DeliveryConfig, client: Arc<dyn FederationClient>) -> Self {
        let retry = RetryConfig::from(&config);
        let (job_tx, job_rx) = mpsc::channel(config.channel_capacity);

        Self {
            config,
            retry,
            client,
            job_tx,
            abandoned: Arc::new(Mutex::new(Vec::new())),
            inner: Mutex::new(SchedulerInner {
                running: false,
                job_rx: Some(job_rx),
                stop_tx: None,
                handle: None,
            }),
        }
    }

    /// Replace the retry policy. Must be called before [`Self::start`].
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sender half of the job channel, for wiring up a delivery capability.
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<DeliveryJob> {
        self.job_tx.clone()
    }

    /// Snapshot of the recipients abandoned so far.
    pub async fn abandoned(&self) -> Vec<AbandonedDelivery> {
        self.abandoned.lock().await.clone()
    }

    /// Start the run loop. A no-op when already running.
    pub async fn start(&self) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.running {
            info!("delivery scheduler already running, start is a no-op");
            return Ok(());
        }

        let job_rx = inner
            .job_rx
            .take()
            .ok_or_else(|| AppError::Internal("delivery job receiver missing".to_string()))?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let run = RunLoop {
            job_rx,
            stop_rx,
            shutdown_grace: self.config.shutdown_grace(),
            ctx: PassContext {
                client: self.client.clone(),
                retry: self.retry.clone(),
                attempt_timeout: self.config.delivery_timeout(),
                abandoned: self.abandoned.clone(),
            },
        };

        inner.handle = Some(tokio::spawn(run.run()));
        inner.stop_tx = Some(stop_tx);
        inner.running = true;

        info!(
            channel_capacity = self.config.channel_capacity,
            max_attempts = self.retry.max_attempts,
            "delivery scheduler started"
        );
        Ok(())
    }

    /// Stop the run loop.
    ///
    /// Jobs already buffered on the channel get one final attempt pass, and
    /// parked retries that come due within the shutdown grace window do too;
    /// anything still parked after the window is abandoned. A no-op when not
    /// running.
    pub async fn stop(&self) -> AppResult<()> {
        let (handle, stop_tx) = {
            let mut inner = self.inner.lock().await;
            if !inner.running {
                info!("delivery scheduler not running, stop is a no-op");
                return Ok(());
            }
            (inner.handle.take(), inner.stop_tx.take())
        };

        if let Some(stop_tx) = stop_tx {
            let _ = stop_tx.send(true);
        }

        if let Some(handle) = handle {
            // The run loop bounds its own shutdown; this await is finite.
            match handle.await {
                Ok(job_rx) => {
                    let mut inner = self.inner.lock().await;
                    inner.job_rx = Some(job_rx);
                }
                Err(err) => {
                    error!(error = %err, "delivery run loop terminated abnormally");
                }
            }
        }

        let mut inner = self.inner.lock().await;
        inner.running = false;
        info!("delivery scheduler stopped");
        Ok(())
    }
}

/// Immutable state shared by every attempt pass.
struct PassContext {
    client: Arc<dyn FederationClient>,
    retry: RetryConfig,
    attempt_timeout: Duration,
    abandoned: AbandonedLog,
}

struct RunLoop {
    job_rx: mpsc::Receiver<DeliveryJob>,
    stop_rx: watch::Receiver<bool>,
    shutdown_grace: Duration,
    ctx: PassContext,
}

impl RunLoop {
    /// Drive intake and retries until stopped; returns the intake receiver
    /// so the scheduler can be restarted.
    async fn run(mut self) -> mpsc::Receiver<DeliveryJob> {
        // Parked retries: each sleeper yields its job back when due.
        let mut sleepers: JoinSet<DeliveryJob> = JoinSet::new();

        loop {
            if *self.stop_rx.borrow() {
                break;
            }

            tokio::select! {
                changed = self.stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                maybe_job = self.job_rx.recv() => {
                    match maybe_job {
                        Some(job) => Self::process(&self.ctx, job, &mut sleepers).await,
                        None => break,
                    }
                }
                Some(joined) = sleepers.join_next(), if !sleepers.is_empty() => {
                    if let Ok(job) = joined {
                        Self::process(&self.ctx, job, &mut sleepers).await;
                    }
                }
            }
        }

        // Jobs buffered before the stop signal still get one pass.
        while let Ok(job) = self.job_rx.try_recv() {
            Self::final_pass(&self.ctx, job).await;
        }

        let deadline = Instant::now() + self.shutdown_grace;
        while !sleepers.is_empty() {
            match timeout_at(deadline, sleepers.join_next()).await {
                Ok(Some(Ok(job))) => Self::final_pass(&self.ctx, job).await,
                Ok(Some(Err(_)) | None) => break,
                Err(_) => {
                    warn!(
                        parked = sleepers.len(),
                        "shutdown grace elapsed, dropping parked retries"
                    );
                    sleepers.abort_all();
                    while sleepers.join_next().await.is_some() {}
                    break;
                }
            }
        }

        self.job_rx
    }

    /// One attempt pass; park the job for backoff when recipients remain.
    async fn process(ctx: &PassContext, job: DeliveryJob, sleepers: &mut JoinSet<DeliveryJob>) {
        if let Some(retry_job) = Self::attempt_pass(ctx, job).await {
            let delay = ctx.retry.delay_for_attempt(retry_job.attempt.saturating_sub(1));
            debug!(
                actor_id = %retry_job.actor_id,
                attempt = retry_job.attempt,
                pending = retry_job.pending.len(),
                delay = ?delay,
                "parking delivery for retry"
            );
            sleepers.spawn(async move {
                tokio::time::sleep(delay).await;
                retry_job
            });
        }
    }

    /// One attempt pass during shutdown; remaining recipients are abandoned
    /// instead of rescheduled.
    async fn final_pass(ctx: &PassContext, job: DeliveryJob) {
        if let Some(rest) = Self::attempt_pass(ctx, job).await {
            let mut log = ctx.abandoned.lock().await;
            for inbox in rest.pending {
                warn!(
                    actor_id = %rest.actor_id,
                    inbox = %inbox,
                    attempts = rest.attempt,
                    "abandoning delivery on shutdown"
                );
                log.push(AbandonedDelivery::new(
                    rest.actor_id.clone(),
                    inbox,
                    rest.attempt,
                    "shutdown".to_string(),
                ));
            }
        }
    }

    /// Try every pending inbox once. Returns the job with its surviving
    /// recipients when a retry is warranted, `None` when the job is done
    /// (everything delivered, failed permanently, or out of attempts).
    async fn attempt_pass(ctx: &PassContext, mut job: DeliveryJob) -> Option<DeliveryJob> {
        let pass = job.attempt.saturating_add(1);
        debug!(
            actor_id = %job.actor_id,
            pass,
            inboxes = job.pending.len(),
            "delivery attempt pass"
        );

        let payload = &job.payload;
        let client = &ctx.client;
        let per_attempt = ctx.attempt_timeout;
        let outcomes = futures::future::join_all(job.pending.iter().map(|inbox| async move {
            match timeout(per_attempt, client.deliver(payload, inbox)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(inbox = %inbox, "delivery attempt timed out");
                    DeliveryOutcome::Transient
                }
            }
        }))
        .await;

        let mut remaining = Vec::new();
        let mut dropped = Vec::new();
        for (inbox, outcome) in job.pending.iter().zip(&outcomes) {
            match outcome {
                DeliveryOutcome::Delivered => {
                    debug!(actor_id = %job.actor_id, inbox = %inbox, "activity delivered");
                }
                DeliveryOutcome::Transient => remaining.push(inbox.clone()),
                DeliveryOutcome::Permanent => {
                    warn!(
                        actor_id = %job.actor_id,
                        inbox = %inbox,
                        "permanent delivery failure, dropping recipient"
                    );
                    dropped.push(AbandonedDelivery::new(
                        job.actor_id.clone(),
                        inbox.clone(),
                        pass,
                        "permanent failure".to_string(),
                    ));
                }
            }
        }

        if !dropped.is_empty() {
            ctx.abandoned.lock().await.append(&mut dropped);
        }

        job.attempt = pass;
        if remaining.is_empty() {
            return None;
        }

        if ctx.retry.should_retry(job.attempt) {
            job.pending = remaining;
            Some(job)
        } else {
            let mut log = ctx.abandoned.lock().await;
            for inbox in remaining {
                warn!(
                    actor_id = %job.actor_id,
                    inbox = %inbox,
                    attempts = job.attempt,
                    "delivery attempts exhausted, abandoning recipient"
                );
                log.push(AbandonedDelivery::new(
                    job.actor_id.clone(),
                    inbox,
                    job.attempt,
                    "max attempts reached".to_string(),
                ));
            }
            None
        }
    }
}
