//! The processor: inbound queues, lifecycle, and the dispatch loop.
//!
//! The client API and the inbound federation handler fire activities into
//! the processor and return immediately; messages are distributed to the
//! side-effect handlers without slowing down the request-serving path.

mod dispatch;

use std::sync::Arc;

use corvid_common::{AppError, AppResult, ProcessorConfig};
use tokio::sync::{Mutex, Semaphore, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::activity::Activity;
use crate::handlers::HandlerRegistry;

use dispatch::DispatchLoop;

/// Lifecycle state of the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    /// Constructed, never started.
    Created,
    /// Dispatch loop running.
    Running,
    /// Stop requested, drain in progress.
    Stopping,
    /// Drain complete (or deadline elapsed); restartable.
    Stopped,
}

impl ProcessorState {
    /// Short label used in structured logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

type ActivityReceivers = (mpsc::Receiver<Activity>, mpsc::Receiver<Activity>);

struct Inner {
    state: ProcessorState,
    client_rx: Option<mpsc::Receiver<Activity>>,
    federator_rx: Option<mpsc::Receiver<Activity>>,
    stop_tx: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<ActivityReceivers>>,
}

/// The message distribution engine.
///
/// Owns the two bounded inbound queues and the dispatch loop that drains
/// them. Constructed once and injected into the owning process's startup and
/// shutdown sequence; there is no implicit global instance.
pub struct Processor {
    config: ProcessorConfig,
    registry: Arc<HandlerRegistry>,
    client_tx: mpsc::Sender<Activity>,
    federator_tx: mpsc::Sender<Activity>,
    inner: Mutex<Inner>,
}

impl Processor {
    /// Create a processor over the given handler registry.
    ///
    /// Fails with [`AppError::Config`] when the configuration is invalid;
    /// this is the only fatal error the engine produces.
    pub fn new(config: ProcessorConfig, registry: HandlerRegistry) -> AppResult<Self> {
        config.validate()?;

        let (client_tx, client_rx) = mpsc::channel(config.queue_capacity);
        let (federator_tx, federator_rx) = mpsc::channel(config.queue_capacity);

        Ok(Self {
            config,
            registry: Arc::new(registry),
            client_tx,
            federator_tx,
            inner: Mutex::new(Inner {
                state: ProcessorState::Created,
                client_rx: Some(client_rx),
                federator_rx: Some(federator_rx),
                stop_tx: None,
                handle: None,
            }),
        })
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ProcessorState {
        self.inner.lock().await.state
    }

    /// Enqueue an activity from the client API, waiting when the queue is
    /// full (backpressure on the caller's request context).
    pub async fn submit_from_client_api(&self, activity: Activity) -> AppResult<()> {
        self.client_tx
            .send(activity)
            .await
            .map_err(|_| AppError::Internal("client queue closed".to_string()))
    }

    /// Enqueue an activity from the inbound federation handler, waiting when
    /// the queue is full. A stalled federator queue deliberately stalls
    /// inbound HTTP deliveries from remote peers.
    pub async fn submit_from_federator(&self, activity: Activity) -> AppResult<()> {
        self.federator_tx
            .send(activity)
            .await
            .map_err(|_| AppError::Internal("federator queue closed".to_string()))
    }

    /// Non-blocking variant of [`Self::submit_from_client_api`]; reports
    /// [`AppError::QueueFull`] instead of waiting.
    pub fn try_submit_from_client_api(&self, activity: Activity) -> AppResult<()> {
        Self::try_submit(&self.client_tx, activity, "client")
    }

    /// Non-blocking variant of [`Self::submit_from_federator`]; reports
    /// [`AppError::QueueFull`] instead of waiting.
    pub fn try_submit_from_federator(&self, activity: Activity) -> AppResult<()> {
        Self::try_submit(&self.federator_tx, activity, "federator")
    }

    fn try_submit(
        tx: &mpsc::Sender<Activity>,
        activity: Activity,
        queue: &'static str,
    ) -> AppResult<()> {
        tx.try_send(activity).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => AppError::QueueFull(queue),
            mpsc::error::TrySendError::Closed(_) => {
                AppError::Internal(format!("{queue} queue closed"))
            }
        })
    }

    /// Start the dispatch loop.
    ///
    /// A no-op reporting the current state when already running or stopping.
    pub async fn start(&self) -> AppResult<ProcessorState> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            ProcessorState::Running | ProcessorState::Stopping => {
                info!(state = inner.state.as_str(), "processor already active, start is a no-op");
                return Ok(inner.state);
            }
            ProcessorState::Created | ProcessorState::Stopped => {}
        }

        let client_rx = inner
            .client_rx
            .take()
            .ok_or_else(|| AppError::Internal("client queue receiver missing".to_string()))?;
        let federator_rx = inner
            .federator_rx
            .take()
            .ok_or_else(|| AppError::Internal("federator queue receiver missing".to_string()))?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let dispatch = DispatchLoop {
            client_rx,
            federator_rx,
            registry: self.registry.clone(),
            pool: Arc::new(Semaphore::new(self.config.workers)),
            fairness_bound: self.config.fairness_bound,
            handler_timeout: self.config.handler_timeout(),
            drain_deadline: self.config.drain_deadline(),
            stop_rx,
        };

        inner.handle = Some(tokio::spawn(dispatch.run()));
        inner.stop_tx = Some(stop_tx);
        inner.state = ProcessorState::Running;

        info!(
            queue_capacity = self.config.queue_capacity,
            workers = self.config.workers,
            "processor started"
        );
        Ok(ProcessorState::Running)
    }

    /// Stop the dispatch loop with a bounded drain.
    ///
    /// Both queues are drained to empty and in-flight handler invocations
    /// are allowed to finish, all bounded by the configured drain deadline;
    /// work still outstanding at the deadline is detached and logged. A
    /// no-op reporting the current state when not running.
    pub async fn stop(&self) -> AppResult<ProcessorState> {
        let (handle, stop_tx) = {
            let mut inner = self.inner.lock().await;
            if inner.state != ProcessorState::Running {
                info!(state = inner.state.as_str(), "processor not running, stop is a no-op");
                return Ok(inner.state);
            }
            inner.state = ProcessorState::Stopping;
            (inner.handle.take(), inner.stop_tx.take())
        };

        if let Some(stop_tx) = stop_tx {
            let _ = stop_tx.send(true);
        }

        if let Some(handle) = handle {
            // The dispatch loop bounds its own drain; this await is finite.
            match handle.await {
                Ok((client_rx, federator_rx)) => {
                    let mut inner = self.inner.lock().await;
                    inner.client_rx = Some(client_rx);
                    inner.federator_rx = Some(federator_rx);
                }
                Err(err) => {
                    error!(error = %err, "dispatch loop terminated abnormally");
                }
            }
        }

        let mut inner = self.inner.lock().await;
        inner.state = ProcessorState::Stopped;
        info!("processor stopped");
        Ok(ProcessorState::Stopped)
    }
}
