use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::domain::{ErrorList, FailedJob, HandlerError, Job, WorkerError};
use crate::handler::{JobContext, JobHandler};
use crate::heartbeat::Heartbeat;
use crate::keys::{self, KeySpace};
use crate::ports::{Clock, Stores};

/// Lifecycle of a worker. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    Running,
    Stopping,
    Stopped,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Created => "created",
            WorkerState::Running => "running",
            WorkerState::Stopping => "stopping",
            WorkerState::Stopped => "stopped",
        }
    }
}

/// One worker polling one queue.
///
/// - `start()` で heartbeat・登録・polling を開始
/// - `stop()` で polling の終了を待ってから後片付け
///
/// At most one job is in flight: the next poll is only awaited after the
/// current job, including every handler call, has finished.
///
/// Dropping a started worker without `stop()` cancels its loops but leaves
/// its keys in the store.
pub struct Worker {
    keys: Arc<KeySpace>,
    stores: Stores,
    handler: Arc<dyn JobHandler>,
    clock: Arc<dyn Clock>,
    heartbeat: Heartbeat,
    poll_interval: Duration,
    cancel: CancellationToken,
    poller: Option<JoinHandle<()>>,
    _guard: Option<DropGuard>,
    state: WorkerState,
}

impl Worker {
    pub fn new(
        keys: KeySpace,
        stores: Stores,
        handler: Arc<dyn JobHandler>,
        clock: Arc<dyn Clock>,
        config: &WorkerConfig,
    ) -> Result<Self, WorkerError> {
        config.validate()?;
        let heartbeat = Heartbeat::new(
            Arc::clone(&stores.hash),
            Arc::clone(&clock),
            keys.queue(),
            config.heartbeat_interval(),
        );
        Ok(Self {
            keys: Arc::new(keys),
            stores,
            handler,
            clock,
            heartbeat,
            poll_interval: config.poll_interval(),
            cancel: CancellationToken::new(),
            poller: None,
            _guard: None,
            state: WorkerState::Created,
        })
    }

    /// Tie the polling loop to `parent`: cancelling it stops polling.
    /// Bookkeeping is still only removed by `stop()`.
    pub fn with_parent(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Start the heartbeat, register in `resque:workers`, then start polling.
    ///
    /// A registration error is returned, but the heartbeat and the poller keep
    /// running; `stop()` is still required.
    pub async fn start(&mut self) -> Result<(), WorkerError> {
        if self.state != WorkerState::Created {
            return Err(WorkerError::InvalidState {
                expected: WorkerState::Created.as_str(),
                actual: self.state.as_str(),
            });
        }
        self.state = WorkerState::Running;

        self.heartbeat.start();
        let registered = self.register().await;

        let processor = Processor {
            keys: Arc::clone(&self.keys),
            stores: self.stores.clone(),
            handler: Arc::clone(&self.handler),
            clock: Arc::clone(&self.clock),
        };
        let period = self.poll_interval;
        let cancel = self.cancel.clone();
        self.poller = Some(tokio::spawn(async move {
            processor.poll(period, cancel).await;
        }));
        self._guard = Some(self.cancel.clone().drop_guard());

        info!(worker = %self.keys.identity(), queue = %self.keys.queue_name(), "worker started");
        registered
    }

    async fn register(&self) -> Result<(), WorkerError> {
        let identity = self.keys.identity();
        let members = self.stores.set.smembers(keys::WORKERS).await?;
        if !members.iter().any(|m| m == identity) {
            self.stores.set.sadd(keys::WORKERS, identity).await?;
        }
        self.stores
            .kv
            .set(self.keys.worker_started(), &self.clock.timestamp())
            .await?;
        Ok(())
    }

    /// Stop polling and remove this worker's bookkeeping.
    ///
    /// Blocks until the in-flight job (if any) finishes; a handler that never
    /// returns blocks this forever. Every teardown step runs even if an earlier
    /// one failed, and all failures are returned together.
    pub async fn stop(&mut self) -> Result<(), ErrorList> {
        let mut errors = ErrorList::new();
        if self.state != WorkerState::Running {
            errors.push(WorkerError::InvalidState {
                expected: WorkerState::Running.as_str(),
                actual: self.state.as_str(),
            });
            return errors.into_result();
        }
        self.state = WorkerState::Stopping;

        self.cancel.cancel();
        if let Some(poller) = self.poller.take()
            && let Err(err) = poller.await
        {
            errors.push(WorkerError::Aborted(err.to_string()));
        }

        let identity = self.keys.identity();
        errors.record(self.stores.set.srem(keys::WORKERS, identity).await);

        match self.stores.kv.get(self.keys.worker()).await {
            Ok(Some(_)) => {
                error!(worker = %identity, "shutting down while holding a job");
                errors.record(self.stores.kv.del(self.keys.worker()).await);
            }
            Ok(None) => {}
            Err(err) => errors.push(err),
        }

        errors.record(self.stores.kv.del(self.keys.worker_started()).await);
        errors.record(self.stores.kv.del(self.keys.stat_processed()).await);
        errors.record(self.stores.kv.del(self.keys.stat_failed()).await);
        errors.record(self.heartbeat.stop().await);

        self.state = WorkerState::Stopped;
        if errors.is_empty() {
            info!(worker = %identity, "worker stopped");
        } else {
            warn!(worker = %identity, error = %errors, "worker stopped with errors");
        }
        errors.into_result()
    }
}

/// The part of a worker that moves into the polling task.
struct Processor {
    keys: Arc<KeySpace>,
    stores: Stores,
    handler: Arc<dyn JobHandler>,
    clock: Arc<dyn Clock>,
}

impl Processor {
    async fn poll(&self, period: Duration, cancel: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // tick の処理中は cancel を見ない（処理完了まで待つ）
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.tick().await,
            }
        }
        debug!(worker = %self.keys.identity(), "polling stopped");
    }

    async fn tick(&self) {
        let worker = self.keys.identity();
        let payload = match self.stores.queue.lpop(self.keys.queue()).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return,
            Err(err) => {
                // TODO: back off after repeated transport errors instead of retrying every tick
                warn!(worker = %worker, error = %err, "pop failed");
                return;
            }
        };

        if let Err(err) = self.stores.kv.set(self.keys.worker(), &payload).await {
            warn!(worker = %worker, error = %err, "claim failed, job dropped");
            return;
        }

        if let Err(err) = self.perform(&payload).await {
            warn!(worker = %worker, error = %err, "job processing aborted");
        }
    }

    async fn perform(&self, payload: &str) -> Result<(), WorkerError> {
        let job = Job::decode(payload)?;
        let worker = self.keys.identity();

        for task in &job.args {
            let ctx = JobContext::for_task(task, worker);
            let call = self.handler.perform(&task.queue_name, &task.arguments, &ctx);
            let outcome = match AssertUnwindSafe(call).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(HandlerError::new("Panic", panic_message(panic.as_ref()))),
            };
            match outcome {
                Ok(()) => {
                    debug!(worker = %worker, job_id = %task.job_id, class = %task.job_class, "job succeeded");
                }
                Err(err) => {
                    warn!(worker = %worker, job_id = %task.job_id, error = %err, "job failed");
                    self.fail(&job, &err).await?;
                }
            }
        }

        self.increment(keys::STAT_PROCESSED, self.keys.stat_processed())
            .await?;
        self.stores.kv.del(self.keys.worker()).await?;
        Ok(())
    }

    async fn fail(&self, job: &Job, err: &HandlerError) -> Result<(), WorkerError> {
        let record = FailedJob::new(job, err, self.keys.worker(), self.clock.timestamp());
        self.stores
            .queue
            .rpush(keys::FAILED, &record.encode()?)
            .await?;
        self.increment(keys::STAT_FAILED, self.keys.stat_failed())
            .await
    }

    /// Bump the global counter and this worker's counter.
    async fn increment(&self, global: &str, own: &str) -> Result<(), WorkerError> {
        self.stores.counter.incr_by(global, 1).await?;
        self.stores.counter.incr_by(own, 1).await?;
        Ok(())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "handler panicked".to_string()
    }
}
