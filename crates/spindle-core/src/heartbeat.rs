//! Heartbeat - periodic liveness publisher.
//!
//! Writes `now()` into the `resque:workers:heartbeat` hash under the worker's
//! queue identity: once on start, then once per tick until stopped.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use crate::domain::StoreError;
use crate::keys;
use crate::ports::{Clock, HashStore};

pub struct Heartbeat {
    field: String,
    period: Duration,
    hash: Arc<dyn HashStore>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    _guard: Option<DropGuard>,
}

/// Shortest accepted period; `interval_at` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

impl Heartbeat {
    pub fn new(
        hash: Arc<dyn HashStore>,
        clock: Arc<dyn Clock>,
        field: impl Into<String>,
        period: Duration,
    ) -> Self {
        Self {
            field: field.into(),
            period: period.max(MIN_PERIOD),
            hash,
            clock,
            cancel: CancellationToken::new(),
            task: None,
            _guard: None,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Spawn the publisher. Must be called at most once.
    ///
    /// Dropping the heartbeat without `stop()` ends the publisher but leaves
    /// the field in the hash.
    pub fn start(&mut self) {
        let beat = Beat {
            field: self.field.clone(),
            hash: Arc::clone(&self.hash),
            clock: Arc::clone(&self.clock),
        };
        let period = self.period;
        let cancel = self.cancel.clone();
        self.task = Some(tokio::spawn(async move {
            beat.run(period, cancel).await;
        }));
        self._guard = Some(self.cancel.clone().drop_guard());
    }

    /// Stop publishing, wait for the publisher to exit, then drop this
    /// worker's field from the liveness hash.
    pub async fn stop(&mut self) -> Result<(), StoreError> {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            warn!(field = %self.field, error = %err, "heartbeat task aborted");
        }

        self.hash.hdel(keys::HEARTBEAT, &self.field).await?;
        Ok(())
    }
}

struct Beat {
    field: String,
    hash: Arc<dyn HashStore>,
    clock: Arc<dyn Clock>,
}

impl Beat {
    async fn run(&self, period: Duration, cancel: CancellationToken) {
        self.publish().await;

        // interval の最初の tick は即時なので、1 周期後から始める
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.publish().await,
            }
        }
        debug!(field = %self.field, "heartbeat stopped");
    }

    async fn publish(&self) {
        let now = self.clock.timestamp();
        if let Err(err) = self.hash.hset(keys::HEARTBEAT, &self.field, &now).await {
            warn!(field = %self.field, error = %err, "heartbeat publish failed");
        }
    }
}
