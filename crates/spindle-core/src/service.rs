//! Service - queue ごとの worker pool
//!
//! Holds one handler per queue and starts `concurrency` workers for each.
//! Register every queue before calling `start`; later registrations only
//! affect the next `start`.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::WorkerConfig;
use crate::domain::{ErrorList, WorkerError};
use crate::handler::JobHandler;
use crate::keys::KeySpace;
use crate::ports::{Clock, Stores, SystemClock};
use crate::worker::Worker;

pub struct Service {
    hostname: String,
    config: WorkerConfig,
    stores: Stores,
    clock: Arc<dyn Clock>,
    handlers: BTreeMap<String, Arc<dyn JobHandler>>,
}

impl Service {
    /// Fails if the config is invalid or no host name can be determined.
    pub fn new(stores: Stores, config: WorkerConfig) -> Result<Self, WorkerError> {
        config.validate()?;
        let hostname = match &config.hostname {
            Some(hostname) => hostname.clone(),
            None => os_hostname()?,
        };
        Ok(Self {
            hostname,
            config,
            stores,
            clock: Arc::new(SystemClock),
            handlers: BTreeMap::new(),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Register the handler for `queue`, replacing any previous one.
    pub fn register<H: JobHandler + 'static>(&mut self, queue: impl Into<String>, handler: H) {
        let queue = queue.into();
        if self.handlers.insert(queue.clone(), Arc::new(handler)).is_some() {
            warn!(queue = %queue, "handler replaced");
        }
    }

    pub fn queues(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Start `concurrency` workers per registered queue, ids `0..concurrency`.
    ///
    /// Every worker is built before any is started, so an error here leaves
    /// nothing running. Registration errors are only logged; the worker keeps
    /// running and is still torn down by the returned handle.
    pub async fn start(&self, parent: &CancellationToken) -> Result<StopHandle, WorkerError> {
        let mut workers = Vec::with_capacity(self.handlers.len() * self.config.concurrency);
        for (queue, handler) in &self.handlers {
            for id in 0..self.config.concurrency {
                let keys = KeySpace::new(self.hostname.as_str(), id.to_string(), queue.as_str());
                let worker = Worker::new(
                    keys,
                    self.stores.clone(),
                    Arc::clone(handler),
                    Arc::clone(&self.clock),
                    &self.config,
                )?;
                workers.push(worker.with_parent(parent));
            }
        }

        for worker in &mut workers {
            if let Err(err) = worker.start().await {
                warn!(worker = %worker.keys().identity(), error = %err, "worker registration failed");
            }
        }
        info!(
            host = %self.hostname,
            queues = self.handlers.len(),
            workers = workers.len(),
            "service started"
        );
        Ok(StopHandle { workers })
    }
}

fn os_hostname() -> Result<String, WorkerError> {
    let raw = hostname::get().map_err(|e| WorkerError::Config(format!("hostname: {e}")))?;
    raw.into_string()
        .map_err(|raw| WorkerError::Config(format!("hostname is not valid UTF-8: {raw:?}")))
}

/// Stops every worker started by `Service::start`.
///
/// Dropping the handle without `stop()` cancels polling and heartbeats, but
/// leaves the workers' keys in the store.
pub struct StopHandle {
    workers: Vec<Worker>,
}

impl StopHandle {
    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    /// Stop all workers concurrently. A worker that fails (or hangs) does not
    /// keep the others from tearing down; all errors are returned together.
    pub async fn stop(self) -> Result<(), ErrorList> {
        let mut tasks = JoinSet::new();
        for mut worker in self.workers {
            tasks.spawn(async move { worker.stop().await });
        }

        let mut errors = ErrorList::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(list)) => errors.extend(list),
                Err(err) => errors.push(WorkerError::Aborted(err.to_string())),
            }
        }
        errors.into_result()
    }
}
