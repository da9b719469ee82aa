//! Resque key layout.
//!
//! Every key a worker touches is derived from `(host, worker id, queue)`.
//! The layout matches Resque so existing dashboards and producers can share
//! the same Redis instance.

/// Per-worker keys are `resque:worker:<identity>`.
pub const WORKER_PREFIX: &str = "resque:worker";

/// Set of every running worker identity.
pub const WORKERS: &str = "resque:workers";

/// Hash of queue identity -> last heartbeat timestamp.
pub const HEARTBEAT: &str = "resque:workers:heartbeat";

pub const QUEUE_PREFIX: &str = "resque:queue";

/// Global failed-job ledger (a list).
pub const FAILED: &str = "resque:failed";

/// Global processed counter; per-worker counters append the identity.
pub const STAT_PROCESSED: &str = "resque:stat:processed";

/// Global failed counter; per-worker counters append the identity.
pub const STAT_FAILED: &str = "resque:stat:failed";

/// Keys for one worker, computed once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    worker_id: String,
    queue_name: String,

    queue: String,
    identity: String,
    worker: String,
    worker_started: String,
    stat_processed: String,
    stat_failed: String,
}

impl KeySpace {
    pub fn new(host: impl Into<String>, worker_id: impl Into<String>, queue: impl Into<String>) -> Self {
        let host = host.into();
        let worker_id = worker_id.into();
        let queue_name = queue.into();

        let identity = format!("{host}:{worker_id}:{queue_name}");
        let worker = format!("{WORKER_PREFIX}:{identity}");

        Self {
            queue: format!("{QUEUE_PREFIX}:{queue_name}"),
            worker_started: format!("{worker}:started"),
            stat_processed: format!("{STAT_PROCESSED}:{identity}"),
            stat_failed: format!("{STAT_FAILED}:{identity}"),
            worker,
            identity,
            worker_id,
            queue_name,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// `resque:queue:<queue>`: the list jobs are popped from.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// `<host>:<id>:<queue>`: member of the worker registry.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// `resque:worker:<identity>`: holds the payload being processed.
    pub fn worker(&self) -> &str {
        &self.worker
    }

    pub fn worker_started(&self) -> &str {
        &self.worker_started
    }

    pub fn stat_processed(&self) -> &str {
        &self.stat_processed
    }

    pub fn stat_failed(&self) -> &str {
        &self.stat_failed
    }
}
