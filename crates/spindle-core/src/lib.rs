//! spindle-core
//!
//! Resque-compatible background job workers.
//!
//! # モジュール構成
//! - **domain**: job payloads, failed-job records, error types
//! - **ports**: store capabilities (queue, set, key-value, counter, hash) and the clock
//! - **keys**: Resque key layout for one `(host, worker id, queue)`
//! - **handler**: `JobHandler` trait + `HandlerFn` closure adapter
//! - **heartbeat**: periodic liveness publisher
//! - **worker**: one polling worker (start / poll / stop)
//! - **service**: queue → handler pool with a single stop handle
//! - **impls**: in-memory store for tests and local runs

pub mod config;
pub mod domain;
pub mod handler;
pub mod heartbeat;
pub mod impls;
pub mod keys;
pub mod ports;
pub mod service;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use self::config::WorkerConfig;
pub use self::domain::{ErrorList, FailedJob, HandlerError, InnerTask, Job, StoreError, WorkerError};
pub use self::handler::{HandlerFn, JobContext, JobHandler};
pub use self::keys::KeySpace;
pub use self::service::{Service, StopHandle};
pub use self::worker::{Worker, WorkerState};
