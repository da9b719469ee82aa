//! Domain model: job payloads, ledger records and error types.

pub mod errors;
pub mod job;

pub use self::errors::{ErrorList, HandlerError, StoreError, WorkerError};
pub use self::job::{FailedJob, InnerTask, Job};
