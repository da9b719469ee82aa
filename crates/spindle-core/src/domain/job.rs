//! Job payloads and failed-job records.
//!
//! Field names follow the Resque / ActiveJob wire format, so these types
//! must stay compatible with payloads produced by other Resque clients.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::errors::{HandlerError, WorkerError};

/// One payload popped from a queue.
///
/// Unknown fields are ignored so payloads from richer producers still decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub queue: String,

    /// Read leniently: a value that is not a recognisable time becomes `None`.
    #[serde(
        default,
        deserialize_with = "lenient_run_at",
        skip_serializing_if = "Option::is_none"
    )]
    pub run_at: Option<DateTime<FixedOffset>>,

    pub class: String,

    #[serde(default)]
    pub args: Vec<InnerTask>,
}

/// A unit of work nested in a `Job`. Each one is handed to the handler separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InnerTask {
    pub job_class: String,
    pub job_id: String,
    pub queue_name: String,

    #[serde(default)]
    pub arguments: Vec<Value>,

    #[serde(default)]
    pub locale: String,
}

impl Job {
    pub fn decode(payload: &str) -> Result<Self, WorkerError> {
        serde_json::from_str(payload).map_err(WorkerError::Decode)
    }

    pub fn encode(&self) -> Result<String, WorkerError> {
        serde_json::to_string(self).map_err(WorkerError::Encode)
    }
}

/// `Time#to_s` as written by Ruby producers.
const RUBY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Accepts RFC 3339, Ruby `Time#to_s` or epoch seconds.
fn lenient_run_at<'de, D>(deserializer: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
where
    D: Deserializer<'de>,
{
    let at = match Value::deserialize(deserializer)? {
        Value::String(raw) => DateTime::parse_from_rfc3339(&raw)
            .or_else(|_| DateTime::parse_from_str(&raw, RUBY_TIME_FORMAT))
            .ok(),
        Value::Number(secs) => secs
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|at| at.fixed_offset()),
        _ => None,
    };
    Ok(at)
}

/// Entry appended to the global failed-job ledger.
///
/// Write-once: the runtime never reads these back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedJob {
    pub failed_at: String,
    pub payload: Job,
    pub exception: String,
    pub error: String,
    #[serde(default)]
    pub backtrace: Vec<String>,
    pub worker: String,
    pub queue: String,
}

impl FailedJob {
    pub fn new(job: &Job, err: &HandlerError, worker: &str, failed_at: String) -> Self {
        Self {
            failed_at,
            payload: job.clone(),
            exception: err.kind().to_string(),
            error: err.message().to_string(),
            backtrace: err.backtrace().to_vec(),
            worker: worker.to_string(),
            queue: job.queue.clone(),
        }
    }

    pub fn encode(&self) -> Result<String, WorkerError> {
        serde_json::to_string(self).map_err(WorkerError::Encode)
    }
}
