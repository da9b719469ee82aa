//! Error types.
//!
//! - `StoreError`: the store collaborator failed (transport level)
//! - `HandlerError`: a job handler reported failure; recorded, never propagated
//! - `WorkerError`: anything the worker runtime itself can fail with
//! - `ErrorList`: ordered collection returned from teardown

use std::fmt;

use thiserror::Error;

/// Failure reported by a store capability.
///
/// "Not found" is never a `StoreError`; lookups return `Option` instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store operation `{op}` failed: {message}")]
    Transport { op: &'static str, message: String },

    #[error("key `{key}` holds a value of the wrong type")]
    WrongType { key: String },
}

impl StoreError {
    pub fn transport(op: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            op,
            message: message.into(),
        }
    }
}

/// Errors raised by the worker runtime and the pool.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("payload decode: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed job encode: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("invalid worker state: expected {expected}, got {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("config: {0}")]
    Config(String),

    #[error("worker task aborted: {0}")]
    Aborted(String),
}

/// A handler's report that a job failed.
///
/// `kind` ends up in the ledger's `exception` field and `message` in `error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    kind: String,
    message: String,
    backtrace: Vec<String>,
}

impl HandlerError {
    pub const DEFAULT_KIND: &'static str = "HandlerError";

    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            backtrace: Vec::new(),
        }
    }

    /// Failure with the default kind label.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Self::DEFAULT_KIND, message)
    }

    /// Wrap any error; the kind label is the error's type name without its path.
    pub fn from_error<E: std::error::Error>(err: &E) -> Self {
        Self::new(short_type_name::<E>(), err.to_string())
    }

    pub fn with_backtrace(mut self, lines: Vec<String>) -> Self {
        self.backtrace = lines;
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn backtrace(&self) -> &[String] {
        &self.backtrace
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for HandlerError {}

fn short_type_name<T>() -> String {
    let full = std::any::type_name::<T>();
    // generic 引数の中の "::" は無視する
    let base = full.split('<').next().unwrap_or(full);
    let short = base.rsplit("::").next().unwrap_or(base);
    match full.find('<') {
        Some(idx) => format!("{short}{}", &full[idx..]),
        None => short.to_string(),
    }
}

/// Ordered collection of errors treated as one failure.
///
/// Returned by teardown so every step runs even when earlier ones fail.
#[derive(Debug, Default)]
pub struct ErrorList {
    errors: Vec<WorkerError>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn push(&mut self, err: impl Into<WorkerError>) {
        self.errors.push(err.into());
    }

    /// Record the error of a failed step, if any.
    pub fn record<T, E: Into<WorkerError>>(&mut self, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.push(err);
                None
            }
        }
    }

    pub fn extend(&mut self, other: ErrorList) {
        self.errors.extend(other.errors);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WorkerError> {
        self.errors.iter()
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ErrorList> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s) occurred", self.errors.len())?;
        for (i, err) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorList {}

impl IntoIterator for ErrorList {
    type Item = WorkerError;
    type IntoIter = std::vec::IntoIter<WorkerError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
