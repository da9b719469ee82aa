//! Worker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::WorkerError;

pub const DEFAULT_CONCURRENCY: usize = 1;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Workers started per registered queue.
    pub concurrency: usize,
    pub poll_interval_ms: u64,
    pub heartbeat_interval_ms: u64,
    /// Host part of worker identities; the OS host name when unset.
    pub hostname: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            hostname: None,
        }
    }
}

impl WorkerConfig {
    /// Read `SPINDLE_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, WorkerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WorkerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            concurrency: parse_var(&lookup, "SPINDLE_CONCURRENCY")?
                .unwrap_or(defaults.concurrency),
            poll_interval_ms: parse_var(&lookup, "SPINDLE_POLL_INTERVAL_MS")?
                .unwrap_or(defaults.poll_interval_ms),
            heartbeat_interval_ms: parse_var(&lookup, "SPINDLE_HEARTBEAT_INTERVAL_MS")?
                .unwrap_or(defaults.heartbeat_interval_ms),
            hostname: lookup("SPINDLE_HOSTNAME").filter(|h| !h.is_empty()),
        })
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sub-millisecond intervals truncate to zero and fail `validate`.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = whole_millis(interval);
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval_ms = whole_millis(interval);
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Reject settings that would stall the timers or start no workers.
    pub fn validate(&self) -> Result<(), WorkerError> {
        if self.concurrency == 0 {
            return Err(WorkerError::Config("concurrency must be at least 1".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(WorkerError::Config("poll interval must be non-zero".into()));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(WorkerError::Config("heartbeat interval must be non-zero".into()));
        }
        Ok(())
    }
}

fn whole_millis(interval: Duration) -> u64 {
    u64::try_from(interval.as_millis()).unwrap_or(u64::MAX)
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, WorkerError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| WorkerError::Config(format!("{name}={raw:?}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = WorkerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, WorkerConfig::default());
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(60));
    }

    #[test]
    fn reads_overrides() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("SPINDLE_CONCURRENCY", "4"),
            ("SPINDLE_POLL_INTERVAL_MS", "250"),
            ("SPINDLE_HEARTBEAT_INTERVAL_MS", "10000"),
            ("SPINDLE_HOSTNAME", "media-01"),
        ]))
        .unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(10));
        assert_eq!(config.hostname.as_deref(), Some("media-01"));
    }

    #[test]
    fn rejects_garbage() {
        let err = WorkerConfig::from_lookup(lookup(&[("SPINDLE_CONCURRENCY", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("SPINDLE_CONCURRENCY"));
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let config = WorkerConfig::default().with_concurrency(0);
        assert!(matches!(config.validate(), Err(WorkerError::Config(_))));
        assert!(WorkerConfig::default().validate().is_ok());
    }

    #[test]
    fn keeps_sub_second_heartbeat() {
        let config = WorkerConfig::default().with_heartbeat_interval(Duration::from_millis(500));
        assert_eq!(config.heartbeat_interval(), Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_intervals() {
        let poll = WorkerConfig::default().with_poll_interval(Duration::ZERO);
        assert!(matches!(poll.validate(), Err(WorkerError::Config(_))));
        let sub_milli = WorkerConfig::default().with_heartbeat_interval(Duration::from_micros(300));
        assert!(matches!(sub_milli.validate(), Err(WorkerError::Config(_))));
    }

    #[test]
    fn deserializes_partial_json() {
        let config: WorkerConfig = serde_json::from_str(r#"{"concurrency": 3}"#).unwrap();
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    }
}
