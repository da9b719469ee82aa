//! Clock port - 時刻の抽象化
//!
//! Heartbeats, start markers and failure records all stamp wall-clock time.
//! Taking the clock as a trait object keeps those stamps deterministic in tests.

use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};

/// Clock は現在時刻を提供
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current time as an ISO-8601 string with an explicit UTC offset.
    fn timestamp(&self) -> String {
        format_timestamp(self.now())
    }
}

/// `2024-03-01T01:20:00+00:00`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// 本番用
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// テスト用: 固定された時刻を返す。`set` で進められる。
#[derive(Debug)]
pub struct FixedClock {
    at: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at: Mutex::new(at) }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.at.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.at.lock().unwrap_or_else(|e| e.into_inner())
    }
}
