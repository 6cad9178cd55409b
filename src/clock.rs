//! Injectable time source.
//!
//! Archive-table timestamping and switcher retry scheduling both need wall
//! clock time. Routing both through this trait (rather than calling
//! `chrono::Utc::now()` or `Instant::now()` directly) lets tests assert exact
//! archive names and exact retry counts with a fixed or stepped clock.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    /// Current time, used for archive-name timestamps.
    fn now(&self) -> DateTime<Utc>;

    /// Current time in epoch milliseconds, used for retry backoff scheduling.
    fn now_ms(&self) -> u64 {
        self.now().timestamp_millis().max(0) as u64
    }
}

/// Default clock backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock for deterministic tests.
#[derive(Debug, Clone)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
