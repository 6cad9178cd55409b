//! Error types for the online schema change engine.
//!
//! Every fallible engine operation returns `Result<T, LhmError>`. Errors are
//! classified by [`LhmErrorKind`] so a caller embedding the engine in a larger
//! migration runner can decide programmatically whether to retry, alert, or
//! give up, without matching on every individual variant.
//!
//! # Error Classification
//!
//! - **Precondition** — bad input discovered before any side effect (missing
//!   PK, name collision, invalid config). Never retried.
//! - **Contention** — lock-wait timeouts during cutover. Retried with backoff
//!   by the switcher itself, up to its configured ceiling.
//! - **Mirroring** — trigger install/teardown failures.
//! - **Copy** — chunk insert failures during backfill.
//! - **Driver** — anything surfaced by the adapter that doesn't fit the above;
//!   treated as a bug if it happens with engine-generated SQL.
//! - **Cancelled** — a host-requested cancellation was observed at a
//!   suspension point. Not retried; requires the same operator cleanup as
//!   any other mid-run failure.

use std::fmt;

/// Which phase of a run an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ShadowCreate,
    MigrateCallback,
    Entangle,
    Chunk,
    Switch,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::ShadowCreate => "shadow-create",
            Phase::MigrateCallback => "migrate-callback",
            Phase::Entangle => "entangle",
            Phase::Chunk => "chunk",
            Phase::Switch => "switch",
        };
        write!(f, "{s}")
    }
}

/// Primary error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum LhmError {
    // ── Precondition errors — fail fast, no side effects yet ────────────
    /// The origin table lacks a single-column integer primary key.
    #[error("table {table} has no single-column integer primary key")]
    NoIntegerPrimaryKey { table: String },

    /// The shadow table name is already taken (a prior run's leftovers, or a
    /// second concurrent run against the same origin).
    #[error("shadow table {0} already exists")]
    ShadowTableExists(String),

    /// Atomic switch was requested but the server doesn't support it.
    #[error("atomic switch requested but not supported by this server")]
    AtomicSwitchUnsupported,

    /// Atomic-switch mode was left unset and auto-detection could not
    /// determine a default.
    #[error("atomic_switch not set and could not be auto-detected")]
    AtomicSwitchAmbiguous,

    /// A configuration value failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Mirroring errors ──────────────────────────────────────────────────
    /// Trigger install or teardown failed.
    #[error("trigger {name} {action} failed on {table} (phase {phase}): {source}")]
    Mirroring {
        table: String,
        name: String,
        action: &'static str,
        phase: Phase,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ── Copy errors ───────────────────────────────────────────────────────
    /// A chunk's `INSERT IGNORE ... SELECT` failed.
    #[error("chunk copy failed on {table} for range [{lo}, {hi}] (phase {phase}): {source}")]
    Copy {
        table: String,
        lo: i64,
        hi: i64,
        phase: Phase,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ── Contention errors ─────────────────────────────────────────────────
    /// Cutover retries were exhausted waiting for a metadata lock.
    #[error("switch retries exhausted on {table} after {attempts} attempts: {source}")]
    SwitchRetriesExhausted {
        table: String,
        attempts: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ── Driver errors — surfaced from the adapter, not otherwise classified
    #[error("driver error on {table} (phase {phase}): {source}")]
    Driver {
        table: String,
        phase: Phase,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ── Cancellation ──────────────────────────────────────────────────────
    /// A host-requested cancellation was observed at a suspension point
    /// (between chunks, or between switch retries). Triggers, if installed,
    /// are still torn down; the shadow table is left for inspection.
    #[error("{table} migration cancelled during phase {phase}")]
    Cancelled { table: String, phase: Phase },
}

impl LhmError {
    /// Whether a caller might reasonably retry the whole run.
    ///
    /// Preconditions never are; mirroring/copy/driver failures usually mean
    /// bad server state that a bare retry won't fix; exhausted switch
    /// retries already represent the engine's own retry budget being spent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LhmError::Driver { .. })
    }

    /// Whether this error leaves the engine's side effects (shadow table,
    /// possibly triggers) requiring operator cleanup before a re-run.
    pub fn requires_operator_action(&self) -> bool {
        !matches!(
            self,
            LhmError::NoIntegerPrimaryKey { .. }
                | LhmError::AtomicSwitchUnsupported
                | LhmError::AtomicSwitchAmbiguous
                | LhmError::InvalidConfig(_)
        )
    }

    /// The table this error concerns, where applicable.
    pub fn table(&self) -> Option<&str> {
        match self {
            LhmError::NoIntegerPrimaryKey { table } => Some(table),
            LhmError::ShadowTableExists(t) => Some(t),
            LhmError::Mirroring { table, .. }
            | LhmError::Copy { table, .. }
            | LhmError::SwitchRetriesExhausted { table, .. }
            | LhmError::Driver { table, .. }
            | LhmError::Cancelled { table, .. } => Some(table),
            LhmError::AtomicSwitchUnsupported
            | LhmError::AtomicSwitchAmbiguous
            | LhmError::InvalidConfig(_) => None,
        }
    }
}

/// Coarse classification, used for logging/metrics without matching on every
/// variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LhmErrorKind {
    Precondition,
    Mirroring,
    Copy,
    Contention,
    Driver,
    Cancelled,
}

impl fmt::Display for LhmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LhmErrorKind::Precondition => "PRECONDITION",
            LhmErrorKind::Mirroring => "MIRRORING",
            LhmErrorKind::Copy => "COPY",
            LhmErrorKind::Contention => "CONTENTION",
            LhmErrorKind::Driver => "DRIVER",
            LhmErrorKind::Cancelled => "CANCELLED",
        };
        write!(f, "{s}")
    }
}

impl LhmError {
    pub fn kind(&self) -> LhmErrorKind {
        match self {
            LhmError::NoIntegerPrimaryKey { .. }
            | LhmError::ShadowTableExists(_)
            | LhmError::AtomicSwitchUnsupported
            | LhmError::AtomicSwitchAmbiguous
            | LhmError::InvalidConfig(_) => LhmErrorKind::Precondition,

            LhmError::Mirroring { .. } => LhmErrorKind::Mirroring,
            LhmError::Copy { .. } => LhmErrorKind::Copy,
            LhmError::SwitchRetriesExhausted { .. } => LhmErrorKind::Contention,
            LhmError::Driver { .. } => LhmErrorKind::Driver,
            LhmError::Cancelled { .. } => LhmErrorKind::Cancelled,
        }
    }
}

// ── Retry policy (switcher cutover retries) ─────────────────────────────────

/// Flat retry schedule used by the switcher while waiting for a metadata lock
/// to clear: sleep `base_delay_ms` between attempts, up to `max_attempts`
/// times. Per SPEC_FULL.md §4.5/§4.6 this is a constant per-attempt delay,
/// not a growing backoff — the bound on total wait is `max_attempts *
/// base_delay_ms`, matching scenario 5's "within `max_retries ×
/// retry_sleep_time` window".
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 10,
            max_attempts: 600,
        }
    }
}

impl RetryPolicy {
    /// Delay in ms before the next attempt. Constant regardless of `attempt`.
    pub fn backoff_ms(&self, _attempt: u32) -> u64 {
        self.base_delay_ms
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert_eq!(
            LhmError::NoIntegerPrimaryKey { table: "t".into() }.kind(),
            LhmErrorKind::Precondition
        );
        assert_eq!(
            LhmError::AtomicSwitchUnsupported.kind(),
            LhmErrorKind::Precondition
        );
        assert_eq!(
            LhmError::SwitchRetriesExhausted {
                table: "t".into(),
                attempts: 600,
                source: "timeout".into(),
            }
            .kind(),
            LhmErrorKind::Contention
        );
    }

    #[test]
    fn cancelled_errors_require_operator_action() {
        let e = LhmError::Cancelled {
            table: "users".into(),
            phase: Phase::Chunk,
        };
        assert_eq!(e.kind(), LhmErrorKind::Cancelled);
        assert!(!e.is_retryable());
        assert!(e.requires_operator_action());
        assert_eq!(e.table(), Some("users"));
    }

    #[test]
    fn precondition_errors_not_retryable_and_need_no_cleanup() {
        let e = LhmError::InvalidConfig("stride must be >= 1".into());
        assert!(!e.is_retryable());
        assert!(!e.requires_operator_action());
    }

    #[test]
    fn mirroring_errors_require_operator_action() {
        let e = LhmError::Mirroring {
            table: "users".into(),
            name: "lhmt_ins_users".into(),
            action: "install",
            phase: Phase::Entangle,
            source: "syntax error".into(),
        };
        assert!(e.requires_operator_action());
        assert_eq!(e.table(), Some("users"));
    }

    #[test]
    fn retry_policy_backoff_is_flat() {
        let policy = RetryPolicy {
            base_delay_ms: 1000,
            max_attempts: 5,
        };
        assert_eq!(policy.backoff_ms(0), 1000);
        assert_eq!(policy.backoff_ms(1), 1000);
        assert_eq!(policy.backoff_ms(4), 1000);
        assert_eq!(policy.backoff_ms(100), 1000);
    }

    #[test]
    fn retry_policy_should_retry() {
        let policy = RetryPolicy {
            base_delay_ms: 10,
            max_attempts: 3,
        };
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }
}
