//! Cutover: renaming the shadow table into the origin's place.
//!
//! Two strategies share the same retry policy and are selected once, at
//! construction, based on [`SqlHelper::supports_atomic_switch`] or an
//! explicit override:
//!
//! - [`Switcher::Atomic`] issues the single statement
//!   `RENAME TABLE origin TO archive, shadow TO origin`, which MySQL performs
//!   as one atomic metadata operation — no instant exists where `origin`
//!   resolves to neither table.
//! - [`Switcher::Locked`] is the fallback: `LOCK TABLES`, two sequential
//!   `ALTER TABLE ... RENAME TO`, then `UNLOCK TABLES`. It leaves a brief
//!   window where `origin` doesn't exist by name, and on a failure between
//!   the two renames it attempts to restore the original name before
//!   re-raising.
//!
//! Both strategies retry on lock-wait-timeout contention using the same
//! [`RetryPolicy`] flat retry delay, sleeping via an injected clock-driven
//! delay so tests can run the retry loop without wall-clock sleeps.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapter::Adapter;
use crate::clock::Clock;
use crate::error::{LhmError, Phase};
use crate::sql_helper::SqlHelper;

/// Whether a driver error looks like a lock-wait-timeout a retry might clear.
///
/// MySQL reports this as error 1205 (`ER_LOCK_WAIT_TIMEOUT`) for row locks and
/// an analogous metadata-lock wait timeout for DDL; both render "lock wait
/// timeout exceeded" in the driver's error text.
fn is_lock_contention(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("lock wait timeout") || lower.contains("1205")
}

/// Sleep `delay_ms` between retries, or return `Cancelled` immediately if
/// `cancel` fires first.
async fn retry_delay(
    delay_ms: u64,
    cancel: Option<&CancellationToken>,
    table: &str,
) -> Result<(), LhmError> {
    match cancel {
        Some(cancel) => tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_millis(delay_ms)) => Ok(()),
            _ = cancel.cancelled() => Err(LhmError::Cancelled {
                table: table.to_string(),
                phase: Phase::Switch,
            }),
        },
        None => {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            Ok(())
        }
    }
}

pub struct SwitchOutcome {
    pub archive_name: String,
    pub attempts: u32,
}

/// Compute the archive name for this run: `archive_override` if the caller
/// configured a fixed name (`archive_name` in [`crate::config::LhmConfig`]),
/// otherwise the default timestamped `lhma_<ts>_<origin>` pattern.
pub async fn archive_name(clock: &dyn Clock, origin: &str, archive_override: Option<&str>) -> String {
    if let Some(name) = archive_override {
        return name.to_string();
    }
    let ts = clock.now().format("%Y_%m_%d_%H_%M_%S");
    format!("lhma_{ts}_{origin}")
}

pub struct AtomicSwitcher<'a, A: Adapter + ?Sized> {
    helper: &'a SqlHelper<'a, A>,
    clock: &'a dyn Clock,
    retry: crate::error::RetryPolicy,
    cancel: Option<CancellationToken>,
    archive_override: Option<String>,
}

impl<'a, A: Adapter + ?Sized> AtomicSwitcher<'a, A> {
    pub fn new(helper: &'a SqlHelper<'a, A>, clock: &'a dyn Clock, retry: crate::error::RetryPolicy) -> Self {
        Self {
            helper,
            clock,
            retry,
            cancel: None,
            archive_override: None,
        }
    }

    /// Attach a cooperative cancellation token, checked between retry sleeps.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Override the computed archive name with a fixed one (the
    /// `archive_name` config key), instead of deriving it from the clock.
    pub fn with_archive_name(mut self, name: impl Into<String>) -> Self {
        self.archive_override = Some(name.into());
        self
    }

    pub async fn run(&self, origin: &str, shadow: &str) -> Result<SwitchOutcome, LhmError> {
        let archive = archive_name(self.clock, origin, self.archive_override.as_deref()).await;
        let sql = format!(
            "RENAME TABLE {origin} TO {archive}, {shadow} TO {origin_unquoted}",
            origin = self.helper.quote_table(origin),
            archive = self.helper.quote_table(&archive),
            shadow = self.helper.quote_table(shadow),
            origin_unquoted = self.helper.quote_table(origin),
        );

        let mut attempt = 0u32;
        loop {
            match self.helper.execute(&sql, Phase::Switch, origin).await {
                Ok(_) => {
                    info!(table = origin, archive = %archive, attempts = attempt + 1, "atomic switch complete");
                    return Ok(SwitchOutcome {
                        archive_name: archive,
                        attempts: attempt + 1,
                    });
                }
                Err(LhmError::Driver { table, phase, source }) if is_lock_contention(&source.to_string()) => {
                    if !self.retry.should_retry(attempt) {
                        return Err(LhmError::SwitchRetriesExhausted {
                            table,
                            attempts: attempt,
                            source,
                        });
                    }
                    let delay = self.retry.backoff_ms(attempt);
                    warn!(table = %table, phase = %phase, attempt, delay_ms = delay, "switch retry after lock contention");
                    retry_delay(delay, self.cancel.as_ref(), &table).await?;
                    attempt += 1;
                }
                Err(other) => return Err(other),
            }
        }
    }
}

pub struct LockedSwitcher<'a, A: Adapter + ?Sized> {
    helper: &'a SqlHelper<'a, A>,
    clock: &'a dyn Clock,
    retry: crate::error::RetryPolicy,
    cancel: Option<CancellationToken>,
    archive_override: Option<String>,
}

impl<'a, A: Adapter + ?Sized> LockedSwitcher<'a, A> {
    pub fn new(helper: &'a SqlHelper<'a, A>, clock: &'a dyn Clock, retry: crate::error::RetryPolicy) -> Self {
        Self {
            helper,
            clock,
            retry,
            cancel: None,
            archive_override: None,
        }
    }

    /// Override the computed archive name with a fixed one (the
    /// `archive_name` config key), instead of deriving it from the clock.
    pub fn with_archive_name(mut self, name: impl Into<String>) -> Self {
        self.archive_override = Some(name.into());
        self
    }

    /// Attach a cooperative cancellation token, checked between lock-wait
    /// retries. Once `LOCK TABLES` has succeeded the rename sequence runs
    /// to completion uninterrupted — cancelling mid-rename would leave the
    /// origin table name unresolved, which this switcher already guards
    /// against independently of cancellation.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub async fn run(&self, origin: &str, shadow: &str) -> Result<SwitchOutcome, LhmError> {
        let archive = archive_name(self.clock, origin, self.archive_override.as_deref()).await;
        let mut attempt = 0u32;

        loop {
            let lock_sql = format!(
                "LOCK TABLES {origin} WRITE, {shadow} WRITE",
                origin = self.helper.quote_table(origin),
                shadow = self.helper.quote_table(shadow),
            );
            match self.helper.execute(&lock_sql, Phase::Switch, origin).await {
                Ok(_) => break,
                Err(LhmError::Driver { table, phase, source }) if is_lock_contention(&source.to_string()) => {
                    if !self.retry.should_retry(attempt) {
                        return Err(LhmError::SwitchRetriesExhausted {
                            table,
                            attempts: attempt,
                            source,
                        });
                    }
                    let delay = self.retry.backoff_ms(attempt);
                    warn!(table = %table, phase = %phase, attempt, delay_ms = delay, "lock acquisition retry");
                    retry_delay(delay, self.cancel.as_ref(), &table).await?;
                    attempt += 1;
                }
                Err(other) => return Err(other),
            }
        }

        let rename_origin_sql = format!(
            "ALTER TABLE {origin} RENAME TO {archive}",
            origin = self.helper.quote_table(origin),
            archive = self.helper.quote_table(&archive),
        );
        if let Err(e) = self.helper.execute(&rename_origin_sql, Phase::Switch, origin).await {
            let _ = self.unlock().await;
            return Err(e);
        }

        let rename_shadow_sql = format!(
            "ALTER TABLE {shadow} RENAME TO {origin}",
            shadow = self.helper.quote_table(shadow),
            origin = self.helper.quote_table(origin),
        );
        if let Err(e) = self.helper.execute(&rename_shadow_sql, Phase::Switch, origin).await {
            // Best-effort restore of the origin's name before surfacing the error.
            let restore_sql = format!(
                "ALTER TABLE {archive} RENAME TO {origin}",
                archive = self.helper.quote_table(&archive),
                origin = self.helper.quote_table(origin),
            );
            if let Err(restore_err) = self.helper.execute(&restore_sql, Phase::Switch, origin).await {
                warn!(table = origin, error = %restore_err, "failed to restore origin name after failed swap");
            }
            let _ = self.unlock().await;
            return Err(e);
        }

        self.unlock().await?;
        info!(table = origin, archive = %archive, attempts = attempt + 1, "locked switch complete");
        Ok(SwitchOutcome {
            archive_name: archive,
            attempts: attempt + 1,
        })
    }

    async fn unlock(&self) -> Result<(), LhmError> {
        self.helper
            .execute("UNLOCK TABLES", Phase::Switch, "<session>")
            .await
            .map(|_| ())
    }
}
