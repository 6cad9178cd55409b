//! Top-level orchestrator.
//!
//! Wires [`SqlHelper`] over an [`Adapter`], creates the shadow table, hands it
//! to the caller's migration callback, then sequences entangle → chunk →
//! switch. Session lock-wait timeouts are tightened before any mutation so the
//! engine times out on contention before the server's global timeout would,
//! letting the switcher's own retry/backoff handle it instead of surfacing a
//! raw driver error.

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::adapter::Adapter;
use crate::chunker::{Chunker, ChunkerConfig};
use crate::clock::{Clock, SystemClock};
use crate::config::LhmConfig;
use crate::entangler::Entangler;
use crate::error::{LhmError, Phase};
use crate::sql_helper::SqlHelper;
use crate::switcher::{AtomicSwitcher, LockedSwitcher, SwitchOutcome};

/// The caller's migration: given the shadow table's name, mutate its shape.
pub type Migration<'a> =
    Box<dyn FnOnce(String) -> Pin<Box<dyn Future<Output = Result<(), LhmError>> + Send + 'a>> + Send + 'a>;

/// Upper bound on the derived session lock-wait timeout (`min(global - 2,
/// 100)`), guarding against a pathologically large global setting.
const MAX_SESSION_LOCK_WAIT_SECONDS: i64 = 100;

pub struct Invoker<'a, A: Adapter + ?Sized> {
    adapter: &'a A,
    origin: String,
    config: LhmConfig,
    clock: Box<dyn Clock + 'a>,
    cancel: Option<CancellationToken>,
}

impl<'a, A: Adapter + ?Sized> Invoker<'a, A> {
    pub fn new(adapter: &'a A, origin: impl Into<String>, config: LhmConfig) -> Self {
        Self {
            adapter,
            origin: origin.into(),
            config,
            clock: Box::new(SystemClock),
            cancel: None,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'a) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Attach a cooperative cancellation token. If it fires while the
    /// chunker is backfilling or the switcher is waiting out lock
    /// contention, the run aborts with [`LhmError::Cancelled`] at the next
    /// suspension point; the entangler still tears down triggers on the way
    /// out, and the shadow table is left in place for inspection, same as
    /// any other mid-run failure.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Create the shadow table as `CREATE TABLE shadow LIKE origin`. Fails if
    /// a table of that name already exists (I6: at most one in-flight
    /// migration per origin).
    #[instrument(skip(self), fields(origin = %self.origin))]
    pub async fn temporary_table(&self) -> Result<String, LhmError> {
        let shadow = self.config.shadow_name(&self.origin);
        let helper = SqlHelper::new(self.adapter);
        if helper.has_table(&shadow).await? {
            return Err(LhmError::ShadowTableExists(shadow));
        }
        let sql = format!(
            "CREATE TABLE {shadow} LIKE {origin} {annotation}",
            shadow = helper.quote_table(&shadow),
            origin = helper.quote_table(&self.origin),
            annotation = helper.annotation(),
        );
        helper.execute(&sql, Phase::ShadowCreate, &self.origin).await?;
        info!(origin = %self.origin, shadow = %shadow, "shadow table created");
        Ok(shadow)
    }

    /// Read the server's *current* global `innodb_lock_wait_timeout` and
    /// `lock_wait_timeout`, then set each session value to `min(global - 2,
    /// 100)` independently, so the engine times out on a contended lock
    /// before the server's own global timeout would fire — letting the
    /// switcher's retry/backoff loop handle contention instead of it
    /// surfacing as a raw driver error.
    async fn tighten_session_timeouts(&self, helper: &SqlHelper<'_, A>) -> Result<(), LhmError> {
        let (global_innodb, global_generic) = helper.global_lock_wait_timeouts(&self.origin).await?;
        let innodb = (global_innodb - 2).min(MAX_SESSION_LOCK_WAIT_SECONDS);
        let generic = (global_generic - 2).min(MAX_SESSION_LOCK_WAIT_SECONDS);
        let sql = format!("SET SESSION innodb_lock_wait_timeout = {innodb}, SESSION lock_wait_timeout = {generic}");
        helper.execute(&sql, Phase::Entangle, &self.origin).await?;
        Ok(())
    }

    /// Run a full online schema change: create the shadow, hand it to
    /// `migration`, then entangle/chunk/switch. If `config.entangler` is
    /// `false`, runs `migration` directly against the origin and returns,
    /// bypassing the shadow entirely.
    #[instrument(skip(self, migration), fields(origin = %self.origin))]
    pub async fn execute(&self, migration: Migration<'_>) -> Result<Option<SwitchOutcome>, LhmError> {
        let helper = SqlHelper::new(self.adapter);

        if !self.config.entangler {
            migration(self.origin.clone()).await?;
            return Ok(None);
        }

        let atomic = match self.config.atomic_switch {
            Some(true) if !helper.supports_atomic_switch().await? => {
                return Err(LhmError::AtomicSwitchUnsupported);
            }
            Some(explicit) => explicit,
            None => helper.supports_atomic_switch().await?,
        };

        let shadow = self.temporary_table().await?;
        self.tighten_session_timeouts(&helper).await?;

        migration(shadow.clone()).await.map_err(|e| match e {
            LhmError::Driver { table, phase: _, source } => LhmError::Driver {
                table,
                phase: Phase::MigrateCallback,
                source,
            },
            other => other,
        })?;

        let pk = helper.extract_primary_key(&self.origin).await?;
        let entangler = Entangler::new(&helper, &self.origin, &shadow, &pk.column).await?;
        let mut chunker = Chunker::new(
            &helper,
            &self.origin,
            &shadow,
            &pk.column,
            ChunkerConfig {
                stride: self.config.stride,
                throttle: self.config.throttle,
            },
        )
        .await?;
        if let Some(cancel) = &self.cancel {
            chunker = chunker.with_cancellation(cancel.clone());
        }

        let retry_policy = self.config.retry_policy();
        let origin = self.origin.clone();
        let shadow_for_switch = shadow.clone();
        let clock = self.clock.as_ref();
        let cancel = self.cancel.clone();
        let archive_name_override = self.config.archive_name.clone();

        let outcome = entangler
            .run(|| async move {
                chunker.run().await?;
                if atomic {
                    let mut switcher = AtomicSwitcher::new(&helper, clock, retry_policy);
                    if let Some(cancel) = cancel {
                        switcher = switcher.with_cancellation(cancel);
                    }
                    if let Some(name) = archive_name_override {
                        switcher = switcher.with_archive_name(name);
                    }
                    switcher.run(&origin, &shadow_for_switch).await
                } else {
                    let mut switcher = LockedSwitcher::new(&helper, clock, retry_policy);
                    if let Some(cancel) = cancel {
                        switcher = switcher.with_cancellation(cancel);
                    }
                    if let Some(name) = archive_name_override {
                        switcher = switcher.with_archive_name(name);
                    }
                    switcher.run(&origin, &shadow_for_switch).await
                }
            })
            .await?;

        Ok(Some(outcome))
    }
}
