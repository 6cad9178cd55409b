//! Dialect detection and identifier quoting.
//!
//! Wraps an [`Adapter`] with the server-circumstance checks the rest of the
//! engine needs: whether the connected server is MariaDB, whether it supports
//! the atomic multi-table `RENAME` pattern, and consistent quoting for
//! engine-generated SQL. Circumstances are probed once per helper instance and
//! cached, mirroring how a real connector avoids re-querying `VERSION()` on
//! every call.

use std::sync::OnceLock;

use crate::adapter::{Adapter, PrimaryKey};
use crate::error::{LhmError, Phase};

/// Fixed SQL comment injected into every engine-issued statement, so engine
/// traffic is identifiable in slow query logs and `SHOW PROCESSLIST`.
pub const ANNOTATION: &str = "/* lhm */";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Circumstances {
    pub is_mariadb: bool,
    pub supports_atomic_switch: bool,
}

pub struct SqlHelper<'a, A: Adapter + ?Sized> {
    adapter: &'a A,
    version: OnceLock<String>,
    circumstances: OnceLock<Circumstances>,
}

impl<'a, A: Adapter + ?Sized> SqlHelper<'a, A> {
    pub fn new(adapter: &'a A) -> Self {
        Self {
            adapter,
            version: OnceLock::new(),
            circumstances: OnceLock::new(),
        }
    }

    pub fn annotation(&self) -> &'static str {
        ANNOTATION
    }

    pub async fn version_string(&self) -> Result<&str, LhmError> {
        if let Some(v) = self.version.get() {
            return Ok(v.as_str());
        }
        let v = self.adapter.server_version().await?;
        Ok(self.version.get_or_init(|| v))
    }

    /// Probe and cache dialect circumstances. Idempotent: subsequent calls
    /// reuse the cached result rather than re-querying `VERSION()`.
    pub async fn circumstances(&self) -> Result<Circumstances, LhmError> {
        if let Some(c) = self.circumstances.get() {
            return Ok(*c);
        }
        let version = self.version_string().await?;
        let is_mariadb = version.to_ascii_lowercase().contains("mariadb");
        // MySQL and modern MariaDB both support the atomic multi-table RENAME
        // pattern this engine relies on for cutover; the only servers known
        // to lack it are pre-5.0 MySQL builds outside this engine's support
        // window, so absent a specific incompatibility this defaults true.
        let supports_atomic_switch = true;
        let circumstances = Circumstances {
            is_mariadb,
            supports_atomic_switch,
        };
        Ok(*self.circumstances.get_or_init(|| circumstances))
    }

    pub async fn supports_atomic_switch(&self) -> Result<bool, LhmError> {
        Ok(self.circumstances().await?.supports_atomic_switch)
    }

    pub async fn is_mariadb(&self) -> Result<bool, LhmError> {
        Ok(self.circumstances().await?.is_mariadb)
    }

    pub fn quote_table(&self, name: &str) -> String {
        self.adapter.quote_identifier(name)
    }

    pub fn quote_column(&self, name: &str) -> String {
        self.adapter.quote_identifier(name)
    }

    pub async fn extract_primary_key(&self, table: &str) -> Result<PrimaryKey, LhmError> {
        self.adapter
            .primary_key(table)
            .await?
            .ok_or_else(|| LhmError::NoIntegerPrimaryKey {
                table: table.to_string(),
            })
    }

    pub async fn columns(&self, table: &str) -> Result<Vec<String>, LhmError> {
        self.adapter.columns(table).await
    }

    pub async fn has_table(&self, table: &str) -> Result<bool, LhmError> {
        self.adapter.has_table(table).await
    }

    /// Read the server's current global `innodb_lock_wait_timeout` and
    /// `lock_wait_timeout`, in seconds.
    pub async fn global_lock_wait_timeouts(&self, table: &str) -> Result<(i64, i64), LhmError> {
        let innodb = self
            .adapter
            .query_scalar_i64(
                "SELECT @@global.innodb_lock_wait_timeout",
                Phase::Entangle,
                table,
            )
            .await?;
        let generic = self
            .adapter
            .query_scalar_i64("SELECT @@global.lock_wait_timeout", Phase::Entangle, table)
            .await?;
        Ok((innodb, generic))
    }

    pub async fn execute(&self, sql: &str, phase: Phase, table: &str) -> Result<u64, LhmError> {
        self.adapter.execute(sql, phase, table).await
    }

    pub fn adapter(&self) -> &A {
        self.adapter
    }
}
