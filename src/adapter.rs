//! The narrow seam between the engine and the database.
//!
//! The engine never speaks the MySQL wire protocol itself. It is generic over
//! [`Adapter`], a small async trait covering exactly the primitives the
//! engine's components need: raw statement execution, a scalar-query
//! primitive (used for `SHOW`/`@@global` reads such as session-timeout
//! tuning), and catalog introspection (tables, columns, primary key).
//!
//! [`SqlxAdapter`] is the reference implementation, a thin wrapper over
//! `sqlx::MySqlPool`. Production callers may supply their own adapter (e.g.
//! one backed by a differently instrumented pool) without any change to the
//! engine's orchestration logic.

use async_trait::async_trait;
use sqlx::{MySqlPool, Row};

use crate::error::{LhmError, Phase};

/// Primary key introspection result: a single integer column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    pub column: String,
}

#[async_trait]
pub trait Adapter: Send + Sync {
    /// Execute a statement with no result rows, returning the affected-row
    /// count where the server reports one (e.g. `INSERT`, `UPDATE RENAME`).
    async fn execute(&self, sql: &str, phase: Phase, table: &str) -> Result<u64, LhmError>;

    /// Run `sql` and return a single integer scalar taken from the first
    /// row's first column, e.g. `SELECT @@global.innodb_lock_wait_timeout`.
    /// Used for the session-timeout reads in [`crate::sql_helper::SqlHelper`]
    /// and is otherwise available to any caller that needs a one-off scalar
    /// read without a dedicated typed method.
    async fn query_scalar_i64(&self, sql: &str, phase: Phase, table: &str) -> Result<i64, LhmError>;

    /// Whether a table of this name exists in the connected schema.
    async fn has_table(&self, table: &str) -> Result<bool, LhmError>;

    /// Ordered column names of a table, in declaration order.
    async fn columns(&self, table: &str) -> Result<Vec<String>, LhmError>;

    /// The table's single-column integer primary key, if it has exactly one.
    async fn primary_key(&self, table: &str) -> Result<Option<PrimaryKey>, LhmError>;

    /// `(min, max)` of the primary key column, or `None` if the table is empty.
    async fn pk_bounds(&self, table: &str, pk_column: &str) -> Result<Option<(i64, i64)>, LhmError>;

    /// Raw server version string, e.g. `"8.0.35"` or `"10.11.4-MariaDB"`.
    async fn server_version(&self) -> Result<String, LhmError>;

    /// Quote a table or column identifier for this dialect.
    fn quote_identifier(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }
}

/// Reference adapter backed by `sqlx::MySqlPool`.
pub struct SqlxAdapter {
    pool: MySqlPool,
}

impl SqlxAdapter {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    fn driver_err(table: &str, phase: Phase, source: sqlx::Error) -> LhmError {
        LhmError::Driver {
            table: table.to_string(),
            phase,
            source: Box::new(source),
        }
    }
}

#[async_trait]
impl Adapter for SqlxAdapter {
    async fn execute(&self, sql: &str, phase: Phase, table: &str) -> Result<u64, LhmError> {
        let result = sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map_err(|e| Self::driver_err(table, phase, e))?;
        Ok(result.rows_affected())
    }

    async fn query_scalar_i64(&self, sql: &str, phase: Phase, table: &str) -> Result<i64, LhmError> {
        let row = sqlx::query(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::driver_err(table, phase, e))?;
        row.try_get::<i64, _>(0)
            .map_err(|e| Self::driver_err(table, phase, e))
    }

    async fn has_table(&self, table: &str) -> Result<bool, LhmError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS c FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = ?",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Self::driver_err(table, Phase::ShadowCreate, e))?;
        let count: i64 = row
            .try_get("c")
            .map_err(|e| Self::driver_err(table, Phase::ShadowCreate, e))?;
        Ok(count > 0)
    }

    async fn columns(&self, table: &str) -> Result<Vec<String>, LhmError> {
        let rows = sqlx::query(
            "SELECT column_name FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = ? \
             ORDER BY ordinal_position",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::driver_err(table, Phase::ShadowCreate, e))?;
        rows.into_iter()
            .map(|r| {
                r.try_get::<String, _>("column_name")
                    .map_err(|e| Self::driver_err(table, Phase::ShadowCreate, e))
            })
            .collect()
    }

    async fn primary_key(&self, table: &str) -> Result<Option<PrimaryKey>, LhmError> {
        let rows = sqlx::query(
            "SELECT k.column_name AS col, c.data_type AS dtype \
             FROM information_schema.key_column_usage k \
             JOIN information_schema.columns c \
               ON c.table_schema = k.table_schema \
              AND c.table_name = k.table_name \
              AND c.column_name = k.column_name \
             WHERE k.table_schema = DATABASE() \
               AND k.table_name = ? \
               AND k.constraint_name = 'PRIMARY' \
             ORDER BY k.ordinal_position",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::driver_err(table, Phase::ShadowCreate, e))?;

        if rows.len() != 1 {
            return Ok(None);
        }
        let col: String = rows[0]
            .try_get("col")
            .map_err(|e| Self::driver_err(table, Phase::ShadowCreate, e))?;
        let dtype: String = rows[0]
            .try_get("dtype")
            .map_err(|e| Self::driver_err(table, Phase::ShadowCreate, e))?;
        let is_integer = matches!(
            dtype.to_ascii_lowercase().as_str(),
            "int" | "bigint" | "smallint" | "mediumint" | "tinyint"
        );
        if !is_integer {
            return Ok(None);
        }
        Ok(Some(PrimaryKey { column: col }))
    }

    async fn pk_bounds(&self, table: &str, pk_column: &str) -> Result<Option<(i64, i64)>, LhmError> {
        let quoted_table = self.quote_identifier(table);
        let quoted_pk = self.quote_identifier(pk_column);
        let sql = format!("SELECT MIN({quoted_pk}) AS lo, MAX({quoted_pk}) AS hi FROM {quoted_table}");
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::driver_err(table, Phase::Chunk, e))?;
        let lo: Option<i64> = row
            .try_get("lo")
            .map_err(|e| Self::driver_err(table, Phase::Chunk, e))?;
        let hi: Option<i64> = row
            .try_get("hi")
            .map_err(|e| Self::driver_err(table, Phase::Chunk, e))?;
        Ok(lo.zip(hi))
    }

    async fn server_version(&self) -> Result<String, LhmError> {
        let row = sqlx::query("SELECT VERSION() AS v")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::driver_err("<server>", Phase::ShadowCreate, e))?;
        row.try_get("v")
            .map_err(|e| Self::driver_err("<server>", Phase::ShadowCreate, e))
    }
}
