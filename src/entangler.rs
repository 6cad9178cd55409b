//! Installs and guarantees removal of the triggers that mirror origin writes
//! into the shadow table while a migration runs.
//!
//! Three `AFTER` triggers are installed on the origin: `INSERT` and `UPDATE`
//! both `REPLACE INTO` the shadow (so a concurrent write always wins over a
//! backfilling chunk reading stale origin data), and `DELETE` does a
//! `DELETE IGNORE` against the shadow (tolerating a row the chunker hasn't
//! copied yet). Trigger names are deterministic per origin table, so a prior
//! failed run's triggers are replaced rather than erroring on create.

use tracing::{info, warn};

use crate::adapter::Adapter;
use crate::error::{LhmError, Phase};
use crate::intersection::intersect;
use crate::sql_helper::SqlHelper;

fn trigger_name(kind: &str, origin: &str) -> String {
    format!("lhmt_{kind}_{origin}")
}

pub struct Entangler<'a, A: Adapter + ?Sized> {
    helper: &'a SqlHelper<'a, A>,
    origin: String,
    shadow: String,
    pk_column: String,
    columns: Vec<String>,
}

impl<'a, A: Adapter + ?Sized> Entangler<'a, A> {
    /// Build an entangler over the frozen column intersection of `origin`
    /// and `shadow`.
    pub async fn new(
        helper: &'a SqlHelper<'a, A>,
        origin: &str,
        shadow: &str,
        pk_column: &str,
    ) -> Result<Entangler<'a, A>, LhmError> {
        let origin_columns = helper.columns(origin).await?;
        let shadow_columns = helper.columns(shadow).await?;
        let columns = intersect(&origin_columns, &shadow_columns);
        Ok(Entangler {
            helper,
            origin: origin.to_string(),
            shadow: shadow.to_string(),
            pk_column: pk_column.to_string(),
            columns,
        })
    }

    fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| self.helper.quote_column(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn new_value_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| format!("NEW.{}", self.helper.quote_column(c)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn insert_trigger_sql(&self) -> String {
        let name = trigger_name("ins", &self.origin);
        format!(
            "CREATE TRIGGER {name} AFTER INSERT ON {origin} FOR EACH ROW \
             {annotation} REPLACE INTO {shadow} ({cols}) VALUES ({vals})",
            name = self.helper.quote_table(&name),
            origin = self.helper.quote_table(&self.origin),
            annotation = self.helper.annotation(),
            shadow = self.helper.quote_table(&self.shadow),
            cols = self.column_list(),
            vals = self.new_value_list(),
        )
    }

    fn update_trigger_sql(&self) -> String {
        let name = trigger_name("upd", &self.origin);
        format!(
            "CREATE TRIGGER {name} AFTER UPDATE ON {origin} FOR EACH ROW \
             {annotation} REPLACE INTO {shadow} ({cols}) VALUES ({vals})",
            name = self.helper.quote_table(&name),
            origin = self.helper.quote_table(&self.origin),
            annotation = self.helper.annotation(),
            shadow = self.helper.quote_table(&self.shadow),
            cols = self.column_list(),
            vals = self.new_value_list(),
        )
    }

    fn delete_trigger_sql(&self) -> String {
        let name = trigger_name("del", &self.origin);
        format!(
            "CREATE TRIGGER {name} AFTER DELETE ON {origin} FOR EACH ROW \
             {annotation} DELETE IGNORE FROM {shadow} WHERE {pk} = OLD.{pk}",
            name = self.helper.quote_table(&name),
            origin = self.helper.quote_table(&self.origin),
            annotation = self.helper.annotation(),
            shadow = self.helper.quote_table(&self.shadow),
            pk = self.helper.quote_column(&self.pk_column),
        )
    }

    fn trigger_names(&self) -> [String; 3] {
        [
            trigger_name("ins", &self.origin),
            trigger_name("upd", &self.origin),
            trigger_name("del", &self.origin),
        ]
    }

    async fn drop_trigger(&self, name: &str) -> Result<(), LhmError> {
        let sql = format!("DROP TRIGGER IF EXISTS {}", self.helper.quote_table(name));
        self.helper
            .execute(&sql, Phase::Entangle, &self.origin)
            .await
            .map(|_| ())
    }

    async fn install(&self) -> Result<(), LhmError> {
        for name in self.trigger_names() {
            self.drop_trigger(&name).await.map_err(|e| to_mirroring(e, &name, "teardown-before-install"))?;
        }
        for (name, sql) in [
            (trigger_name("ins", &self.origin), self.insert_trigger_sql()),
            (trigger_name("upd", &self.origin), self.update_trigger_sql()),
            (trigger_name("del", &self.origin), self.delete_trigger_sql()),
        ] {
            self.helper
                .execute(&sql, Phase::Entangle, &self.origin)
                .await
                .map_err(|e| to_mirroring(e, &name, "install"))?;
            info!(table = %self.origin, trigger = %name, "installed mirroring trigger");
        }
        Ok(())
    }

    async fn teardown(&self) {
        for name in self.trigger_names() {
            if let Err(e) = self.drop_trigger(&name).await {
                warn!(table = %self.origin, trigger = %name, error = %e, "trigger teardown failed");
            } else {
                info!(table = %self.origin, trigger = %name, "removed mirroring trigger");
            }
        }
    }

    /// Install triggers, run `inner`, and guarantee teardown regardless of
    /// `inner`'s outcome. A teardown failure is logged but never masks the
    /// inner result; an install failure aborts before `inner` runs and before
    /// any teardown of triggers that were never installed.
    pub async fn run<F, Fut, T>(&self, inner: F) -> Result<T, LhmError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, LhmError>>,
    {
        self.install().await?;
        let result = inner().await;
        self.teardown().await;
        result
    }
}

fn to_mirroring(e: LhmError, name: &str, action: &'static str) -> LhmError {
    match e {
        LhmError::Driver { table, phase, source } => LhmError::Mirroring {
            table,
            name: name.to_string(),
            action,
            phase,
            source,
        },
        other => other,
    }
}
