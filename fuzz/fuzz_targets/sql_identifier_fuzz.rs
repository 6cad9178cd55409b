#![no_main]

use libfuzzer_sys::fuzz_target;

/// Stand-in adapter used only to exercise the default `quote_identifier`
/// implementation; none of its other methods are reachable from this target.
struct NullAdapter;

#[async_trait::async_trait]
impl lhm::adapter::Adapter for NullAdapter {
    async fn execute(
        &self,
        _sql: &str,
        _phase: lhm::error::Phase,
        _table: &str,
    ) -> Result<u64, lhm::error::LhmError> {
        unreachable!()
    }
    async fn query_scalar_i64(
        &self,
        _sql: &str,
        _phase: lhm::error::Phase,
        _table: &str,
    ) -> Result<i64, lhm::error::LhmError> {
        unreachable!()
    }
    async fn has_table(&self, _table: &str) -> Result<bool, lhm::error::LhmError> {
        unreachable!()
    }
    async fn columns(&self, _table: &str) -> Result<Vec<String>, lhm::error::LhmError> {
        unreachable!()
    }
    async fn primary_key(
        &self,
        _table: &str,
    ) -> Result<Option<lhm::adapter::PrimaryKey>, lhm::error::LhmError> {
        unreachable!()
    }
    async fn pk_bounds(
        &self,
        _table: &str,
        _pk_column: &str,
    ) -> Result<Option<(i64, i64)>, lhm::error::LhmError> {
        unreachable!()
    }
    async fn server_version(&self) -> Result<String, lhm::error::LhmError> {
        unreachable!()
    }
}

// Every table/column name the engine ever quotes ultimately comes from
// `information_schema` introspection or a caller-supplied origin name, never
// from the request body of an application. Still, `quote_identifier` must
// never panic on arbitrary bytes, and its output must always be wrapped in a
// single matched pair of backticks with any embedded backtick doubled.
fuzz_target!(|data: &[u8]| {
    let Ok(ident) = std::str::from_utf8(data) else {
        return;
    };
    let adapter = NullAdapter;
    let quoted = lhm::adapter::Adapter::quote_identifier(&adapter, ident);
    assert!(quoted.starts_with('`'));
    assert!(quoted.ends_with('`'));
    let inner = &quoted[1..quoted.len() - 1];
    assert_eq!(inner.matches('`').count(), ident.matches('`').count() * 2);
});
