//! Property-based tests for chunk-range partitioning (P4: ranges cover
//! `[min_pk, max_pk]` with no gap and no overlap) and identifier quoting.

use lhm::adapter::{Adapter, SqlxAdapter};
use lhm::chunker::Chunker;
use proptest::prelude::*;

proptest! {
    #[test]
    fn ranges_partition_the_full_span_without_gap_or_overlap(
        start in 0i64..1_000_000,
        span in 0i64..50_000,
        stride in 1i64..5_000,
    ) {
        let end = start + span;
        let ranges = Chunker::<SqlxAdapter>::plan_ranges(start, end, stride);

        if ranges.is_empty() {
            prop_assert!(start > end);
        } else {
            prop_assert_eq!(ranges[0].0, start);
            prop_assert_eq!(ranges.last().unwrap().1, end);
            for (lo, hi) in &ranges {
                prop_assert!(lo <= hi);
                prop_assert!(hi - lo + 1 <= stride);
            }
            for pair in ranges.windows(2) {
                prop_assert_eq!(pair[1].0, pair[0].1 + 1, "gap or overlap between chunks");
            }
        }
    }

    #[test]
    fn quoting_always_wraps_in_backticks_and_escapes_embedded_backticks(
        ident in "[a-zA-Z0-9_`]{1,32}",
    ) {
        let adapter = DummyAdapter;
        let quoted = adapter.quote_identifier(&ident);
        prop_assert!(quoted.starts_with('`') && quoted.ends_with('`'));
        prop_assert!(!quoted[1..quoted.len() - 1].contains("`") || ident.contains('`'));
    }
}

/// Minimal adapter used only to exercise the default `quote_identifier` impl
/// without a live database connection.
struct DummyAdapter;

#[async_trait::async_trait]
impl Adapter for DummyAdapter {
    async fn execute(
        &self,
        _sql: &str,
        _phase: lhm::error::Phase,
        _table: &str,
    ) -> Result<u64, lhm::error::LhmError> {
        unimplemented!("not exercised by the quoting property test")
    }
    async fn query_scalar_i64(
        &self,
        _sql: &str,
        _phase: lhm::error::Phase,
        _table: &str,
    ) -> Result<i64, lhm::error::LhmError> {
        unimplemented!()
    }
    async fn has_table(&self, _table: &str) -> Result<bool, lhm::error::LhmError> {
        unimplemented!()
    }
    async fn columns(&self, _table: &str) -> Result<Vec<String>, lhm::error::LhmError> {
        unimplemented!()
    }
    async fn primary_key(
        &self,
        _table: &str,
    ) -> Result<Option<lhm::adapter::PrimaryKey>, lhm::error::LhmError> {
        unimplemented!()
    }
    async fn pk_bounds(
        &self,
        _table: &str,
        _pk_column: &str,
    ) -> Result<Option<(i64, i64)>, lhm::error::LhmError> {
        unimplemented!()
    }
    async fn server_version(&self) -> Result<String, lhm::error::LhmError> {
        unimplemented!()
    }
}
