//! The column intersection: the copy projection shared by the entangler and
//! the chunker.
//!
//! Frozen once at construction time, in the origin's declared column order.
//! Columns that exist only in the origin are dropped from the copy; columns
//! that exist only in the shadow are left to their defaults (or to whatever
//! the migration callback populated them with directly).

/// Ordered list of column names present in both `origin` and `shadow`,
/// preserving `origin`'s order.
pub fn intersect(origin_columns: &[String], shadow_columns: &[String]) -> Vec<String> {
    origin_columns
        .iter()
        .filter(|c| shadow_columns.contains(c))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn preserves_origin_order() {
        let origin = v(&["id", "name", "deprecated", "created_at"]);
        let shadow = v(&["created_at", "id", "name", "email"]);
        assert_eq!(
            intersect(&origin, &shadow),
            v(&["id", "name", "created_at"])
        );
    }

    #[test]
    fn dropped_column_excluded() {
        let origin = v(&["id", "name", "deprecated"]);
        let shadow = v(&["id", "name"]);
        assert_eq!(intersect(&origin, &shadow), v(&["id", "name"]));
    }

    #[test]
    fn added_column_not_in_intersection() {
        let origin = v(&["id", "name"]);
        let shadow = v(&["id", "name", "email"]);
        assert_eq!(intersect(&origin, &shadow), v(&["id", "name"]));
    }

    #[test]
    fn empty_origin_yields_empty_intersection() {
        let origin: Vec<String> = vec![];
        let shadow = v(&["id"]);
        assert!(intersect(&origin, &shadow).is_empty());
    }
}
