//! Run configuration.
//!
//! Every field has a default matching the large-hadron-migrator lineage this
//! engine is part of. [`LhmConfig::validate`] is called by [`LhmConfig::build`]
//! so a caller gets a precondition error at construction time rather than a
//! confusing failure partway through a run.

use std::time::Duration;

use crate::error::LhmError;

#[derive(Debug, Clone)]
pub struct LhmConfig {
    /// Maximum rows copied per backfill chunk.
    pub stride: i64,
    /// Sleep between backfill chunks, to yield load to application traffic.
    pub throttle: Duration,
    /// Force a specific cutover strategy; `None` auto-detects from the
    /// server's reported capabilities.
    pub atomic_switch: Option<bool>,
    /// Initial backoff between cutover retries under lock contention.
    pub retry_sleep_time: Duration,
    /// Maximum cutover retry attempts before giving up.
    pub max_retries: u32,
    /// Suffix appended to the origin's name to derive the shadow table name.
    pub temporary_table_suffix: String,
    /// Fixed name to give the archived origin after cutover. `None` derives
    /// the default timestamped `lhma_<ts>_<origin>` name from the run's
    /// clock at switch time.
    pub archive_name: Option<String>,
    /// Whether to entangle triggers at all. `false` runs the migration
    /// callback directly against the origin, bypassing the shadow/chunk/
    /// switch machinery entirely — useful for changes that don't need an
    /// online rewrite (e.g. adding a nullable column InnoDB can do in place).
    pub entangler: bool,
}

impl Default for LhmConfig {
    fn default() -> Self {
        Self {
            stride: 2_000,
            throttle: Duration::from_millis(100),
            atomic_switch: None,
            retry_sleep_time: Duration::from_millis(10),
            max_retries: 600,
            temporary_table_suffix: "_new".to_string(),
            archive_name: None,
            entangler: true,
        }
    }
}

impl LhmConfig {
    /// Validate and return a config, rejecting (not clamping) out-of-range
    /// values so misconfiguration surfaces immediately.
    pub fn build(self) -> Result<Self, LhmError> {
        if self.stride < 1 {
            return Err(LhmError::InvalidConfig(format!(
                "stride must be >= 1, got {}",
                self.stride
            )));
        }
        if self.temporary_table_suffix.is_empty() {
            return Err(LhmError::InvalidConfig(
                "temporary_table_suffix must not be empty".to_string(),
            ));
        }
        if self.archive_name.as_deref() == Some("") {
            return Err(LhmError::InvalidConfig(
                "archive_name must not be empty when set".to_string(),
            ));
        }
        Ok(self)
    }

    pub fn retry_policy(&self) -> crate::error::RetryPolicy {
        crate::error::RetryPolicy {
            base_delay_ms: self.retry_sleep_time.as_millis() as u64,
            max_attempts: self.max_retries,
        }
    }

    pub fn shadow_name(&self, origin: &str) -> String {
        format!("{origin}{}", self.temporary_table_suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(LhmConfig::default().build().is_ok());
    }

    #[test]
    fn rejects_zero_stride() {
        let cfg = LhmConfig {
            stride: 0,
            ..Default::default()
        };
        assert!(cfg.build().is_err());
    }

    #[test]
    fn rejects_empty_suffix() {
        let cfg = LhmConfig {
            temporary_table_suffix: String::new(),
            ..Default::default()
        };
        assert!(cfg.build().is_err());
    }

    #[test]
    fn rejects_empty_archive_name_override() {
        let cfg = LhmConfig {
            archive_name: Some(String::new()),
            ..Default::default()
        };
        assert!(cfg.build().is_err());
    }

    #[test]
    fn accepts_explicit_archive_name_override() {
        let cfg = LhmConfig {
            archive_name: Some("users_archived".to_string()),
            ..Default::default()
        };
        assert!(cfg.build().is_ok());
    }

    #[test]
    fn shadow_name_uses_suffix() {
        let cfg = LhmConfig::default();
        assert_eq!(cfg.shadow_name("users"), "users_new");
    }
}
