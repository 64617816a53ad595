use std::time::Duration;

use crate::config::DataStoreConfig;

/// Retention settings fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Messages dated strictly before `now - max_age` are purged.
    pub max_age: Duration,
    /// Pause after each mailbox during a pass.
    pub inter_item_sleep: Duration,
    /// When false no pass ever runs.
    pub enabled: bool,
    period_secs: i64,
}

impl RetentionPolicy {
    /// Build a policy from a retention window in minutes.
    /// Zero or negative minutes yield a disabled policy.
    pub fn from_minutes(retention_minutes: i64, inter_item_sleep: Duration) -> Self {
        let enabled = retention_minutes > 0;
        let max_age = if enabled {
            Duration::from_secs(retention_minutes.unsigned_abs().saturating_mul(60))
        } else {
            Duration::ZERO
        };

        Self {
            max_age,
            inter_item_sleep,
            enabled,
            period_secs: retention_minutes.saturating_mul(60),
        }
    }

    pub fn disabled() -> Self {
        Self::from_minutes(0, Duration::ZERO)
    }

    /// Configured retention window in seconds, exactly as configured.
    pub fn period_secs(&self) -> i64 {
        self.period_secs
    }
}

impl From<&DataStoreConfig> for RetentionPolicy {
    fn from(config: &DataStoreConfig) -> Self {
        Self::from_minutes(config.retention_minutes, config.retention_sleep())
    }
}
