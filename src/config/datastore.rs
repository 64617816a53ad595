//! Mail store and retention configuration.
//!
//! # Example
//!
//! ```toml
//! [datastore]
//! path = "/var/spool/mailsweep"
//! retention_minutes = 240
//! retention_sleep_ms = 100
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Mail store configuration, including the retention window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataStoreConfig {
    /// Root directory of the mail store.
    /// Default: "./mail"
    #[serde(default = "default_path")]
    pub path: PathBuf,

    /// Messages older than this many minutes are purged.
    /// Zero or negative disables the retention scanner.
    /// Default: 0 (disabled)
    #[serde(default)]
    pub retention_minutes: i64,

    /// Pause after each mailbox during a scan, in milliseconds.
    /// Limits the load the scanner puts on the store.
    /// Default: 100
    #[serde(default = "default_retention_sleep_ms")]
    pub retention_sleep_ms: u64,
}

impl Default for DataStoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            retention_minutes: 0,
            retention_sleep_ms: default_retention_sleep_ms(),
        }
    }
}

fn default_path() -> PathBuf {
    PathBuf::from("./mail")
}

fn default_retention_sleep_ms() -> u64 {
    100
}

impl DataStoreConfig {
    /// Whether the retention scanner should run.
    pub fn retention_enabled(&self) -> bool {
        self.retention_minutes > 0
    }

    /// Pause between mailboxes as a Duration.
    pub fn retention_sleep(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.retention_sleep_ms)
    }
}
