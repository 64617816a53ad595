//! Process-wide retention statistics.
//!
//! [`ScanStats`] is created once during startup and shared by `Arc` between
//! the scanner task (the only writer) and any number of readers such as the
//! `/debug/vars` exporter. The completion timestamp sits behind a
//! reader/writer lock held only long enough to copy the value; the delete
//! counter is a plain atomic.

use std::{
    collections::VecDeque,
    sync::{
        RwLock,
        atomic::{AtomicU8, AtomicU64, Ordering},
    },
};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::RetentionPolicy;
use crate::observability::metrics;

/// Capacity reserved for the delete history series.
const DELETES_HISTORY_LEN: usize = 60;

/// Lifecycle state of the retention scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ScannerState {
    /// Retention is turned off. Terminal.
    Disabled = 0,
    /// Waiting for the governor before the next pass.
    Idle = 1,
    /// A pass is in progress.
    Scanning = 2,
}

impl ScannerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ScannerState::Disabled,
            2 => ScannerState::Scanning,
            _ => ScannerState::Idle,
        }
    }
}

/// Shared registry of retention scan statistics.
#[derive(Debug)]
pub struct ScanStats {
    last_completion: RwLock<DateTime<Utc>>,
    deletes_total: AtomicU64,
    // Reserved for a series of recent per-pass delete counts. Nothing appends
    // to it yet, so it always renders as an empty string.
    deletes_history: RwLock<VecDeque<u64>>,
    period_secs: i64,
    state: AtomicU8,
}

impl ScanStats {
    /// Create the registry for a given policy.
    ///
    /// The completion time starts at the Unix epoch, so monitors see a very
    /// large `SecondsSinceScanCompleted` until the first pass completes.
    pub fn new(policy: &RetentionPolicy) -> Self {
        let state = if policy.enabled {
            ScannerState::Idle
        } else {
            ScannerState::Disabled
        };

        Self {
            last_completion: RwLock::new(DateTime::<Utc>::UNIX_EPOCH),
            deletes_total: AtomicU64::new(0),
            deletes_history: RwLock::new(VecDeque::with_capacity(DELETES_HISTORY_LEN)),
            period_secs: policy.period_secs(),
            state: AtomicU8::new(state as u8),
        }
    }

    /// Record the end of a fully enumerated pass.
    ///
    /// The stored time never moves backwards.
    pub fn record_completion(&self, at: DateTime<Utc>) {
        let mut last = self.last_completion.write().expect("RwLock poisoned");
        if at > *last {
            *last = at;
        }
    }

    /// Time the last complete pass finished.
    pub fn completion_time(&self) -> DateTime<Utc> {
        *self.last_completion.read().expect("RwLock poisoned")
    }

    /// Whether any pass has completed since startup.
    pub fn has_completed(&self) -> bool {
        self.completion_time() > DateTime::<Utc>::UNIX_EPOCH
    }

    /// Whole seconds elapsed since the last complete pass.
    pub fn seconds_since_completion(&self) -> i64 {
        (Utc::now() - self.completion_time()).num_seconds()
    }

    /// Count one successfully deleted message.
    pub fn increment_deletes(&self) {
        self.deletes_total.fetch_add(1, Ordering::Relaxed);
        metrics::record_retention_delete();
    }

    pub fn deletes_total(&self) -> u64 {
        self.deletes_total.load(Ordering::Relaxed)
    }

    /// Delete history rendered as a comma-delimited string.
    pub fn deletes_history(&self) -> String {
        let history = self.deletes_history.read().expect("RwLock poisoned");
        history
            .iter()
            .map(|count| count.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Retention window in seconds as configured.
    pub fn period_secs(&self) -> i64 {
        self.period_secs
    }

    pub fn state(&self) -> ScannerState {
        ScannerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move the scanner to a new state. `Disabled` is never left.
    pub(crate) fn set_state(&self, next: ScannerState) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != ScannerState::Disabled as u8).then_some(next as u8)
            });
    }

    /// Consistent view for the stats exporter.
    pub fn snapshot(&self) -> RetentionSnapshot {
        RetentionSnapshot {
            seconds_since_scan_completed: self.seconds_since_completion(),
            deletes_hist: self.deletes_history(),
            deletes_total: self.deletes_total(),
            period: self.period_secs,
            state: self.state(),
        }
    }
}

/// The `"retention"` stats group as published to monitoring.
///
/// Field names are part of the monitoring contract.
#[derive(Debug, Clone, Serialize)]
pub struct RetentionSnapshot {
    #[serde(rename = "SecondsSinceScanCompleted")]
    pub seconds_since_scan_completed: i64,
    #[serde(rename = "DeletesHist")]
    pub deletes_hist: String,
    #[serde(rename = "DeletesTotal")]
    pub deletes_total: u64,
    #[serde(rename = "Period")]
    pub period: i64,
    #[serde(rename = "State")]
    pub state: ScannerState,
}
