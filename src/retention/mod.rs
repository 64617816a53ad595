//! Message retention for the mail store.
//!
//! This module provides a background scanner that periodically:
//! 1. Lists every mailbox in the store
//! 2. Deletes messages older than the configured retention window
//! 3. Records progress in a shared [`ScanStats`] registry for monitoring
//!
//! Passes are spaced at least one minute apart and pause after each mailbox
//! to limit load on the store. A failed listing aborts only the current pass;
//! a failed delete is logged and skipped.

mod executor;
mod policy;
mod scheduler;
mod stats;

pub use executor::{ScanPass, run_pass};
pub use policy::RetentionPolicy;
pub use scheduler::{GOVERNOR_INTERVAL, start_retention_scanner};
pub use stats::{RetentionSnapshot, ScanStats, ScannerState};

use crate::store::StoreError;

/// Errors that abort a retention pass.
#[derive(Debug, thiserror::Error)]
pub enum RetentionError {
    #[error("Failed to list mailboxes: {0}")]
    ListMailboxes(#[source] StoreError),

    #[error("Failed to list messages in mailbox {mailbox}: {source}")]
    ListMessages {
        mailbox: String,
        #[source]
        source: StoreError,
    },
}
