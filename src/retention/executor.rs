//! A single retention pass over the whole mail store.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use super::{RetentionError, ScanStats};
use crate::store::DataStore;

/// Outcome of one completed pass.
#[derive(Debug, Clone, Serialize)]
pub struct ScanPass {
    /// Messages dated before this instant were considered expired.
    pub cutoff: DateTime<Utc>,
    /// Mailboxes whose messages were listed.
    pub mailboxes_visited: u64,
    /// Expired messages encountered.
    pub expired_found: u64,
    /// Expired messages successfully deleted.
    pub deletes_succeeded: u64,
    /// Expired messages whose deletion failed and were skipped.
    pub deletes_failed: u64,
}

impl ScanPass {
    fn new(cutoff: DateTime<Utc>) -> Self {
        Self {
            cutoff,
            mailboxes_visited: 0,
            expired_found: 0,
            deletes_succeeded: 0,
            deletes_failed: 0,
        }
    }

    /// Check if any messages were deleted.
    pub fn has_deletions(&self) -> bool {
        self.deletes_succeeded > 0
    }
}

/// Compute the expiry cutoff for `max_age` relative to `now`.
pub(crate) fn cutoff_for(now: DateTime<Utc>, max_age: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(max_age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Run one pass over every mailbox, purging messages older than `max_age`.
///
/// Listing failures abort the pass and leave the completion time untouched.
/// A failed delete is logged and skipped. After each mailbox the pass sleeps
/// for `inter_item_sleep`. The completion time is recorded only when every
/// mailbox was listed successfully.
pub async fn run_pass(
    store: &dyn DataStore,
    max_age: Duration,
    inter_item_sleep: Duration,
    stats: &ScanStats,
) -> Result<ScanPass, RetentionError> {
    tracing::trace!("Starting retention scan");

    let mut pass = ScanPass::new(cutoff_for(Utc::now(), max_age));

    let mailboxes = store
        .all_mailboxes()
        .await
        .map_err(RetentionError::ListMailboxes)?;

    for mailbox in mailboxes {
        let messages = mailbox
            .messages()
            .await
            .map_err(|source| RetentionError::ListMessages {
                mailbox: mailbox.name().to_string(),
                source,
            })?;
        pass.mailboxes_visited += 1;

        for message in messages {
            if message.date() >= pass.cutoff {
                continue;
            }
            pass.expired_found += 1;

            tracing::trace!(
                mailbox = mailbox.name(),
                message_id = message.id(),
                "Purging expired message"
            );
            match message.delete().await {
                Ok(()) => {
                    pass.deletes_succeeded += 1;
                    stats.increment_deletes();
                }
                Err(e) => {
                    pass.deletes_failed += 1;
                    tracing::error!(
                        mailbox = mailbox.name(),
                        message_id = message.id(),
                        error = %e,
                        "Failed to purge message"
                    );
                }
            }
        }

        if !inter_item_sleep.is_zero() {
            tokio::time::sleep(inter_item_sleep).await;
        }
    }

    stats.record_completion(Utc::now());

    Ok(pass)
}
