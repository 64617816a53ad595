//! Background task that drives retention passes.
//!
//! At most one scanner task exists per process. It waits for the governor,
//! runs a pass, and repeats until the shutdown token is cancelled. Passes
//! never overlap because the loop awaits each one before the next tick.

use std::{sync::Arc, time::Instant};

use tokio::{
    task::JoinHandle,
    time::{Duration, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::{RetentionPolicy, ScanStats, ScannerState, executor::run_pass};
use crate::{observability::metrics, store::DataStore};

/// Minimum spacing between the starts of two consecutive passes.
pub const GOVERNOR_INTERVAL: Duration = Duration::from_secs(60);

/// Start the retention scanner if the policy enables it.
///
/// Returns immediately. When retention is disabled nothing is spawned, the
/// store is never touched, and `None` is returned. Otherwise a single task is
/// spawned whose first pass begins one governor interval from now.
pub fn start_retention_scanner(
    store: Arc<dyn DataStore>,
    policy: RetentionPolicy,
    stats: Arc<ScanStats>,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    if !policy.enabled {
        tracing::info!("Retention scanner disabled");
        stats.set_state(ScannerState::Disabled);
        return None;
    }

    tracing::info!(
        retention_minutes = policy.max_age.as_secs() / 60,
        inter_item_sleep_ms = policy.inter_item_sleep.as_millis() as u64,
        "Retention configured for {} minutes",
        policy.max_age.as_secs() / 60
    );

    Some(tokio::spawn(run_scanner(store, policy, stats, shutdown)))
}

async fn run_scanner(
    store: Arc<dyn DataStore>,
    policy: RetentionPolicy,
    stats: Arc<ScanStats>,
    shutdown: CancellationToken,
) {
    // A pass that overruns the interval is followed immediately by the next
    // one, and spacing is then measured from that pass's start.
    let mut governor = tokio::time::interval_at(
        tokio::time::Instant::now() + GOVERNOR_INTERVAL,
        GOVERNOR_INTERVAL,
    );
    governor.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tracing::trace!("Retention scanner waiting for governor");
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            _ = governor.tick() => {}
        }

        stats.set_state(ScannerState::Scanning);
        let started = Instant::now();

        let outcome = tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                tracing::info!("Retention scan interrupted by shutdown");
                stats.set_state(ScannerState::Idle);
                break;
            }
            outcome = run_pass(
                store.as_ref(),
                policy.max_age,
                policy.inter_item_sleep,
                &stats,
            ) => outcome,
        };

        stats.set_state(ScannerState::Idle);
        let elapsed = started.elapsed();

        match outcome {
            Ok(pass) => {
                metrics::record_retention_pass("success", elapsed.as_secs_f64());
                if pass.has_deletions() || pass.deletes_failed > 0 {
                    tracing::info!(
                        mailboxes = pass.mailboxes_visited,
                        deleted = pass.deletes_succeeded,
                        failed = pass.deletes_failed,
                        duration_ms = elapsed.as_millis() as u64,
                        "Retention scan complete"
                    );
                } else {
                    tracing::debug!(
                        mailboxes = pass.mailboxes_visited,
                        duration_ms = elapsed.as_millis() as u64,
                        "Retention scan complete, nothing to purge"
                    );
                }
            }
            Err(e) => {
                metrics::record_retention_pass("error", elapsed.as_secs_f64());
                tracing::error!(error = %e, "Error during retention scan");
            }
        }
    }

    tracing::info!("Retention scanner stopped");
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::store::{MemoryDataStore, MemoryFailureMode};

    fn policy(inter_item_sleep: Duration) -> RetentionPolicy {
        RetentionPolicy::from_minutes(60, inter_item_sleep)
    }

    fn start(
        store: &MemoryDataStore,
        policy: RetentionPolicy,
    ) -> (Arc<ScanStats>, CancellationToken, Option<JoinHandle<()>>) {
        let stats = Arc::new(ScanStats::new(&policy));
        let token = CancellationToken::new();
        let handle = start_retention_scanner(
            Arc::new(store.clone()),
            policy,
            Arc::clone(&stats),
            token.clone(),
        );
        (stats, token, handle)
    }

    async fn sleep_secs(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_policy_never_scans() {
        let store = MemoryDataStore::new();
        store.add_message("m", "old", Utc::now() - chrono::Duration::days(365));

        let (stats, _token, handle) = start(&store, RetentionPolicy::disabled());
        assert!(handle.is_none());
        assert_eq!(stats.state(), ScannerState::Disabled);

        sleep_secs(600).await;
        assert_eq!(store.mailbox_list_calls(), 0);
        assert_eq!(store.message_count(), 1);
        assert_eq!(stats.state(), ScannerState::Disabled);
    }

    #[tokio::test]
    async fn test_disabled_policy_accepts_unopened_dir_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = crate::store::DirDataStore::new(dir.path().join("missing"));
        let stats = Arc::new(ScanStats::new(&RetentionPolicy::disabled()));

        let handle = start_retention_scanner(
            Arc::new(store),
            RetentionPolicy::disabled(),
            Arc::clone(&stats),
            CancellationToken::new(),
        );
        assert!(handle.is_none());
        assert_eq!(stats.state(), ScannerState::Disabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_governor_spaces_passes_one_minute_apart() {
        let store = MemoryDataStore::new();
        let (stats, token, handle) = start(&store, policy(Duration::ZERO));
        assert!(handle.is_some());

        sleep_secs(59).await;
        assert_eq!(store.mailbox_list_calls(), 0);
        assert!(!stats.has_completed());

        sleep_secs(2).await;
        assert_eq!(store.mailbox_list_calls(), 1);
        assert!(stats.has_completed());
        assert_eq!(stats.state(), ScannerState::Idle);

        sleep_secs(58).await;
        assert_eq!(store.mailbox_list_calls(), 1);

        sleep_secs(2).await;
        assert_eq!(store.mailbox_list_calls(), 2);

        token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_pass_does_not_stop_scanner() {
        let store = MemoryDataStore::with_failure_mode(MemoryFailureMode::ListMailboxes);
        store.add_message("m", "old", Utc::now() - chrono::Duration::days(2));
        let (stats, token, _handle) = start(&store, policy(Duration::ZERO));

        sleep_secs(121).await;
        assert_eq!(store.mailbox_list_calls(), 2);
        assert!(!stats.has_completed());
        assert_eq!(store.message_count(), 1);

        store.set_failure_mode(MemoryFailureMode::None);
        sleep_secs(60).await;
        assert_eq!(store.mailbox_list_calls(), 3);
        assert!(stats.has_completed());
        assert_eq!(store.message_count(), 0);
        assert_eq!(stats.deletes_total(), 1);

        token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_pass_is_followed_immediately() {
        let store = MemoryDataStore::new();
        store.add_mailbox("only");
        let (stats, token, _handle) = start(&store, policy(Duration::from_secs(90)));

        // First pass starts at 60s and sleeps 90s after its only mailbox
        sleep_secs(61).await;
        assert_eq!(store.mailbox_list_calls(), 1);
        assert_eq!(stats.state(), ScannerState::Scanning);
        assert!(!stats.has_completed());

        // It ends at 150s and the next pass starts straight away
        sleep_secs(90).await;
        assert_eq!(store.mailbox_list_calls(), 2);
        assert!(stats.has_completed());
        assert_eq!(stats.state(), ScannerState::Scanning);

        token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_idle_scanner() {
        let store = MemoryDataStore::new();
        let (stats, token, handle) = start(&store, policy(Duration::ZERO));

        sleep_secs(61).await;
        assert_eq!(store.mailbox_list_calls(), 1);

        token.cancel();
        handle.unwrap().await.unwrap();
        assert_eq!(stats.state(), ScannerState::Idle);

        sleep_secs(600).await;
        assert_eq!(store.mailbox_list_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_pass_in_progress() {
        let store = MemoryDataStore::new();
        store.add_mailbox("a");
        store.add_mailbox("b");
        let (stats, token, handle) = start(&store, policy(Duration::from_secs(30)));

        // Pass started at 60s and is sleeping after mailbox "a"
        sleep_secs(70).await;
        assert_eq!(stats.state(), ScannerState::Scanning);
        assert_eq!(store.visited_mailboxes(), vec!["a"]);

        token.cancel();
        handle.unwrap().await.unwrap();
        assert_eq!(stats.state(), ScannerState::Idle);
        assert!(!stats.has_completed());

        sleep_secs(120).await;
        assert_eq!(store.visited_mailboxes(), vec!["a"]);
    }
}
