//! The cleanup scheduler: scan-and-delete sweeps over stored accounts.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::model::{CleanupConfig, SweepReport};
use crate::Result;
use crate::account::Account;
use crate::audit::AuditAction;
use crate::provider::MailProvider;
use crate::retry::backoff_delay;
use crate::store::Store;

/// Sweeps locally known accounts past expiry (or past the retention
/// window) and deletes them from the remote provider, batched and
/// retried, independent of whether anyone is viewing the inbox.
pub struct CleanupService {
    provider: Arc<dyn MailProvider>,
    store: Arc<Store>,
    config: CleanupConfig,
    running: AtomicBool,
}

impl CleanupService {
    /// Create a cleanup service.
    pub fn new(provider: Arc<dyn MailProvider>, store: Arc<Store>, config: CleanupConfig) -> Self {
        Self {
            provider,
            store,
            config,
            running: AtomicBool::new(false),
        }
    }

    /// Whether a sweep is currently in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run one sweep now.
    ///
    /// Returns `None` when a sweep is already in flight; the concurrent
    /// trigger is a no-op rather than a queued run.
    ///
    /// # Errors
    ///
    /// Returns an error if the candidate scan or the stats refresh
    /// fails. Per-account deletion failures are logged, not returned.
    pub async fn sweep(&self) -> Result<Option<SweepReport>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Sweep already in progress, ignoring trigger");
            return Ok(None);
        }

        let result = self.sweep_inner().await;
        self.running.store(false, Ordering::SeqCst);
        result.map(Some)
    }

    #[allow(clippy::cast_possible_truncation)]
    async fn sweep_inner(&self) -> Result<SweepReport> {
        let started = Instant::now();
        let now = Utc::now();

        let candidates = self
            .store
            .accounts()
            .cleanup_candidates(now, Duration::days(self.config.max_retention_days))
            .await?;

        let mut report = SweepReport {
            scanned: candidates.len(),
            ..SweepReport::default()
        };

        let batches = candidates.chunks(self.config.batch_size.max(1));
        let batch_count = batches.len();
        for (index, batch) in batches.enumerate() {
            let mut tasks = JoinSet::new();
            for account in batch {
                let provider = Arc::clone(&self.provider);
                let store = Arc::clone(&self.store);
                let config = self.config.clone();
                let account = account.clone();
                tasks.spawn(async move {
                    cleanup_account(provider, store, &config, &account, now).await
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(true) => report.deleted += 1,
                    Ok(false) => report.failed += 1,
                    Err(e) => {
                        error!("Cleanup task failed to run: {e}");
                        report.failed += 1;
                    }
                }
            }

            if index + 1 < batch_count {
                tokio::time::sleep(self.config.batch_pause).await;
            }
        }

        // Account rows well past the retention window are pruned outright,
        // regardless of remote state.
        let prune_cutoff = now - Duration::days(self.config.max_retention_days * 2);
        let pruned = self.store.accounts().prune_older_than(prune_cutoff).await?;
        if pruned > 0 {
            debug!("Pruned {pruned} account record(s) past retention");
        }

        // Refresh the stats snapshot after every sweep
        let mut stats = self.store.accounts().stats(Utc::now()).await?;
        stats.last_run_at = Some(Utc::now());
        self.store.cleanup().save_stats(&stats).await?;

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            scanned = report.scanned,
            deleted = report.deleted,
            failed = report.failed,
            duration_ms = report.duration_ms,
            "Cleanup sweep finished"
        );

        Ok(report)
    }

    /// Start the background scheduler: one sweep shortly after startup,
    /// then one per interval, until the handle is stopped.
    #[must_use]
    pub fn start(self: &Arc<Self>) -> SchedulerHandle {
        let service = Arc::clone(self);
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(service.config.startup_delay) => {}
                _ = stop_rx.changed() => return,
            }

            loop {
                if let Err(e) = service.sweep().await {
                    error!("Scheduled sweep failed: {e}");
                }

                tokio::select! {
                    () = tokio::time::sleep(service.config.sweep_interval) => {}
                    _ = stop_rx.changed() => return,
                }
            }
        });

        SchedulerHandle {
            stop: stop_tx,
            handle,
        }
    }
}

/// Handle for a running scheduler loop.
pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop to stop and wait for any in-flight sweep to
    /// finish. Sweeps are never cancelled midway.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.handle.await {
            error!("Cleanup scheduler task failed: {e}");
        }
    }

    /// Whether the loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// One cleanup pass for one account: bounded retries with backoff, then
/// bookkeeping for whichever way it went. Returns true on deletion.
async fn cleanup_account(
    provider: Arc<dyn MailProvider>,
    store: Arc<Store>,
    config: &CleanupConfig,
    account: &Account,
    now: DateTime<Utc>,
) -> bool {
    let reason = if account.is_expired(now) {
        "expired"
    } else {
        "retention"
    };

    if let Err(e) = store
        .audit()
        .append(&account.id, AuditAction::CleanupAttempted, Some(reason))
        .await
    {
        warn!("Failed to record cleanup attempt for {}: {e}", account.id);
    }

    let mut attempt = 0u32;
    let outcome = loop {
        match provider
            .delete_account(&account.token, account.id.as_str())
            .await
        {
            Ok(()) => break Ok(()),
            // Already gone remotely: the goal state, count it as done
            Err(mailfade_api::Error::AccountGone) => {
                debug!("Account {} already gone on the provider", account.id);
                break Ok(());
            }
            Err(e) if e.is_retryable() && attempt + 1 < config.max_attempts => {
                let delay = backoff_delay(config.retry_base_delay, config.retry_max_delay, attempt);
                debug!(
                    "Deleting {} failed on attempt {} ({e}), retrying in {delay:?}",
                    account.id,
                    attempt + 1
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => break Err(e),
        }
    };

    match outcome {
        Ok(()) => {
            if let Err(e) = store.accounts().mark_deleted(&account.id).await {
                warn!("Failed to mark {} deleted: {e}", account.id);
            }
            if let Err(e) = store
                .audit()
                .append(&account.id, AuditAction::Deleted, Some(reason))
                .await
            {
                warn!("Failed to audit deletion of {}: {e}", account.id);
            }
            if let Err(e) = store.cleanup().record(&account.id, reason, true, None).await {
                warn!("Failed to log cleanup of {}: {e}", account.id);
            }
            info!("Deleted account {} ({})", account.id, account.address);
            true
        }
        Err(e) => {
            let detail = e.to_string();
            if let Err(e) = store.accounts().record_cleanup_attempt(&account.id).await {
                warn!("Failed to bump attempt counter for {}: {e}", account.id);
            }
            if let Err(e) = store
                .audit()
                .append(&account.id, AuditAction::CleanupFailed, Some(&detail))
                .await
            {
                warn!("Failed to audit cleanup failure of {}: {e}", account.id);
            }
            if let Err(e) = store
                .cleanup()
                .record(&account.id, reason, false, Some(&detail))
                .await
            {
                warn!("Failed to log cleanup failure of {}: {e}", account.id);
            }
            warn!(
                "Giving up on {} after {} attempts: {detail}",
                account.id,
                attempt + 1
            );
            false
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::account::AccountId;
    use crate::provider::fake::FakeProvider;
    use std::time::Duration as StdDuration;

    fn expired_account(id: &str, now: DateTime<Utc>) -> Account {
        let mut account = Account::new(
            AccountId::new(id),
            format!("{id}@fade.test"),
            "pw".to_string(),
            format!("tok-{id}"),
            now - Duration::hours(1),
            now - Duration::minutes(5),
        );
        account.message_count = 1;
        account
    }

    fn live_account(id: &str, now: DateTime<Utc>) -> Account {
        Account::new(
            AccountId::new(id),
            format!("{id}@fade.test"),
            "pw".to_string(),
            format!("tok-{id}"),
            now,
            now + Duration::minutes(10),
        )
    }

    async fn service_with(
        accounts: Vec<Account>,
        config: CleanupConfig,
    ) -> (Arc<CleanupService>, Arc<FakeProvider>, Arc<Store>) {
        let store = Arc::new(Store::in_memory_paused().await.unwrap());
        for account in &accounts {
            store.accounts().save(account).await.unwrap();
        }
        let provider = Arc::new(FakeProvider::new());
        let service = Arc::new(CleanupService::new(
            Arc::clone(&provider) as Arc<dyn MailProvider>,
            Arc::clone(&store),
            config,
        ));
        (service, provider, store)
    }

    #[tokio::test]
    async fn test_sweep_deletes_each_candidate_exactly_once() {
        let now = Utc::now();
        let (service, provider, store) = service_with(
            vec![
                expired_account("acc-1", now),
                expired_account("acc-2", now),
                live_account("acc-3", now),
            ],
            CleanupConfig::default(),
        )
        .await;

        let report = service.sweep().await.unwrap().unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.deleted, 2);
        assert_eq!(report.failed, 0);

        // One remote deletion per candidate per sweep, not per retry.
        assert_eq!(provider.delete_calls(), 2);

        for id in ["acc-1", "acc-2"] {
            let account = store.accounts().get(&AccountId::new(id)).await.unwrap().unwrap();
            assert!(account.deleted);

            let entries = store.audit().for_account(&account.id).await.unwrap();
            let actions: Vec<AuditAction> = entries.iter().map(|e| e.action).collect();
            assert!(actions.contains(&AuditAction::CleanupAttempted));
            assert!(actions.contains(&AuditAction::Deleted));
        }

        let live = store
            .accounts()
            .get(&AccountId::new("acc-3"))
            .await
            .unwrap()
            .unwrap();
        assert!(!live.deleted);

        let stats = store.cleanup().load_stats().await.unwrap().unwrap();
        assert!(stats.last_run_at.is_some());
        assert_eq!(stats.deleted_accounts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_deletion_retries_then_keeps_candidate() {
        let now = Utc::now();
        let config = CleanupConfig {
            max_attempts: 3,
            retry_base_delay: StdDuration::from_millis(100),
            ..CleanupConfig::default()
        };
        let (service, provider, store) =
            service_with(vec![expired_account("acc-1", now)], config).await;
        provider.fail_deletes(true);

        let report = service.sweep().await.unwrap().unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.deleted, 0);
        assert_eq!(report.failed, 1);

        // Retries happen within the pass, bounded by max_attempts.
        assert_eq!(provider.delete_calls(), 3);

        let account = store
            .accounts()
            .get(&AccountId::new("acc-1"))
            .await
            .unwrap()
            .unwrap();
        assert!(!account.deleted);
        assert_eq!(account.cleanup_attempts, 1);

        let attempts = store.cleanup().recent(10).await.unwrap();
        assert_eq!(attempts.len(), 1);
        assert!(!attempts[0].success);
        assert!(attempts[0].error.is_some());

        // Still a candidate for the next sweep.
        let report = service.sweep().await.unwrap().unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(provider.delete_calls(), 6);
    }

    #[tokio::test]
    async fn test_already_gone_counts_as_deleted() {
        let now = Utc::now();
        let (service, provider, store) =
            service_with(vec![expired_account("acc-1", now)], CleanupConfig::default()).await;
        provider.set_delete_gone(true);

        let report = service.sweep().await.unwrap().unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(report.failed, 0);

        let account = store
            .accounts()
            .get(&AccountId::new("acc-1"))
            .await
            .unwrap()
            .unwrap();
        assert!(account.deleted);
    }

    #[tokio::test]
    async fn test_concurrent_trigger_is_noop() {
        let now = Utc::now();
        let (service, provider, _store) = service_with(
            vec![expired_account("acc-1", now), expired_account("acc-2", now)],
            CleanupConfig::default(),
        )
        .await;

        let (first, second) = tokio::join!(service.sweep(), service.sweep());
        let reports = [first.unwrap(), second.unwrap()];

        // Exactly one of the two triggers actually swept.
        assert_eq!(reports.iter().filter(|r| r.is_some()).count(), 1);
        assert_eq!(provider.delete_calls(), 2);
        assert!(!service.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_runs_startup_sweep_and_stops() {
        let now = Utc::now();
        let config = CleanupConfig {
            startup_delay: StdDuration::from_secs(1),
            sweep_interval: StdDuration::from_secs(3600),
            ..CleanupConfig::default()
        };
        let (service, provider, _store) =
            service_with(vec![expired_account("acc-1", now)], config).await;

        let handle = service.start();
        tokio::time::sleep(StdDuration::from_secs(5)).await;

        assert_eq!(provider.delete_calls(), 1);
        assert!(!handle.is_finished());

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_bound_concurrency() {
        let now = Utc::now();
        let config = CleanupConfig {
            batch_size: 2,
            batch_pause: StdDuration::from_millis(200),
            ..CleanupConfig::default()
        };
        let accounts = (0..5)
            .map(|i| expired_account(&format!("acc-{i}"), now))
            .collect();
        let (service, provider, _store) = service_with(accounts, config).await;

        let report = service.sweep().await.unwrap().unwrap();
        assert_eq!(report.scanned, 5);
        assert_eq!(report.deleted, 5);
        assert_eq!(provider.delete_calls(), 5);
    }
}
