//! Runs one full synchronization and publishes its progress.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::api::RemoteApi;
use crate::db::{EntityStore, SettingsRepository};
use crate::error::{Error, Result};
use crate::models::SyncBookkeeping;
use crate::state::{SyncState, SyncStatus};
use crate::util::unix_millis_now;

use super::deletion::{prune_unseen, push_deletions};
use super::progress::{SyncProgress, SyncReport, SyncStep};
use super::reconcile::{reconcile_level, SyncContext};
use super::retry::backoff_delay;

/// How a sync request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Bookkeeping showed nothing to do
    AlreadyUpToDate,
    Completed(SyncReport),
    /// Another run was in progress; this request was dropped
    AlreadyRunning,
}

/// Sequences snapshot reconciliation and deletion propagation against one
/// store and one server. At most one run is active at a time.
pub struct SyncEngine<S, A> {
    store: S,
    api: A,
    running: AtomicBool,
    status: watch::Sender<SyncStatus>,
}

struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S, A> SyncEngine<S, A>
where
    S: EntityStore + SettingsRepository,
    A: RemoteApi,
{
    pub fn new(store: S, api: A) -> Self {
        let (status, _) = watch::channel(SyncStatus::default());
        Self {
            store,
            api,
            running: AtomicBool::new(false),
            status,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Observe state and step progress.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn publish(&self, state: SyncState, progress: Option<SyncProgress>) {
        self.status.send_replace(SyncStatus { state, progress });
    }

    /// Run once unless bookkeeping says the catalog is current; `force` skips
    /// that check. Requests made while a run is active return
    /// [`SyncOutcome::AlreadyRunning`] immediately.
    pub async fn sync(&self, force: bool, cancel: &CancellationToken) -> Result<SyncOutcome> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Sync requested while another run is active; ignoring");
            return Ok(SyncOutcome::AlreadyRunning);
        }
        let _guard = RunGuard(&self.running);

        self.publish(SyncState::Syncing, None);
        let result = self.run(force, cancel).await;
        match &result {
            Ok(SyncOutcome::Completed(report)) => {
                tracing::info!("Sync completed: {report}");
                self.publish(SyncState::Synced, None);
            }
            Ok(_) => self.publish(SyncState::Synced, None),
            Err(Error::Cancelled) => {
                tracing::info!("Sync cancelled");
                self.publish(SyncState::Offline, None);
            }
            Err(error) => {
                tracing::error!("Sync failed: {error}");
                self.publish(SyncState::Error, None);
            }
        }
        result
    }

    /// [`Self::sync`] with retries of retryable failures, waiting
    /// [`backoff_delay`] between attempts.
    pub async fn sync_with_retries(
        &self,
        force: bool,
        max_retries: u32,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome> {
        let mut failures = 0;
        loop {
            match self.sync(force, cancel).await {
                Err(error) if error.is_retryable() && failures < max_retries => {
                    let delay = backoff_delay(failures);
                    failures += 1;
                    tracing::warn!(
                        "Sync attempt {failures} failed: {error}; retrying in {}s",
                        delay.as_secs()
                    );
                    tokio::select! {
                        () = cancel.cancelled() => return Err(Error::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                other => return other,
            }
        }
    }

    async fn run(&self, force: bool, cancel: &CancellationToken) -> Result<SyncOutcome> {
        let bookkeeping = self.store.load_bookkeeping().await?;
        let server_update = self.api.last_update().await?;
        if !force && !bookkeeping.needs_sync(server_update) {
            tracing::info!("Catalog already up to date");
            return Ok(SyncOutcome::AlreadyUpToDate);
        }

        let started = unix_millis_now();
        let mut ctx = SyncContext::new(cancel.clone());
        let mut on_progress = |progress: SyncProgress| {
            tracing::debug!("{progress}");
            self.publish(SyncState::Syncing, Some(progress));
        };

        on_progress(SyncProgress::new(SyncStep::GetTree, 0, 1));
        let levels = self.api.tree().await?.into_levels();
        let blocks = self.api.blocks().await?;
        on_progress(SyncProgress::new(SyncStep::GetTree, 1, 1));

        reconcile_level(&self.store, &self.api, &mut ctx, &levels.areas, &mut on_progress).await?;
        reconcile_level(&self.store, &self.api, &mut ctx, &levels.zones, &mut on_progress).await?;
        reconcile_level(&self.store, &self.api, &mut ctx, &levels.sectors, &mut on_progress).await?;
        reconcile_level(&self.store, &self.api, &mut ctx, &levels.paths, &mut on_progress).await?;
        reconcile_level(&self.store, &self.api, &mut ctx, &blocks, &mut on_progress).await?;

        push_deletions(&self.store, &self.api, &mut ctx, &mut on_progress).await?;
        prune_unseen(&self.store, &mut ctx, &mut on_progress).await?;

        let report = *ctx.report();
        let server_update = self.fresh_server_update(server_update).await;
        self.finish(started, server_update, &report).await?;
        Ok(SyncOutcome::Completed(report))
    }

    /// Server last-update after this run's own pushes and deletions, falling
    /// back to the value read before the run.
    async fn fresh_server_update(&self, before: Option<i64>) -> Option<i64> {
        match self.api.last_update().await {
            Ok(Some(after)) => Some(after),
            Ok(None) => before,
            Err(error) => {
                tracing::warn!("Could not refresh server last-update after sync: {error}");
                before
            }
        }
    }

    /// Record the run. The modification marker survives when edits are still
    /// unpushed or were made while the run was in flight.
    async fn finish(
        &self,
        started: i64,
        server_update: Option<i64>,
        report: &SyncReport,
    ) -> Result<()> {
        let current = self.store.load_bookkeeping().await?;
        let last_local_modification = if report.unpushed() > 0 {
            Some(unix_millis_now().max(started + 1))
        } else {
            current
                .last_local_modification
                .filter(|modified| *modified > started)
        };

        let bookkeeping = SyncBookkeeping {
            last_sync: Some(started),
            last_server_update: server_update.or(Some(started)),
            last_local_modification,
            has_synced: true,
        };
        self.store.save_bookkeeping(&bookkeeping).await
    }
}
