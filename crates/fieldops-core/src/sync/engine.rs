//! Sync cycle state machine.
//!
//! One engine instance exists per process, constructed at startup and
//! passed explicitly to whatever needs to trigger or observe sync. A cycle
//! runs upload → download → resolve → cleanup; phases are best effort, so
//! per-record failures never block progression, while a cycle-level error
//! aborts the cycle without advancing the checkpoint. At most one cycle
//! runs at a time; triggers arriving mid-cycle are dropped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::storage::Database;

use super::client::RemoteClient;
use super::resolver::{self, server_wins, ConflictPolicy};
use super::types::{
    CycleOutcome, PhaseAbort, SyncErrorRecord, SyncPhase, SyncState, SyncTrigger,
};
use super::{deadline_expired, download, upload, COMPLETED_ACTION_RETENTION_HOURS};

/// The sync engine: orchestrates cycles over the local store and the
/// remote client.
pub struct SyncEngine {
    db: Arc<Mutex<Database>>,
    client: Arc<RemoteClient>,
    policy: ConflictPolicy,
    state_tx: watch::Sender<SyncState>,
    busy: AtomicBool,
}

impl SyncEngine {
    pub fn new(db: Database, client: RemoteClient) -> Self {
        let (state_tx, _) = watch::channel(SyncState::default());
        Self {
            db: Arc::new(Mutex::new(db)),
            client: Arc::new(client),
            policy: server_wins(),
            state_tx,
            busy: AtomicBool::new(false),
        }
    }

    /// Substitute the conflict resolution policy.
    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Subscribe to engine state, published at phase boundaries only.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state_tx.subscribe()
    }

    /// Snapshot of the current engine state.
    pub fn state(&self) -> SyncState {
        self.state_tx.borrow().clone()
    }

    /// Shared handle to the local store, for the business layer.
    pub fn database(&self) -> Arc<Mutex<Database>> {
        Arc::clone(&self.db)
    }

    /// Run one sync cycle. Returns [`CycleOutcome::Skipped`] without doing
    /// anything if a cycle is already in flight.
    ///
    /// `deadline` carries an OS-imposed background window expiration; work
    /// already persisted when it fires is kept, the rest is abandoned.
    pub async fn sync_cycle(
        &self,
        trigger: SyncTrigger,
        deadline: Option<Instant>,
    ) -> CycleOutcome {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!(?trigger, "cycle already running, trigger dropped");
            return CycleOutcome::Skipped;
        }

        tracing::info!(?trigger, "sync cycle started");
        let outcome = match self.run_phases(deadline).await {
            Ok(()) => {
                tracing::info!("sync cycle completed");
                CycleOutcome::Completed
            }
            Err(PhaseAbort::Expired) => {
                tracing::warn!("background window expired, cycle incomplete");
                self.state_tx.send_modify(|state| {
                    state.is_syncing = false;
                    state.phase = SyncPhase::Idle;
                });
                CycleOutcome::Expired
            }
            Err(PhaseAbort::Fatal(err)) => {
                tracing::error!(error = %err, "sync cycle aborted");
                self.state_tx.send_modify(|state| {
                    state.is_syncing = false;
                    state.phase = SyncPhase::Idle;
                    state.errors.push(SyncErrorRecord {
                        message: err.to_string(),
                        timestamp: Utc::now(),
                        retryable: err.retryable(),
                    });
                });
                CycleOutcome::Failed(err)
            }
        };

        self.busy.store(false, Ordering::SeqCst);
        outcome
    }

    async fn run_phases(&self, deadline: Option<Instant>) -> Result<(), PhaseAbort> {
        self.state_tx.send_modify(|state| {
            state.is_syncing = true;
            state.phase = SyncPhase::Uploading;
            state.errors.clear();
        });
        let uploaded = upload::run(&self.db, &self.client, deadline).await?;
        tracing::debug!(
            attempted = uploaded.attempted,
            succeeded = uploaded.succeeded,
            failed = uploaded.failed,
            cancelled = uploaded.cancelled,
            "upload phase done"
        );

        self.publish_phase(SyncPhase::Downloading);
        let (merged, fetched_at) = download::run(&self.db, &self.client, deadline).await?;
        tracing::debug!(
            inserted = merged.inserted,
            overwritten = merged.overwritten,
            conflicted = merged.conflicted,
            skipped = merged.skipped,
            "download phase done"
        );

        self.publish_phase(SyncPhase::Resolving);
        if deadline_expired(deadline) {
            return Err(PhaseAbort::Expired);
        }
        let resolved = {
            let mut db = self.db.lock().unwrap();
            resolver::run(&mut db, &self.policy)?
        };
        tracing::debug!(resolved = resolved.resolved, "resolve phase done");

        self.publish_phase(SyncPhase::CleaningUp);
        if deadline_expired(deadline) {
            return Err(PhaseAbort::Expired);
        }
        let now = Utc::now();
        let cutoff = now - chrono::Duration::hours(COMPLETED_ACTION_RETENTION_HOURS);
        {
            let db = self.db.lock().unwrap();
            let purged = db.purge_completed_actions(cutoff)?;
            if purged > 0 {
                tracing::debug!(purged, "purged stale completed actions");
            }
            // The checkpoint only advances on a fully-completed cycle, and
            // to the download fetch instant rather than now: anything the
            // server accepted mid-cycle is re-fetched next time.
            db.set_checkpoint(fetched_at)?;
        }

        self.state_tx.send_modify(|state| {
            state.is_syncing = false;
            state.phase = SyncPhase::Idle;
            state.last_sync_at = Some(now);
            state.errors.clear();
        });
        Ok(())
    }

    fn publish_phase(&self, phase: SyncPhase) {
        self.state_tx.send_modify(|state| state.phase = phase);
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("busy", &self.busy.load(Ordering::SeqCst))
            .finish()
    }
}
