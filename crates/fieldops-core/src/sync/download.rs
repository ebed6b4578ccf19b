//! Download and merge engine.
//!
//! Fetches server-side changes since the sync checkpoint and merges them
//! into the local store with a per-record last-writer-wins comparison.
//! There is no cross-kind transaction: each kind's batch commits on its
//! own, so partial application is possible and convergence is reached
//! over subsequent cycles.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use uuid::Uuid;

use crate::model::{
    ConflictSnapshot, EntityKind, LocalRecord, MergeOp, SyncStatus,
};
use crate::storage::Database;

use super::client::RemoteClient;
use super::codec::RemoteRecord;
use super::deadline_expired;
use super::types::PhaseAbort;

/// Counters for one download phase.
#[derive(Debug, Default, Clone, Copy)]
pub struct MergeReport {
    pub inserted: usize,
    pub overwritten: usize,
    pub conflicted: usize,
    pub skipped: usize,
}

/// Returns the merge counters plus the instant the fetch started, which
/// is what the checkpoint advances to: server changes landing while the
/// rest of the cycle runs stay inside the next `since` window.
pub(crate) async fn run(
    db: &Arc<Mutex<Database>>,
    client: &Arc<RemoteClient>,
    deadline: Option<Instant>,
) -> Result<(MergeReport, DateTime<Utc>), PhaseAbort> {
    if deadline_expired(deadline) {
        return Err(PhaseAbort::Expired);
    }

    let since = db.lock().unwrap().checkpoint()?;
    let fetched_at = Utc::now();
    // The fetch itself failing is a cycle-level error, not a per-record one.
    let feed = match deadline {
        Some(at) => tokio::time::timeout_at(at, client.fetch_updates_since(since))
            .await
            .map_err(|_| PhaseAbort::Expired)?
            .map_err(PhaseAbort::Fatal)?,
        None => client.fetch_updates_since(since).await.map_err(PhaseAbort::Fatal)?,
    };
    tracing::debug!(since = ?since, incoming = feed.len(), "merging server updates");

    let mut report = MergeReport::default();
    for (kind, records) in feed.by_kind() {
        if deadline_expired(deadline) {
            return Err(PhaseAbort::Expired);
        }

        let mut ops = Vec::new();
        for incoming in records {
            let local = db
                .lock()
                .unwrap()
                .find_by_server_id(kind, &incoming.server_id)?;
            match decide_merge(kind, local.as_ref(), incoming) {
                Some(op) => {
                    match &op {
                        MergeOp::Insert(_) => report.inserted += 1,
                        MergeOp::Overwrite { .. } => report.overwritten += 1,
                        MergeOp::FlagConflict(_) => report.conflicted += 1,
                    }
                    ops.push(op);
                }
                None => report.skipped += 1,
            }
        }
        db.lock().unwrap().apply_merge_batch(&ops)?;
    }

    Ok((report, fetched_at))
}

/// Last-writer-wins merge decision for one incoming record.
///
/// Incoming strictly newer than the local copy wins. An incoming copy that
/// is same-or-older than a locally diverged record means a local edit
/// raced the server: flag the conflict and stash the incoming payload for
/// the resolver. Same-or-older against a clean `Synced` record is just
/// stale or duplicate delivery and is ignored.
pub fn decide_merge(
    kind: EntityKind,
    local: Option<&LocalRecord>,
    incoming: &RemoteRecord,
) -> Option<MergeOp> {
    let local = match local {
        None => {
            return Some(MergeOp::Insert(LocalRecord {
                kind,
                local_id: Uuid::new_v4(),
                server_id: Some(incoming.server_id.clone()),
                sync_status: SyncStatus::Synced,
                last_modified: incoming.last_modified,
                payload: incoming.payload.clone(),
            }))
        }
        Some(local) => local,
    };

    if incoming.last_modified > local.last_modified {
        return Some(MergeOp::Overwrite {
            kind,
            local_id: local.local_id,
            payload: incoming.payload.clone(),
            last_modified: incoming.last_modified,
        });
    }

    if local.sync_status == SyncStatus::Synced {
        // Stale or duplicate delivery of state we already hold.
        return None;
    }

    Some(MergeOp::FlagConflict(ConflictSnapshot {
        kind,
        local_id: local.local_id,
        remote_payload: incoming.payload.clone(),
        remote_last_modified: incoming.last_modified,
    }))
}
