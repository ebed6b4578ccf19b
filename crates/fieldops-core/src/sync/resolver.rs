//! Pluggable conflict resolution.
//!
//! The resolver scans every kind for conflicted records and applies an
//! injectable policy to each, using the remote snapshot stashed by the
//! merge engine. Neither the orchestrator nor the merge engine knows the
//! policy; swapping in field-level merge or user-prompted resolution
//! touches only this seam.

use std::sync::Arc;

use chrono::Utc;

use crate::model::{ConflictSnapshot, LocalRecord, SyncStatus};
use crate::storage::Database;

use super::types::PhaseAbort;

/// A policy's verdict for one conflicted record.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Accept the server copy; the record becomes `Synced`.
    TakeRemote,
    /// Keep the local edit; the record goes back to `Pending` so the next
    /// cycle re-uploads it.
    KeepLocal,
    /// Substitute a merged payload; it goes back to `Pending` for upload.
    Merged(serde_json::Value),
}

/// Conflicted local record + stashed remote snapshot → resolution.
pub type ConflictPolicy =
    Arc<dyn Fn(&LocalRecord, &ConflictSnapshot) -> Resolution + Send + Sync>;

/// Shipped policy: the server copy wins unconditionally, discarding the
/// local divergent edit.
pub fn server_wins() -> ConflictPolicy {
    Arc::new(|_local, _remote| Resolution::TakeRemote)
}

/// Counters for one resolve phase.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResolveReport {
    pub resolved: usize,
}

pub(crate) fn run(db: &mut Database, policy: &ConflictPolicy) -> Result<ResolveReport, PhaseAbort> {
    let conflicts = db.conflicts()?;
    let mut report = ResolveReport::default();

    for (local, snapshot) in conflicts {
        let kind = local.kind;
        let local_id = local.local_id;
        match policy(&local, &snapshot) {
            Resolution::TakeRemote => db.apply_resolution(
                kind,
                local_id,
                &snapshot.remote_payload,
                snapshot.remote_last_modified,
                SyncStatus::Synced,
            )?,
            Resolution::KeepLocal => db.apply_resolution(
                kind,
                local_id,
                &local.payload,
                Utc::now(),
                SyncStatus::Pending,
            )?,
            Resolution::Merged(payload) => {
                db.apply_resolution(kind, local_id, &payload, Utc::now(), SyncStatus::Pending)?
            }
        }
        report.resolved += 1;
        tracing::debug!(kind = kind.as_str(), local_id = %local_id, "conflict resolved");
    }

    Ok(report)
}
