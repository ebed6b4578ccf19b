//! Per-kind upload pipelines.
//!
//! The upload phase walks the kinds in dependency order. For each kind it
//! fetches the pending records, uploads them concurrently, awaits the
//! whole batch, then applies the results back in a single store
//! transaction. One record's failure never aborts its batch; a `Failed`
//! record waits for a later cycle (requeueing to `Pending` is the owning
//! business layer's decision, not the engine's).

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::model::{EntityKind, LocalRecord, Photo, SyncStatus, UploadOutcome};
use crate::storage::Database;

use super::client::RemoteClient;
use super::codec::WireUpload;
use super::deadline_expired;
use super::types::{PhaseAbort, SyncError};

/// Counters for one upload phase.
#[derive(Debug, Default, Clone, Copy)]
pub struct UploadReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

pub(crate) async fn run(
    db: &Arc<Mutex<Database>>,
    client: &Arc<RemoteClient>,
    deadline: Option<Instant>,
) -> Result<UploadReport, PhaseAbort> {
    let mut report = UploadReport::default();

    for kind in EntityKind::ALL {
        if deadline_expired(deadline) {
            return Err(PhaseAbort::Expired);
        }

        let pending = db
            .lock()
            .unwrap()
            .with_status(kind, SyncStatus::Pending)?;
        if pending.is_empty() {
            continue;
        }
        tracing::debug!(kind = kind.as_str(), count = pending.len(), "uploading batch");

        // At most one in-flight attempt per record.
        let mut in_flight = HashSet::new();
        let mut tasks = JoinSet::new();
        for record in pending {
            if !in_flight.insert(record.local_id) {
                continue;
            }
            let client = Arc::clone(client);
            tasks.spawn(upload_one(client, record, deadline));
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(outcome)) => outcomes.push(outcome),
                Ok(None) => report.cancelled += 1,
                Err(e) => {
                    tracing::error!(kind = kind.as_str(), error = %e, "upload task panicked")
                }
            }
        }

        for outcome in &outcomes {
            report.attempted += 1;
            match &outcome.result {
                Ok(server_id) => {
                    report.succeeded += 1;
                    tracing::debug!(
                        kind = kind.as_str(),
                        local_id = %outcome.local_id,
                        server_id,
                        "uploaded"
                    );
                }
                Err(message) => {
                    report.failed += 1;
                    tracing::warn!(
                        kind = kind.as_str(),
                        local_id = %outcome.local_id,
                        message,
                        "upload failed"
                    );
                }
            }
        }

        db.lock()
            .unwrap()
            .apply_upload_outcomes(&outcomes, Utc::now())?;
    }

    Ok(report)
}

/// `None` means the deadline cut the attempt off before the server
/// answered. The record keeps its `Pending` status and the next cycle
/// retries it; only a real server verdict marks it `Failed`.
async fn upload_one(
    client: Arc<RemoteClient>,
    record: LocalRecord,
    deadline: Option<Instant>,
) -> Option<UploadOutcome> {
    let kind = record.kind;
    let local_id = record.local_id;
    let result = match deadline {
        Some(at) => match tokio::time::timeout_at(at, attempt(client, record)).await {
            Ok(result) => result,
            Err(_) => return None,
        },
        None => attempt(client, record).await,
    };
    Some(UploadOutcome {
        kind,
        local_id,
        result: result.map_err(|e| e.to_string()),
    })
}

/// One record's upload: wire transform (pure), endpoint call, server id
/// extraction.
async fn attempt(client: Arc<RemoteClient>, record: LocalRecord) -> Result<String, SyncError> {
    let wire = WireUpload::from_record(&record);
    let ack = match record.kind {
        EntityKind::Job => client.upload_job(&wire).await?,
        EntityKind::Chemical => client.upload_chemical(&wire).await?,
        EntityKind::ChemicalTreatment => client.upload_chemical_treatment(&wire).await?,
        EntityKind::DeviceRegistration => client.register_device(&wire).await?,
        EntityKind::Photo => {
            let photo: Photo = record
                .decode()
                .map_err(|e| SyncError::Decode(format!("photo payload: {e}")))?;
            let image = tokio::fs::read(&photo.file_path)
                .await
                .map_err(|e| SyncError::Persistence(e.into()))?;
            let file_name = Path::new(&photo.file_path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("photo.jpg");
            client.upload_photo(&wire, image, file_name).await?
        }
    };
    ack.server_id
        .ok_or_else(|| SyncError::Decode("upload response missing serverId".into()))
}
