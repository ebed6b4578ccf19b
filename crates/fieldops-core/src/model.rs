//! Domain model for syncable field-service records.
//!
//! Every record the engine touches is a [`LocalRecord`]: a sync envelope
//! (local id, optional server id, sync status, last-modified timestamp)
//! around a kind-specific JSON payload. The typed payload structs are used
//! at the wire boundary and by callers creating records; the store and the
//! merge engine operate on the envelope uniformly.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kinds of records subject to synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Job,
    Photo,
    Chemical,
    ChemicalTreatment,
    DeviceRegistration,
}

impl EntityKind {
    /// All kinds, in upload order. Jobs and chemicals go before the
    /// treatments and photos that reference them.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::DeviceRegistration,
        EntityKind::Job,
        EntityKind::Chemical,
        EntityKind::ChemicalTreatment,
        EntityKind::Photo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Job => "job",
            EntityKind::Photo => "photo",
            EntityKind::Chemical => "chemical",
            EntityKind::ChemicalTreatment => "chemical_treatment",
            EntityKind::DeviceRegistration => "device_registration",
        }
    }

    pub fn parse(s: &str) -> Option<EntityKind> {
        match s {
            "job" => Some(EntityKind::Job),
            "photo" => Some(EntityKind::Photo),
            "chemical" => Some(EntityKind::Chemical),
            "chemical_treatment" => Some(EntityKind::ChemicalTreatment),
            "device_registration" => Some(EntityKind::DeviceRegistration),
            _ => None,
        }
    }
}

/// Synchronization state of a local record.
///
/// Owned by the sync engine: business logic and UI may read it but must
/// never write it directly. Local edits re-enter the pipeline through
/// [`crate::storage::Database::apply_local_edit`], which resets the record
/// to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Synced,
    Failed,
    Conflict,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
            SyncStatus::Conflict => "conflict",
        }
    }

    pub fn parse(s: &str) -> Option<SyncStatus> {
        match s {
            "pending" => Some(SyncStatus::Pending),
            "synced" => Some(SyncStatus::Synced),
            "failed" => Some(SyncStatus::Failed),
            "conflict" => Some(SyncStatus::Conflict),
            _ => None,
        }
    }
}

/// A local record: sync envelope plus kind-specific payload.
///
/// `local_id` is client-generated, stable and never reused. `server_id`
/// stays `None` until the first successful upload; across the local/remote
/// boundary two records are the same record iff their server ids match.
/// `last_modified` is the sole ordering signal for conflict detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRecord {
    pub kind: EntityKind,
    pub local_id: Uuid,
    pub server_id: Option<String>,
    pub sync_status: SyncStatus,
    pub last_modified: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl LocalRecord {
    /// Create a new locally-authored record, pending upload.
    pub fn new_pending<T: Serialize>(kind: EntityKind, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind,
            local_id: Uuid::new_v4(),
            server_id: None,
            sync_status: SyncStatus::Pending,
            last_modified: Utc::now(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Decode the payload into its typed form.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Result of one record's upload attempt, applied back to the store as a
/// batch at the end of the upload phase. `Ok` carries the server-assigned
/// id; `Err` carries the failure message for logging.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub kind: EntityKind,
    pub local_id: Uuid,
    pub result: Result<String, String>,
}

/// The remote payload stashed when a record is flagged conflicted, so the
/// resolver can apply a policy later without refetching.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictSnapshot {
    pub kind: EntityKind,
    pub local_id: Uuid,
    pub remote_payload: serde_json::Value,
    pub remote_last_modified: DateTime<Utc>,
}

/// One store mutation decided by the merge engine for an incoming record.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOp {
    /// No local record matched the server id: create it, already synced.
    Insert(LocalRecord),
    /// Incoming copy is strictly newer: replace the local payload.
    Overwrite {
        kind: EntityKind,
        local_id: Uuid,
        payload: serde_json::Value,
        last_modified: DateTime<Utc>,
    },
    /// Local copy is same-or-newer: flag the conflict and stash the
    /// incoming payload for the resolver.
    FlagConflict(ConflictSnapshot),
}

/// A field-service job: one scheduled visit to a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub site_name: String,
    pub address: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A photo captured on site, attached to a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub job_local_id: Uuid,
    /// Path to the captured image bytes on local disk.
    pub file_path: String,
    #[serde(default)]
    pub caption: Option<String>,
}

/// A chemical product available to technicians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chemical {
    pub name: String,
    pub epa_number: String,
    pub quantity: f64,
    pub unit: String,
}

/// One application of a chemical during a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChemicalTreatment {
    pub job_local_id: Uuid,
    pub chemical_local_id: Uuid,
    pub dose: f64,
    pub method: String,
    pub applied_at: DateTime<Utc>,
}

/// This device's registration with the server (push token etc.).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistration {
    pub device_id: Uuid,
    pub device_name: String,
    pub platform: String,
    #[serde(default)]
    pub push_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EntityKind::parse("bogus"), None);
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            SyncStatus::Pending,
            SyncStatus::Synced,
            SyncStatus::Failed,
            SyncStatus::Conflict,
        ] {
            assert_eq!(SyncStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn new_pending_record_has_no_server_id() {
        let job = Job {
            site_name: "Riverside Mill".to_string(),
            address: "12 Mill Lane".to_string(),
            scheduled_for: Utc::now(),
            status: "scheduled".to_string(),
            notes: None,
        };
        let record = LocalRecord::new_pending(EntityKind::Job, &job).unwrap();
        assert_eq!(record.sync_status, SyncStatus::Pending);
        assert!(record.server_id.is_none());
        let decoded: Job = record.decode().unwrap();
        assert_eq!(decoded, job);
    }
}
