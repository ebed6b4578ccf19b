//! Wire format for the sync API.
//!
//! All timestamps cross the wire as RFC 3339 UTC strings (chrono's serde
//! default), so both sides interpret them identically. Outgoing uploads
//! embed the client-generated `localId` so the server can enforce
//! idempotency and the response can be correlated back before a server id
//! exists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{EntityKind, LocalRecord};

/// Outgoing upload record: identity envelope plus the kind payload,
/// flattened into one JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireUpload {
    pub local_id: Uuid,
    pub last_modified: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: serde_json::Value,
}

impl WireUpload {
    /// Pure transform from a local record; no side effects.
    pub fn from_record(record: &LocalRecord) -> Self {
        Self {
            local_id: record.local_id,
            last_modified: record.last_modified,
            payload: record.payload.clone(),
        }
    }
}

/// Server acknowledgement of one upload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAck {
    pub success: bool,
    #[serde(default)]
    pub server_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One record in the incremental update feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    pub server_id: String,
    pub last_modified: DateTime<Utc>,
    /// Remaining fields are the kind payload.
    #[serde(flatten)]
    pub payload: serde_json::Value,
}

/// The download feed: parallel collections, one per record kind.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFeed {
    #[serde(default)]
    pub jobs: Vec<RemoteRecord>,
    #[serde(default)]
    pub photos: Vec<RemoteRecord>,
    #[serde(default)]
    pub chemicals: Vec<RemoteRecord>,
    #[serde(default)]
    pub chemical_treatments: Vec<RemoteRecord>,
    #[serde(default)]
    pub device_registrations: Vec<RemoteRecord>,
}

impl UpdateFeed {
    /// The feed's collections paired with their kinds, in merge order.
    pub fn by_kind(&self) -> [(EntityKind, &[RemoteRecord]); 5] {
        [
            (EntityKind::Job, self.jobs.as_slice()),
            (EntityKind::Chemical, self.chemicals.as_slice()),
            (EntityKind::ChemicalTreatment, self.chemical_treatments.as_slice()),
            (EntityKind::Photo, self.photos.as_slice()),
            (EntityKind::DeviceRegistration, self.device_registrations.as_slice()),
        ]
    }

    pub fn len(&self) -> usize {
        self.by_kind().iter().map(|(_, records)| records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Job, SyncStatus};

    #[test]
    fn wire_upload_flattens_payload() {
        let job = Job {
            site_name: "Orchard House".to_string(),
            address: "8 Apple Way".to_string(),
            scheduled_for: Utc::now(),
            status: "scheduled".to_string(),
            notes: Some("gate code 4471".to_string()),
        };
        let record = LocalRecord::new_pending(EntityKind::Job, &job).unwrap();
        let wire = WireUpload::from_record(&record);

        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["localId"], record.local_id.to_string());
        assert_eq!(json["siteName"], "Orchard House");
        assert!(json.get("payload").is_none());
    }

    #[test]
    fn remote_record_captures_payload_fields() {
        let json = serde_json::json!({
            "serverId": "srv-42",
            "lastModified": "2026-03-01T09:30:00Z",
            "siteName": "Orchard House",
            "status": "done"
        });
        let record: RemoteRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.server_id, "srv-42");
        assert_eq!(record.payload["siteName"], "Orchard House");
        assert!(record.payload.get("serverId").is_none());
    }

    #[test]
    fn feed_tolerates_missing_collections() {
        let feed: UpdateFeed =
            serde_json::from_value(serde_json::json!({"jobs": []})).unwrap();
        assert!(feed.is_empty());
    }

    #[test]
    fn sync_status_is_local_only() {
        // The wire payload is whatever the record carries; the envelope
        // fields the engine owns stay out of it.
        let job = Job {
            site_name: "x".into(),
            address: "y".into(),
            scheduled_for: Utc::now(),
            status: "scheduled".into(),
            notes: None,
        };
        let record = LocalRecord::new_pending(EntityKind::Job, &job).unwrap();
        assert_eq!(record.sync_status, SyncStatus::Pending);
        let wire = serde_json::to_value(WireUpload::from_record(&record)).unwrap();
        assert!(wire.get("syncStatus").is_none());
        assert!(wire.get("serverId").is_none());
    }
}
