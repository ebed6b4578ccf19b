//! SQLite-backed local store for syncable records.
//!
//! Provides persistent storage for:
//! - Syncable records (one row per record, payload as JSON)
//! - Conflict snapshots stashed by the merge engine
//! - Completed-action bookkeeping rows (bounded retention)
//! - Key-value store for engine state (sync checkpoint)
//!
//! The sync engine is the only writer of `sync_status` and `server_id`;
//! business logic funnels local edits through [`Database::apply_local_edit`].

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{
    ConflictSnapshot, DeviceRegistration, EntityKind, LocalRecord, MergeOp, SyncStatus,
    UploadOutcome,
};

use super::data_dir;

const CHECKPOINT_KEY: &str = "sync_checkpoint";
const DEVICE_ID_KEY: &str = "device_id";
const DEVICE_RECORD_KEY: &str = "device_registration_local_id";

/// SQLite database holding all syncable local state.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/fieldops/fieldops.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let path = data_dir()?.join("fieldops.db");
        Self::open_at(&path)
    }

    /// Open the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS records (
                    kind          TEXT NOT NULL,
                    local_id      TEXT NOT NULL,
                    server_id     TEXT,
                    sync_status   TEXT NOT NULL,
                    last_modified TEXT NOT NULL,
                    payload       TEXT NOT NULL,
                    PRIMARY KEY (kind, local_id)
                );

                CREATE TABLE IF NOT EXISTS conflict_snapshots (
                    kind                 TEXT NOT NULL,
                    local_id             TEXT NOT NULL,
                    remote_payload       TEXT NOT NULL,
                    remote_last_modified TEXT NOT NULL,
                    PRIMARY KEY (kind, local_id)
                );

                CREATE TABLE IF NOT EXISTS completed_actions (
                    id           INTEGER PRIMARY KEY AUTOINCREMENT,
                    kind         TEXT NOT NULL,
                    local_id     TEXT NOT NULL,
                    action       TEXT NOT NULL,
                    completed_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_records_status ON records(sync_status);
                CREATE UNIQUE INDEX IF NOT EXISTS idx_records_server
                    ON records(kind, server_id) WHERE server_id IS NOT NULL;
                CREATE INDEX IF NOT EXISTS idx_actions_completed_at
                    ON completed_actions(completed_at);",
            )
            .map_err(|e| StoreError::MigrationFailed(e.to_string()))
    }

    /// Insert a new record. Fails if a record with the same kind and
    /// local id already exists; local ids are never reused.
    pub fn insert(&self, record: &LocalRecord) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO records (kind, local_id, server_id, sync_status, last_modified, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.kind.as_str(),
                record.local_id.to_string(),
                record.server_id,
                record.sync_status.as_str(),
                record.last_modified.to_rfc3339(),
                record.payload.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a single record.
    pub fn get(&self, kind: EntityKind, local_id: Uuid) -> Result<Option<LocalRecord>, StoreError> {
        let rows = self.query_records(
            "SELECT kind, local_id, server_id, sync_status, last_modified, payload
             FROM records WHERE kind = ?1 AND local_id = ?2",
            params![kind.as_str(), local_id.to_string()],
        )?;
        Ok(rows.into_iter().next())
    }

    /// Fetch the local record matching a server-assigned id, if any.
    pub fn find_by_server_id(
        &self,
        kind: EntityKind,
        server_id: &str,
    ) -> Result<Option<LocalRecord>, StoreError> {
        let rows = self.query_records(
            "SELECT kind, local_id, server_id, sync_status, last_modified, payload
             FROM records WHERE kind = ?1 AND server_id = ?2",
            params![kind.as_str(), server_id],
        )?;
        Ok(rows.into_iter().next())
    }

    /// All records of one kind in the given status.
    pub fn with_status(
        &self,
        kind: EntityKind,
        status: SyncStatus,
    ) -> Result<Vec<LocalRecord>, StoreError> {
        self.query_records(
            "SELECT kind, local_id, server_id, sync_status, last_modified, payload
             FROM records WHERE kind = ?1 AND sync_status = ?2
             ORDER BY last_modified ASC",
            params![kind.as_str(), status.as_str()],
        )
    }

    /// Count of records per status, for status displays.
    pub fn status_counts(&self) -> Result<Vec<(SyncStatus, u64)>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT sync_status, COUNT(*) FROM records GROUP BY sync_status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            let (status, count) = row?;
            if let Some(status) = SyncStatus::parse(&status) {
                counts.push((status, count));
            }
        }
        Ok(counts)
    }

    /// Apply a local business edit: replace the payload, reset the record
    /// to `Pending` and stamp `last_modified` with now. This is the only
    /// sanctioned path for non-engine code to touch a record.
    pub fn apply_local_edit(
        &self,
        kind: EntityKind,
        local_id: Uuid,
        payload: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let updated = self.conn.execute(
            "UPDATE records SET payload = ?3, sync_status = 'pending', last_modified = ?4
             WHERE kind = ?1 AND local_id = ?2",
            params![
                kind.as_str(),
                local_id.to_string(),
                payload.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::QueryFailed(format!(
                "no {} record with local id {local_id}",
                kind.as_str()
            )));
        }
        Ok(())
    }

    /// Apply a batch of upload outcomes in one transaction.
    ///
    /// Successes get their server id, become `Synced` with `last_modified`
    /// set to `now`, and leave a completed-action row. Failures become
    /// `Failed` and wait for a future cycle.
    pub fn apply_upload_outcomes(
        &mut self,
        outcomes: &[UploadOutcome],
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for outcome in outcomes {
            match &outcome.result {
                Ok(server_id) => {
                    tx.execute(
                        "UPDATE records
                         SET server_id = ?3, sync_status = 'synced', last_modified = ?4
                         WHERE kind = ?1 AND local_id = ?2",
                        params![
                            outcome.kind.as_str(),
                            outcome.local_id.to_string(),
                            server_id,
                            now.to_rfc3339(),
                        ],
                    )?;
                    tx.execute(
                        "INSERT INTO completed_actions (kind, local_id, action, completed_at)
                         VALUES (?1, ?2, 'upload', ?3)",
                        params![
                            outcome.kind.as_str(),
                            outcome.local_id.to_string(),
                            now.to_rfc3339(),
                        ],
                    )?;
                }
                Err(_) => {
                    tx.execute(
                        "UPDATE records SET sync_status = 'failed'
                         WHERE kind = ?1 AND local_id = ?2",
                        params![outcome.kind.as_str(), outcome.local_id.to_string()],
                    )?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Apply a batch of merge operations from the download phase in one
    /// transaction.
    pub fn apply_merge_batch(&mut self, ops: &[MergeOp]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for op in ops {
            match op {
                MergeOp::Insert(record) => {
                    tx.execute(
                        "INSERT INTO records
                             (kind, local_id, server_id, sync_status, last_modified, payload)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            record.kind.as_str(),
                            record.local_id.to_string(),
                            record.server_id,
                            record.sync_status.as_str(),
                            record.last_modified.to_rfc3339(),
                            record.payload.to_string(),
                        ],
                    )?;
                }
                MergeOp::Overwrite {
                    kind,
                    local_id,
                    payload,
                    last_modified,
                } => {
                    tx.execute(
                        "UPDATE records
                         SET payload = ?3, last_modified = ?4, sync_status = 'synced'
                         WHERE kind = ?1 AND local_id = ?2",
                        params![
                            kind.as_str(),
                            local_id.to_string(),
                            payload.to_string(),
                            last_modified.to_rfc3339(),
                        ],
                    )?;
                }
                MergeOp::FlagConflict(snapshot) => {
                    tx.execute(
                        "UPDATE records SET sync_status = 'conflict'
                         WHERE kind = ?1 AND local_id = ?2",
                        params![snapshot.kind.as_str(), snapshot.local_id.to_string()],
                    )?;
                    tx.execute(
                        "INSERT OR REPLACE INTO conflict_snapshots
                             (kind, local_id, remote_payload, remote_last_modified)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![
                            snapshot.kind.as_str(),
                            snapshot.local_id.to_string(),
                            snapshot.remote_payload.to_string(),
                            snapshot.remote_last_modified.to_rfc3339(),
                        ],
                    )?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// All conflicted records, paired with the stashed remote snapshot.
    pub fn conflicts(&self) -> Result<Vec<(LocalRecord, ConflictSnapshot)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT r.kind, r.local_id, r.server_id, r.sync_status, r.last_modified, r.payload,
                    s.remote_payload, s.remote_last_modified
             FROM records r
             JOIN conflict_snapshots s ON s.kind = r.kind AND s.local_id = r.local_id
             WHERE r.sync_status = 'conflict'",
        )?;
        let raw: Vec<(RawRecord, String, String)> = stmt
            .query_map([], |row| {
                Ok((
                    RawRecord {
                        kind: row.get(0)?,
                        local_id: row.get(1)?,
                        server_id: row.get(2)?,
                        sync_status: row.get(3)?,
                        last_modified: row.get(4)?,
                        payload: row.get(5)?,
                    },
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?
            .collect::<Result<_, _>>()?;

        let mut out = Vec::with_capacity(raw.len());
        for (raw_record, remote_payload, remote_ts) in raw {
            let record = raw_record.into_record()?;
            let snapshot = ConflictSnapshot {
                kind: record.kind,
                local_id: record.local_id,
                remote_payload: serde_json::from_str(&remote_payload)?,
                remote_last_modified: parse_ts(&remote_ts)?,
            };
            out.push((record, snapshot));
        }
        Ok(out)
    }

    /// Apply a conflict resolution: rewrite the record and drop the
    /// snapshot, in one transaction.
    pub fn apply_resolution(
        &mut self,
        kind: EntityKind,
        local_id: Uuid,
        payload: &serde_json::Value,
        last_modified: DateTime<Utc>,
        status: SyncStatus,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE records SET payload = ?3, last_modified = ?4, sync_status = ?5
             WHERE kind = ?1 AND local_id = ?2",
            params![
                kind.as_str(),
                local_id.to_string(),
                payload.to_string(),
                last_modified.to_rfc3339(),
                status.as_str(),
            ],
        )?;
        tx.execute(
            "DELETE FROM conflict_snapshots WHERE kind = ?1 AND local_id = ?2",
            params![kind.as_str(), local_id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Delete completed-action rows older than the cutoff. Returns the
    /// number of rows purged.
    pub fn purge_completed_actions(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let purged = self.conn.execute(
            "DELETE FROM completed_actions WHERE completed_at < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(purged)
    }

    /// Number of completed-action rows currently retained.
    pub fn completed_action_count(&self) -> Result<u64, StoreError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM completed_actions", [], |row| {
                row.get::<_, u64>(0)
            })?;
        Ok(count)
    }

    /// The timestamp of the last fully-completed sync cycle, if any.
    pub fn checkpoint(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        match self.kv_get(CHECKPOINT_KEY)? {
            Some(raw) => Ok(Some(parse_ts(&raw)?)),
            None => Ok(None),
        }
    }

    /// Advance the sync checkpoint.
    pub fn set_checkpoint(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.kv_set(CHECKPOINT_KEY, &at.to_rfc3339())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// This device's stable identity, minted on first use and persisted.
    pub fn device_id(&self) -> Result<Uuid, StoreError> {
        if let Some(raw) = self.kv_get(DEVICE_ID_KEY)? {
            return Uuid::parse_str(&raw)
                .map_err(|e| StoreError::QueryFailed(format!("bad device id '{raw}': {e}")));
        }
        let id = Uuid::new_v4();
        self.kv_set(DEVICE_ID_KEY, &id.to_string())?;
        Ok(id)
    }

    /// Create or update this device's registration record and queue it
    /// for upload. There is at most one registration record per store;
    /// repeating the call edits it in place rather than minting another.
    pub fn upsert_device_registration(
        &self,
        registration: &DeviceRegistration,
    ) -> Result<Uuid, StoreError> {
        if let Some(raw) = self.kv_get(DEVICE_RECORD_KEY)? {
            if let Ok(local_id) = Uuid::parse_str(&raw) {
                if self.get(EntityKind::DeviceRegistration, local_id)?.is_some() {
                    let payload = serde_json::to_value(registration)?;
                    self.apply_local_edit(EntityKind::DeviceRegistration, local_id, &payload)?;
                    return Ok(local_id);
                }
            }
        }
        let record = LocalRecord::new_pending(EntityKind::DeviceRegistration, registration)?;
        self.insert(&record)?;
        self.kv_set(DEVICE_RECORD_KEY, &record.local_id.to_string())?;
        Ok(record.local_id)
    }

    fn query_records(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<LocalRecord>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let raw: Vec<RawRecord> = stmt
            .query_map(params, |row| {
                Ok(RawRecord {
                    kind: row.get(0)?,
                    local_id: row.get(1)?,
                    server_id: row.get(2)?,
                    sync_status: row.get(3)?,
                    last_modified: row.get(4)?,
                    payload: row.get(5)?,
                })
            })?
            .collect::<Result<_, _>>()?;

        raw.into_iter().map(RawRecord::into_record).collect()
    }
}

/// Row image before timestamp/uuid/json conversion.
struct RawRecord {
    kind: String,
    local_id: String,
    server_id: Option<String>,
    sync_status: String,
    last_modified: String,
    payload: String,
}

impl RawRecord {
    fn into_record(self) -> Result<LocalRecord, StoreError> {
        let kind = EntityKind::parse(&self.kind)
            .ok_or_else(|| StoreError::QueryFailed(format!("unknown kind '{}'", self.kind)))?;
        let sync_status = SyncStatus::parse(&self.sync_status).ok_or_else(|| {
            StoreError::QueryFailed(format!("unknown sync status '{}'", self.sync_status))
        })?;
        let local_id = Uuid::parse_str(&self.local_id)
            .map_err(|e| StoreError::QueryFailed(format!("bad local id: {e}")))?;
        Ok(LocalRecord {
            kind,
            local_id,
            server_id: self.server_id,
            sync_status,
            last_modified: parse_ts(&self.last_modified)?,
            payload: serde_json::from_str(&self.payload)?,
        })
    }
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::QueryFailed(format!("bad timestamp '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Job;
    use chrono::Duration;

    fn sample_job() -> Job {
        Job {
            site_name: "Harbour Depot".to_string(),
            address: "3 Quay Road".to_string(),
            scheduled_for: Utc::now(),
            status: "scheduled".to_string(),
            notes: None,
        }
    }

    #[test]
    fn insert_and_fetch_by_status() {
        let db = Database::open_memory().unwrap();
        let record = LocalRecord::new_pending(EntityKind::Job, &sample_job()).unwrap();
        db.insert(&record).unwrap();

        let pending = db.with_status(EntityKind::Job, SyncStatus::Pending).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].local_id, record.local_id);
        assert!(db
            .with_status(EntityKind::Job, SyncStatus::Synced)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn upload_outcomes_update_status_and_log_actions() {
        let mut db = Database::open_memory().unwrap();
        let ok = LocalRecord::new_pending(EntityKind::Job, &sample_job()).unwrap();
        let bad = LocalRecord::new_pending(EntityKind::Job, &sample_job()).unwrap();
        db.insert(&ok).unwrap();
        db.insert(&bad).unwrap();

        let now = Utc::now();
        db.apply_upload_outcomes(
            &[
                UploadOutcome {
                    kind: EntityKind::Job,
                    local_id: ok.local_id,
                    result: Ok("srv-1".to_string()),
                },
                UploadOutcome {
                    kind: EntityKind::Job,
                    local_id: bad.local_id,
                    result: Err("boom".to_string()),
                },
            ],
            now,
        )
        .unwrap();

        let synced = db.get(EntityKind::Job, ok.local_id).unwrap().unwrap();
        assert_eq!(synced.sync_status, SyncStatus::Synced);
        assert_eq!(synced.server_id.as_deref(), Some("srv-1"));

        let failed = db.get(EntityKind::Job, bad.local_id).unwrap().unwrap();
        assert_eq!(failed.sync_status, SyncStatus::Failed);
        assert!(failed.server_id.is_none());

        assert_eq!(db.completed_action_count().unwrap(), 1);
    }

    #[test]
    fn merge_batch_and_conflict_snapshot() {
        let mut db = Database::open_memory().unwrap();
        let record = LocalRecord::new_pending(EntityKind::Job, &sample_job()).unwrap();
        db.insert(&record).unwrap();

        let remote_payload = serde_json::json!({"status": "done"});
        let remote_ts = record.last_modified - Duration::minutes(5);
        db.apply_merge_batch(&[MergeOp::FlagConflict(ConflictSnapshot {
            kind: EntityKind::Job,
            local_id: record.local_id,
            remote_payload: remote_payload.clone(),
            remote_last_modified: remote_ts,
        })])
        .unwrap();

        let conflicts = db.conflicts().unwrap();
        assert_eq!(conflicts.len(), 1);
        let (local, snapshot) = &conflicts[0];
        assert_eq!(local.sync_status, SyncStatus::Conflict);
        // Local payload untouched by the conflict flag.
        assert_eq!(local.payload, record.payload);
        assert_eq!(snapshot.remote_payload, remote_payload);

        db.apply_resolution(
            EntityKind::Job,
            record.local_id,
            &remote_payload,
            remote_ts,
            SyncStatus::Synced,
        )
        .unwrap();
        assert!(db.conflicts().unwrap().is_empty());
        let resolved = db.get(EntityKind::Job, record.local_id).unwrap().unwrap();
        assert_eq!(resolved.sync_status, SyncStatus::Synced);
        assert_eq!(resolved.payload, remote_payload);
    }

    #[test]
    fn purge_respects_retention_cutoff() {
        let mut db = Database::open_memory().unwrap();
        let old = LocalRecord::new_pending(EntityKind::Job, &sample_job()).unwrap();
        let fresh = LocalRecord::new_pending(EntityKind::Job, &sample_job()).unwrap();
        db.insert(&old).unwrap();
        db.insert(&fresh).unwrap();

        let now = Utc::now();
        db.apply_upload_outcomes(
            &[UploadOutcome {
                kind: EntityKind::Job,
                local_id: old.local_id,
                result: Ok("srv-old".to_string()),
            }],
            now - Duration::hours(30),
        )
        .unwrap();
        db.apply_upload_outcomes(
            &[UploadOutcome {
                kind: EntityKind::Job,
                local_id: fresh.local_id,
                result: Ok("srv-new".to_string()),
            }],
            now - Duration::hours(2),
        )
        .unwrap();

        let purged = db.purge_completed_actions(now - Duration::hours(24)).unwrap();
        assert_eq!(purged, 1);
        assert_eq!(db.completed_action_count().unwrap(), 1);
    }

    #[test]
    fn device_registration_upserts_one_record() {
        let db = Database::open_memory().unwrap();
        let device_id = db.device_id().unwrap();
        assert_eq!(db.device_id().unwrap(), device_id);

        let mut registration = DeviceRegistration {
            device_id,
            device_name: "truck-7".to_string(),
            platform: "linux".to_string(),
            push_token: None,
        };
        let first = db.upsert_device_registration(&registration).unwrap();

        registration.device_name = "truck-9".to_string();
        let second = db.upsert_device_registration(&registration).unwrap();
        assert_eq!(first, second);

        let pending = db
            .with_status(EntityKind::DeviceRegistration, SyncStatus::Pending)
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload["deviceName"], "truck-9");
        assert_eq!(pending[0].payload["deviceId"], device_id.to_string());
    }

    #[test]
    fn checkpoint_round_trip() {
        let db = Database::open_memory().unwrap();
        assert!(db.checkpoint().unwrap().is_none());

        let at = Utc::now();
        db.set_checkpoint(at).unwrap();
        let loaded = db.checkpoint().unwrap().unwrap();
        assert_eq!(loaded.timestamp(), at.timestamp());
    }

    #[test]
    fn local_edit_resets_to_pending() {
        let mut db = Database::open_memory().unwrap();
        let record = LocalRecord::new_pending(EntityKind::Job, &sample_job()).unwrap();
        db.insert(&record).unwrap();
        db.apply_upload_outcomes(
            &[UploadOutcome {
                kind: EntityKind::Job,
                local_id: record.local_id,
                result: Ok("srv-9".to_string()),
            }],
            Utc::now(),
        )
        .unwrap();

        db.apply_local_edit(
            EntityKind::Job,
            record.local_id,
            &serde_json::json!({"status": "in_progress"}),
        )
        .unwrap();

        let edited = db.get(EntityKind::Job, record.local_id).unwrap().unwrap();
        assert_eq!(edited.sync_status, SyncStatus::Pending);
        // Server id survives local edits.
        assert_eq!(edited.server_id.as_deref(), Some("srv-9"));
    }
}
