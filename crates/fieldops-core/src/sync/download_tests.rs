//! Tests for the download and merge engine.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crate::model::{EntityKind, LocalRecord, MergeOp, SyncStatus};
    use crate::storage::Database;
    use crate::sync::client::RemoteClient;
    use crate::sync::codec::RemoteRecord;
    use crate::sync::download::{self, decide_merge};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn remote(server_id: &str, last_modified: DateTime<Utc>) -> RemoteRecord {
        RemoteRecord {
            server_id: server_id.to_string(),
            last_modified,
            payload: serde_json::json!({"status": "from server"}),
        }
    }

    fn local(
        server_id: &str,
        status: SyncStatus,
        last_modified: DateTime<Utc>,
    ) -> LocalRecord {
        LocalRecord {
            kind: EntityKind::Job,
            local_id: Uuid::new_v4(),
            server_id: Some(server_id.to_string()),
            sync_status: status,
            last_modified,
            payload: serde_json::json!({"status": "local"}),
        }
    }

    #[test]
    fn unknown_server_id_inserts_synced_record() {
        let incoming = remote("srv-1", Utc::now());
        let op = decide_merge(EntityKind::Job, None, &incoming).unwrap();
        match op {
            MergeOp::Insert(record) => {
                assert_eq!(record.sync_status, SyncStatus::Synced);
                assert_eq!(record.server_id.as_deref(), Some("srv-1"));
                assert_eq!(record.payload, incoming.payload);
            }
            other => panic!("expected insert, got {other:?}"),
        }
    }

    #[test]
    fn strictly_newer_incoming_overwrites() {
        let now = Utc::now();
        let existing = local("srv-1", SyncStatus::Synced, now - Duration::minutes(10));
        let incoming = remote("srv-1", now);
        let op = decide_merge(EntityKind::Job, Some(&existing), &incoming).unwrap();
        assert!(matches!(op, MergeOp::Overwrite { .. }));
    }

    #[test]
    fn stale_delivery_to_synced_record_is_ignored() {
        // A record uploaded at T1 then re-delivered by the feed at T2 < T1
        // stays untouched and is not a conflict.
        let now = Utc::now();
        let existing = local("srv-1", SyncStatus::Synced, now);
        let incoming = remote("srv-1", now - Duration::minutes(3));
        assert_eq!(decide_merge(EntityKind::Job, Some(&existing), &incoming), None);
    }

    #[test]
    fn equal_timestamps_on_synced_record_are_ignored() {
        let now = Utc::now();
        let existing = local("srv-1", SyncStatus::Synced, now);
        let incoming = remote("srv-1", now);
        assert_eq!(decide_merge(EntityKind::Job, Some(&existing), &incoming), None);
    }

    #[test]
    fn diverged_local_record_conflicts_on_same_or_older_incoming() {
        let now = Utc::now();
        for status in [SyncStatus::Pending, SyncStatus::Failed] {
            let existing = local("srv-1", status, now);
            let incoming = remote("srv-1", now - Duration::minutes(1));
            let op = decide_merge(EntityKind::Job, Some(&existing), &incoming).unwrap();
            match op {
                MergeOp::FlagConflict(snapshot) => {
                    assert_eq!(snapshot.local_id, existing.local_id);
                    assert_eq!(snapshot.remote_payload, incoming.payload);
                }
                other => panic!("expected conflict, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn run_merges_feed_and_reports_counts() {
        let now = Utc::now();
        let feed = serde_json::json!({
            "jobs": [
                {
                    "serverId": "srv-new",
                    "lastModified": now.to_rfc3339(),
                    "siteName": "New Site",
                    "status": "scheduled"
                },
                {
                    "serverId": "srv-known",
                    "lastModified": now.to_rfc3339(),
                    "status": "done"
                }
            ]
        });

        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/updates")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(feed.to_string())
            .create_async()
            .await;

        let db = Arc::new(Mutex::new(Database::open_memory().unwrap()));
        let existing = local(
            "srv-known",
            SyncStatus::Synced,
            now - Duration::minutes(30),
        );
        db.lock().unwrap().insert(&existing).unwrap();

        let client = Arc::new(RemoteClient::new(&server.url(), None).unwrap());
        let before = Utc::now();
        let (report, fetched_at) = download::run(&db, &client, None).await.unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.overwritten, 1);
        assert_eq!(report.conflicted, 0);
        assert!(fetched_at >= before && fetched_at <= Utc::now());

        let db = db.lock().unwrap();
        let overwritten = db
            .find_by_server_id(EntityKind::Job, "srv-known")
            .unwrap()
            .unwrap();
        assert_eq!(overwritten.sync_status, SyncStatus::Synced);
        assert_eq!(overwritten.payload["status"], "done");
        assert!(db
            .find_by_server_id(EntityKind::Job, "srv-new")
            .unwrap()
            .is_some());
    }

    proptest! {
        // Merge monotonicity: strictly-newer incoming always overwrites
        // and leaves the record synced; same-or-older incoming never
        // touches the local payload.
        #[test]
        fn merge_is_monotonic(
            local_offset_secs in 0i64..=86_400,
            incoming_offset_secs in 0i64..=86_400,
            diverged in any::<bool>(),
        ) {
            let base = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
            let local_ts = base + Duration::seconds(local_offset_secs);
            let incoming_ts = base + Duration::seconds(incoming_offset_secs);
            let status = if diverged { SyncStatus::Pending } else { SyncStatus::Synced };

            let existing = local("srv-p", status, local_ts);
            let incoming = remote("srv-p", incoming_ts);
            let op = decide_merge(EntityKind::Job, Some(&existing), &incoming);

            if incoming_ts > local_ts {
                match op {
                    Some(MergeOp::Overwrite { payload, last_modified, .. }) => {
                        prop_assert_eq!(payload, incoming.payload);
                        prop_assert_eq!(last_modified, incoming_ts);
                    }
                    other => prop_assert!(false, "expected overwrite, got {:?}", other),
                }
            } else if diverged {
                prop_assert!(matches!(op, Some(MergeOp::FlagConflict(_))));
            } else {
                prop_assert_eq!(op, None);
            }
        }
    }
}
