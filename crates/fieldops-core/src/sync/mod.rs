//! Offline-first synchronization engine.
//!
//! Keeps the local store consistent with the remote server across
//! unreliable, intermittent and metered connections. One cycle runs
//! upload → download → resolve → cleanup; the [`engine::SyncEngine`]
//! guarantees at most one cycle at a time, and the
//! [`scheduler::SyncScheduler`] feeds it from a recurring timer,
//! connectivity-restored events and OS background windows.

pub mod client;
pub mod codec;
pub mod connectivity;
pub mod download;
pub mod engine;
pub mod resolver;
pub mod scheduler;
pub mod types;
pub mod upload;

#[cfg(test)]
mod download_tests;

pub use client::RemoteClient;
pub use codec::{RemoteRecord, UpdateFeed, UploadAck, WireUpload};
pub use connectivity::{ConnectionType, ConnectivityMonitor, ConnectivityState};
pub use engine::SyncEngine;
pub use resolver::{server_wins, ConflictPolicy, Resolution};
pub use scheduler::{BackgroundRequester, BackgroundWindow, SchedulerHandle, SyncScheduler};
pub use types::{CycleOutcome, SyncError, SyncErrorRecord, SyncPhase, SyncState, SyncTrigger};

use std::time::Duration;

/// Recurring sync interval.
pub const SYNC_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Completed-action bookkeeping rows older than this are purged.
pub const COMPLETED_ACTION_RETENTION_HOURS: i64 = 24;

/// Minimum gap between background-window requests to the OS scheduler.
pub const BACKGROUND_REQUEST_MIN_GAP: Duration = Duration::from_secs(15 * 60);

/// Per-request HTTP timeout, distinct from any cycle deadline.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether an optional background-window deadline has passed.
pub(crate) fn deadline_expired(deadline: Option<tokio::time::Instant>) -> bool {
    deadline.is_some_and(|at| tokio::time::Instant::now() >= at)
}
