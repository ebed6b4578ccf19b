//! Core types for the sync engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Sync failure taxonomy.
///
/// Per-record failures are recorded on the record itself (`Failed` or
/// `Conflict`); these errors describe cycle-level trouble. Nothing here is
/// fatal to the process: every path degrades to "try again next cycle".
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// No connectivity, connection reset, request timeout.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Server answered with a non-success status.
    #[error("server returned status {0}")]
    Server(u16),

    /// Response arrived but could not be decoded.
    #[error("malformed server response: {0}")]
    Decode(String),

    /// The local store failed.
    #[error("local store failure: {0}")]
    Persistence(#[from] StoreError),
}

impl SyncError {
    /// Whether a future cycle can reasonably retry after this error.
    pub fn retryable(&self) -> bool {
        match self {
            SyncError::Transport(_) => true,
            SyncError::Server(code) => *code >= 500 || *code == 408 || *code == 429,
            SyncError::Decode(_) | SyncError::Persistence(_) => false,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            SyncError::Server(status.as_u16())
        } else if err.is_decode() {
            SyncError::Decode(err.to_string())
        } else {
            SyncError::Transport(err.to_string())
        }
    }
}

/// One cycle-level failure, surfaced to the UI layer. Ephemeral: lives on
/// the published engine state, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncErrorRecord {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub retryable: bool,
}

/// Current phase of the sync state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Uploading,
    Downloading,
    Resolving,
    CleaningUp,
}

/// Engine state published at phase boundaries for UI binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub is_syncing: bool,
    pub phase: SyncPhase,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub errors: Vec<SyncErrorRecord>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            is_syncing: false,
            phase: SyncPhase::Idle,
            last_sync_at: None,
            errors: Vec::new(),
        }
    }
}

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// The recurring timer fired while connected.
    Periodic,
    /// Connectivity came back after an outage.
    ConnectivityRestored,
    /// Explicit request, ignores connectivity.
    Manual,
    /// OS-granted opportunistic execution window.
    BackgroundWindow,
}

/// How a cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    /// All four phases ran; the checkpoint advanced.
    Completed,
    /// Another cycle was already running; this trigger was dropped.
    Skipped,
    /// The background window deadline expired mid-cycle. Work already
    /// persisted is kept; the checkpoint did not advance.
    Expired,
    /// A cycle-level error aborted the cycle; the checkpoint did not
    /// advance.
    Failed(SyncError),
}

/// Why a phase stopped the cycle early.
#[derive(Debug)]
pub(crate) enum PhaseAbort {
    Expired,
    Fatal(SyncError),
}

impl From<SyncError> for PhaseAbort {
    fn from(err: SyncError) -> Self {
        PhaseAbort::Fatal(err)
    }
}

impl From<StoreError> for PhaseAbort {
    fn from(err: StoreError) -> Self {
        PhaseAbort::Fatal(SyncError::Persistence(err))
    }
}
