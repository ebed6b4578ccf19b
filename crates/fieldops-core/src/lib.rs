//! # FieldOps Core Library
//!
//! Core library for the FieldOps field-service app. The interesting part
//! is the offline-first sync engine: technicians work against the local
//! SQLite store whether or not the van has signal, and the engine
//! reconciles with the server whenever connectivity allows.
//!
//! ## Key Components
//!
//! - [`storage::Database`]: local store for syncable records
//! - [`sync::SyncEngine`]: the cycle state machine (upload → download →
//!   resolve → cleanup)
//! - [`sync::SyncScheduler`]: timer / connectivity / background-window
//!   trigger loop
//! - [`sync::ConnectivityMonitor`]: reachability classification and
//!   restored-edge signalling
//!
//! The engine is constructed once at process start and passed explicitly
//! to anything that triggers or observes sync; there are no process-wide
//! singletons.

pub mod error;
pub mod model;
pub mod storage;
pub mod sync;

pub use error::{ConfigError, StoreError};
pub use model::{
    Chemical, ChemicalTreatment, DeviceRegistration, EntityKind, Job, LocalRecord, Photo,
    SyncStatus,
};
pub use storage::{Config, Database};
pub use sync::{
    ConnectivityMonitor, CycleOutcome, RemoteClient, SyncEngine, SyncError, SyncScheduler,
    SyncState, SyncTrigger,
};
