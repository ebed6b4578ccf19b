//! Connectivity classification and restored-edge signalling.
//!
//! OS path updates enter through [`ConnectivityMonitor::update`]; the
//! monitor publishes the current state on a watch channel and emits a
//! restored signal exactly once per disconnected→connected edge. The OS
//! may deliver several path callbacks for the same logical state; those
//! are absorbed here. No retry or backoff logic lives in this module.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

/// Classified connection medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    Wifi,
    Cellular,
    Ethernet,
    Other,
    None,
}

/// Current reachability and path attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityState {
    pub connected: bool,
    pub connection_type: ConnectionType,
    /// Metered path (e.g. cellular data).
    pub is_expensive: bool,
    /// OS asked apps to reduce data usage (e.g. Low Data Mode).
    pub is_constrained: bool,
}

impl ConnectivityState {
    pub fn offline() -> Self {
        Self {
            connected: false,
            connection_type: ConnectionType::None,
            is_expensive: false,
            is_constrained: false,
        }
    }

    pub fn online(connection_type: ConnectionType) -> Self {
        Self {
            connected: true,
            connection_type,
            is_expensive: matches!(connection_type, ConnectionType::Cellular),
            is_constrained: false,
        }
    }
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self::offline()
    }
}

/// Monitors OS-level reachability.
///
/// The restored-signal channel is the sole network-triggered entry point
/// into a sync cycle; everything else reads the watch channel.
pub struct ConnectivityMonitor {
    state_tx: watch::Sender<ConnectivityState>,
    restored_tx: mpsc::UnboundedSender<()>,
}

impl ConnectivityMonitor {
    /// Returns the monitor plus the restored-signal receiver the
    /// scheduler consumes.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<()>) {
        let (state_tx, _) = watch::channel(ConnectivityState::default());
        let (restored_tx, restored_rx) = mpsc::unbounded_channel();
        (
            Self {
                state_tx,
                restored_tx,
            },
            restored_rx,
        )
    }

    /// Subscribe to state transitions.
    pub fn watch(&self) -> watch::Receiver<ConnectivityState> {
        self.state_tx.subscribe()
    }

    /// Snapshot of the current state.
    pub fn current(&self) -> ConnectivityState {
        *self.state_tx.borrow()
    }

    /// Feed one OS path update.
    pub fn update(&self, next: ConnectivityState) {
        let prev = *self.state_tx.borrow();
        if prev == next {
            return;
        }
        let restored = !prev.connected && next.connected;
        self.state_tx.send_replace(next);
        if restored {
            tracing::info!(connection_type = ?next.connection_type, "connectivity restored");
            let _ = self.restored_tx.send(());
        }
    }
}
