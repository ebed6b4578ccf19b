//! Cooperative trigger loop.
//!
//! Drives the engine from a recurring timer, connectivity-restored
//! signals, manual triggers and OS-granted background windows, in the
//! style of a daemon main loop. Only the periodic trigger is gated on
//! connectivity; a manual trigger always runs and a background window is
//! the OS's own judgement call.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use super::connectivity::ConnectivityState;
use super::engine::SyncEngine;
use super::types::{CycleOutcome, SyncTrigger};
use super::{BACKGROUND_REQUEST_MIN_GAP, SYNC_INTERVAL};

/// An OS-granted opportunistic execution window.
#[derive(Debug)]
pub struct BackgroundWindow {
    /// OS-imposed expiration for this window.
    pub deadline: Instant,
    /// Reports back to the OS scheduler: `true` when the cycle finished
    /// before the deadline.
    pub completion: oneshot::Sender<bool>,
}

/// Rate limiter for background window requests to the OS scheduler.
#[derive(Debug, Default)]
pub struct BackgroundRequester {
    last_request: Option<Instant>,
}

impl BackgroundRequester {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a new window may be requested now; stamps the request time
    /// when it may. Requests are kept at least fifteen minutes apart.
    pub fn try_request(&mut self) -> bool {
        let now = Instant::now();
        match self.last_request {
            Some(last) if now.duration_since(last) < BACKGROUND_REQUEST_MIN_GAP => false,
            _ => {
                self.last_request = Some(now);
                true
            }
        }
    }
}

/// Channels for feeding the scheduler from the outside.
pub struct SchedulerHandle {
    /// Explicit sync-now trigger (ignores connectivity).
    pub manual: mpsc::UnboundedSender<()>,
    /// OS background-window grants.
    pub windows: mpsc::Sender<BackgroundWindow>,
    /// Requests the scheduler makes for future background windows; the OS
    /// glue forwards these to the platform task scheduler.
    pub window_requests: mpsc::UnboundedReceiver<()>,
    /// Stops the loop.
    pub shutdown: oneshot::Sender<()>,
}

/// The trigger loop around a [`SyncEngine`].
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    connectivity: watch::Receiver<ConnectivityState>,
    restored: mpsc::UnboundedReceiver<()>,
    manual: mpsc::UnboundedReceiver<()>,
    windows: mpsc::Receiver<BackgroundWindow>,
    window_request_tx: mpsc::UnboundedSender<()>,
    requester: BackgroundRequester,
    shutdown: oneshot::Receiver<()>,
}

impl SyncScheduler {
    pub fn new(
        engine: Arc<SyncEngine>,
        connectivity: watch::Receiver<ConnectivityState>,
        restored: mpsc::UnboundedReceiver<()>,
    ) -> (Self, SchedulerHandle) {
        let (manual_tx, manual_rx) = mpsc::unbounded_channel();
        let (window_tx, window_rx) = mpsc::channel(4);
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        (
            Self {
                engine,
                connectivity,
                restored,
                manual: manual_rx,
                windows: window_rx,
                window_request_tx: request_tx,
                requester: BackgroundRequester::new(),
                shutdown: shutdown_rx,
            },
            SchedulerHandle {
                manual: manual_tx,
                windows: window_tx,
                window_requests: request_rx,
                shutdown: shutdown_tx,
            },
        )
    }

    /// Main event loop; runs until shutdown.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(SYNC_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.connectivity.borrow().connected {
                        self.engine.sync_cycle(SyncTrigger::Periodic, None).await;
                    } else {
                        tracing::debug!("periodic tick while offline, skipping");
                    }
                }
                Some(()) = self.restored.recv() => {
                    self.engine
                        .sync_cycle(SyncTrigger::ConnectivityRestored, None)
                        .await;
                }
                Some(()) = self.manual.recv() => {
                    self.engine.sync_cycle(SyncTrigger::Manual, None).await;
                }
                Some(window) = self.windows.recv() => {
                    self.run_window(window).await;
                }
                _ = &mut self.shutdown => {
                    tracing::info!("sync scheduler shutting down");
                    break;
                }
            }
        }
    }

    async fn run_window(&mut self, window: BackgroundWindow) {
        let outcome = self
            .engine
            .sync_cycle(SyncTrigger::BackgroundWindow, Some(window.deadline))
            .await;

        let completed = matches!(outcome, CycleOutcome::Completed);
        if matches!(outcome, CycleOutcome::Expired) && self.requester.try_request() {
            tracing::info!("window expired mid-cycle, requesting another");
            let _ = self.window_request_tx.send(());
        }
        let _ = window.completion.send(completed);
    }
}
