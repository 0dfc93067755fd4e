//! Periodic flush worker.
//!
//! Hosts that already run a tick can call
//! [`SyncEngine::sync_outgoing`](crate::SyncEngine::sync_outgoing) from it
//! directly; this worker is for hosts that want a standalone cadence.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::SyncEngine;

/// Background task draining a [`SyncEngine`] on a fixed interval.
///
/// Dropping the worker without calling [`FlushWorker::stop`] aborts nothing:
/// the task keeps ticking until the runtime shuts down. `stop` performs one
/// final drain so nothing submitted before shutdown is lost.
pub struct FlushWorker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl FlushWorker {
    /// Spawn the worker onto the current tokio runtime.
    #[must_use]
    pub fn spawn(engine: Arc<SyncEngine>, interval: Duration) -> Self {
        let (shutdown, mut signal) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = tick.tick() => engine.sync_outgoing(),
                    changed = signal.changed() => {
                        if changed.is_err() || *signal.borrow() {
                            break;
                        }
                    }
                }
            }
            engine.sync_outgoing();
            debug!("flush worker stopped");
        });
        Self { shutdown, handle }
    }

    /// Signal shutdown and wait for the final drain.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
