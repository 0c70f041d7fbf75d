//! Background expiry sweep for [`SessionStore`].

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::store::SessionStore;

const MIN_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_millis(1);

/// Handle to a running sweep task.
///
/// Dropping the handle aborts the task; [`SweeperHandle::shutdown`] stops it
/// gracefully and waits for it to exit.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop and wait for it.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(|t| t.is_finished()).unwrap_or(true)
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl SessionStore {
    /// Spawn the periodic expiry sweep on the current tokio runtime.
    ///
    /// The task holds only a weak reference: it exits on its own once the
    /// store is dropped, and as a detached tokio task it never keeps the
    /// process alive.
    pub fn start_sweeper(self: &Arc<Self>) -> SweeperHandle {
        let store = Arc::downgrade(self);
        let period = self.config().sweep_interval.max(MIN_SWEEP_INTERVAL);
        let (tx, mut rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(store) = store.upgrade() else {
                            debug!("session store dropped, sweeper exiting");
                            break;
                        };
                        let removed = store.sweep_expired();
                        if removed > 0 {
                            info!(event = "session.sweep", removed, remaining = store.len());
                        }
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            debug!("sweeper shutdown requested");
                            break;
                        }
                    }
                }
            }
        });

        SweeperHandle {
            shutdown: tx,
            task: Some(task),
        }
    }
}
