//! Coarse-grained cancellation for workflow runs.
//!
//! The orchestrator only looks at the signal at run start and between steps;
//! a step already in flight runs to completion.

use tokio::sync::watch;

/// Owner side of an abort signal.
#[derive(Debug)]
pub struct AbortController {
    tx: watch::Sender<bool>,
}

impl AbortController {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Request an abort. Idempotent.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side, cloned into every run that should honour the abort.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// A signal whose controller is already gone; it never fires.
    pub fn never() -> Self {
        AbortController::new().signal()
    }

    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the abort is requested. Pends forever if the controller
    /// is dropped without aborting.
    pub async fn aborted(&mut self) {
        if self.rx.wait_for(|aborted| *aborted).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_signal_observes_abort() {
        let controller = AbortController::new();
        let a = controller.signal();
        let b = a.clone();
        assert!(!a.is_aborted());
        controller.abort();
        controller.abort();
        assert!(a.is_aborted());
        assert!(b.is_aborted());
        assert!(controller.is_aborted());
    }

    #[test]
    fn test_never_signal() {
        assert!(!AbortSignal::never().is_aborted());
    }

    #[test]
    fn test_abort_survives_controller_drop() {
        let controller = AbortController::new();
        let signal = controller.signal();
        controller.abort();
        drop(controller);
        assert!(signal.is_aborted());
    }

    #[tokio::test]
    async fn test_aborted_future_resolves() {
        let controller = AbortController::new();
        let mut signal = controller.signal();
        let waiter = tokio::spawn(async move { signal.aborted().await });
        controller.abort();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("resolved in time")
            .expect("task joined");
    }
}
