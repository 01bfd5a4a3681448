//! Handle for controlling running samplers.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

/// Controls the samplers started by [`Monitor::start_sampling`](crate::Monitor::start_sampling).
///
/// Drop this handle to stop sampling, call [`SamplingHandle::cancel`] to
/// signal without waiting, or [`SamplingHandle::stop`] to signal and wait for
/// every sampler to exit.
#[derive(Debug)]
pub struct SamplingHandle {
    stop_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SamplingHandle {
    pub(crate) fn new(stop_tx: watch::Sender<bool>, tasks: Vec<JoinHandle<()>>) -> Self {
        Self { stop_tx, tasks }
    }

    /// Signal every sampler to stop. No new probes start after this returns,
    /// and results of probes already in flight are discarded.
    pub fn cancel(&self) {
        let _ = self.stop_tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Number of samplers started with this handle.
    pub fn sampler_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal the samplers and wait for them to exit.
    ///
    /// Waiting includes any probe still in flight, which is bounded by the
    /// probe's own timeout.
    pub async fn stop(self) {
        self.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("sampler task ended abnormally: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_is_visible_to_receivers() {
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = SamplingHandle::new(stop_tx, Vec::new());

        assert!(!handle.is_cancelled());
        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(*stop_rx.borrow());
        assert_eq!(handle.sampler_count(), 0);

        handle.stop().await;
    }

    #[tokio::test]
    async fn stop_survives_panicking_sampler() {
        let (stop_tx, _stop_rx) = watch::channel(false);
        let task = tokio::spawn(async { panic!("probe blew up") });
        let handle = SamplingHandle::new(stop_tx, vec![task]);

        handle.stop().await;
    }
}
