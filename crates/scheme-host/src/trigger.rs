//! Resume trigger: background task that periodically resumes the most
//! recently created deferred responder.
//!
//! The trigger is the only source of progress for a paused read. It runs on
//! its own tokio task, independent of the host thread, and tolerates resumes
//! that find nothing paused.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::registry::ResponderRegistry;

pub struct ResumeTrigger {
    handle: JoinHandle<u64>,
    shutdown_tx: watch::Sender<bool>,
}

impl ResumeTrigger {
    /// Start calling [`ResponderRegistry::resume_most_recent`] every
    /// `interval`. Must be called from within a tokio runtime.
    pub fn spawn(registry: Arc<ResponderRegistry>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_resume_loop(registry, interval, shutdown_rx));
        debug!(interval_ms = interval.as_millis() as u64, "resume trigger started");
        Self { handle, shutdown_tx }
    }

    /// Stop the trigger and wait for its task to exit.
    ///
    /// Returns the number of resumes that fired a continuation.
    pub async fn shutdown(self) -> u64 {
        let _ = self.shutdown_tx.send(true);
        match self.handle.await {
            Ok(fired) => fired,
            Err(e) => {
                debug!(error = %e, "resume trigger task did not finish cleanly");
                0
            }
        }
    }
}

impl std::fmt::Debug for ResumeTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumeTrigger")
            .field("finished", &self.handle.is_finished())
            .finish_non_exhaustive()
    }
}

async fn run_resume_loop(
    registry: Arc<ResponderRegistry>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut fired = 0;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                if registry.resume_most_recent() {
                    fired += 1;
                    info!(resumes = fired, "resumed paused read");
                }
            }
            _ = shutdown.changed() => {
                debug!(resumes = fired, "resume trigger shutting down");
                break;
            }
        }
    }

    fired
}
