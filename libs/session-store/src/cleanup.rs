//! Background session cleanup task
//!
//! Periodically deletes expired session records until told to stop.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::repositories::RecordStore;
use crate::store::SessionStore;

/// Default cleanup interval in seconds.
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300; // 5 minutes

impl<R: RecordStore> SessionStore<R> {
    /// Run [`SessionStore::cleanup`] every `interval` until `quit` fires
    ///
    /// The interval is measured from the end of the previous pass. Sending on
    /// the paired sender or dropping it both stop the loop; a pass that is
    /// already running finishes first, and no new pass starts afterwards.
    pub async fn periodic_cleanup(&self, interval: Duration, mut quit: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                biased;
                _ = &mut quit => break,
                _ = sleep(interval) => {}
            }

            match self.cleanup().await {
                Ok(0) => debug!("Session cleanup: no expired sessions"),
                Ok(_) => {}
                Err(e) => warn!("Session cleanup failed: {}", e),
            }
        }

        debug!("Periodic session cleanup stopped");
    }

    /// Spawn [`SessionStore::periodic_cleanup`] on the current runtime
    pub fn spawn_periodic_cleanup(&self, interval: Duration) -> CleanupTask {
        let (quit, receiver) = oneshot::channel();
        let store = self.clone();
        let handle = tokio::spawn(async move {
            store.periodic_cleanup(interval, receiver).await;
        });

        info!("Started periodic session cleanup every {:?}", interval);
        CleanupTask { quit, handle }
    }
}

/// Handle to a running periodic cleanup task
pub struct CleanupTask {
    quit: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl CleanupTask {
    /// Signal the task to stop and wait for it to exit
    pub async fn stop(self) {
        // the receiver is gone only if the task already exited
        let _ = self.quit.send(());
        if let Err(e) = self.handle.await {
            error!("Session cleanup task failed: {}", e);
        }
    }

    /// Whether the task has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
