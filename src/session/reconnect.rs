use std::{sync::atomic::Ordering, time::Duration};

use log::{debug, error, info, warn};
use tokio::{select, time::sleep};

use super::{LinkError, LinkState, Shared};
use crate::connection::Transport;

/// Fixed backoff between reopen attempts.
pub const REOPEN_INTERVAL: Duration = Duration::from_secs(1);

impl<T: Transport> Shared<T> {
    /// Closes and reopens the port until it succeeds or shutdown is signalled.
    ///
    /// `observed` is the link generation the caller was using when its I/O failed. If the
    /// link has been reopened since, the failure belonged to the old port and this returns
    /// immediately. Concurrent callers queue on the reconnect lock, so only one reopen
    /// sequence runs at a time.
    pub(super) async fn reconnect(&self, observed: u64) -> Result<(), LinkError> {
        let _guard = self.reconnect_lock.lock().await;
        if self.generation() != observed {
            debug!("Port was already reopened, skipping reconnection");
            return Ok(());
        }

        let mut shutdown = self.shutdown.clone();
        self.set_state(LinkState::Reopening);
        warn!("Attempting to reopen port");

        loop {
            if self.is_shutting_down() {
                return Err(LinkError::Shutdown);
            }

            if self.transport.is_open() {
                if let Err(e) = self.transport.close().await {
                    warn!("Error while closing port: {e}");
                }
            }

            match self.transport.open(&self.device, &self.settings).await {
                Ok(()) => {
                    self.generation.fetch_add(1, Ordering::AcqRel);
                    self.set_state(LinkState::Open);
                    info!("Successfully reopened port");
                    return Ok(());
                }
                Err(e) => {
                    error!("Error while reopening port: {e}");
                    select! {
                        biased;
                        _ = shutdown.changed() => return Err(LinkError::Shutdown),
                        _ = sleep(REOPEN_INTERVAL) => {}
                    }
                }
            }
        }
    }
}
