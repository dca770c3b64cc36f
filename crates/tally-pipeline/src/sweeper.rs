//! Retention sweep pass.
//!
//! Deletes processed raw events older than the retention window. Runs on a
//! longer cadence than the other passes; the raw store only needs to hold
//! events long enough to cover classification lag and short-term
//! debugging. Unprocessed events are never touched, whatever their age.

use std::{sync::Arc, time::Duration};

use tally_core::{storage::Storage, Clock};
use tracing::{debug, info};

use crate::{chrono_window, error::Result};

/// The retention sweep over processed raw events.
pub struct Sweeper {
    storage: Storage,
    clock: Arc<dyn Clock>,
    retention_window: chrono::Duration,
}

impl Sweeper {
    /// Creates a sweeper retaining processed events for the given window.
    pub fn new(storage: Storage, clock: Arc<dyn Clock>, retention_window: Duration) -> Self {
        Self { storage, clock, retention_window: chrono_window(retention_window) }
    }

    /// Runs one sweep and returns how many events were deleted.
    ///
    /// # Errors
    ///
    /// Returns error if the delete fails.
    pub async fn run_pass(&self) -> Result<u64> {
        let cutoff = self.clock.now() - self.retention_window;
        let deleted = self.storage.raw_events.delete_processed_before(cutoff).await?;

        if deleted > 0 {
            info!(deleted, %cutoff, "retention sweep deleted processed events");
        } else {
            debug!(%cutoff, "retention sweep found nothing to delete");
        }

        Ok(deleted)
    }
}
