//! Stats reconciliation pass.
//!
//! Recomputes the cached stats snapshot for every campaign touched within
//! the recency window, then evicts markers that fell outside it. A
//! campaign that stops receiving events ages out naturally: its last
//! in-window pass gives it a final accurate recompute, and a later pass
//! deletes the marker. A recompute may race an in-flight fold and observe
//! partial state; the next pass corrects the snapshot.

use std::{sync::Arc, time::Duration};

use tally_core::{models::CampaignId, storage::Storage, CampaignStats, Clock};
use tracing::{debug, warn};

use crate::{chrono_window, error::Result};

/// Counters for one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Campaigns whose stats snapshot was recomputed.
    pub recomputed: usize,
    /// Campaigns whose recompute failed; retried while still in-window.
    pub failed: usize,
    /// Stale markers deleted after recomputation.
    pub evicted: u64,
}

/// The reconciliation pass over recently-active campaigns.
pub struct Reconciler {
    storage: Storage,
    clock: Arc<dyn Clock>,
    recency_window: chrono::Duration,
}

impl Reconciler {
    /// Creates a reconciler scoping recomputation to the given window.
    pub fn new(storage: Storage, clock: Arc<dyn Clock>, recency_window: Duration) -> Self {
        Self { storage, clock, recency_window: chrono_window(recency_window) }
    }

    /// Runs one reconciliation pass.
    ///
    /// Recomputation failures are isolated per campaign; eviction runs
    /// regardless so stale markers cannot pile up behind one bad
    /// aggregate.
    ///
    /// # Errors
    ///
    /// Returns error if listing the in-window markers or deleting the
    /// stale ones fails.
    pub async fn run_pass(&self) -> Result<ReconcileSummary> {
        let cutoff = self.clock.now() - self.recency_window;
        let markers = self.storage.active_campaigns.find_touched_since(cutoff).await?;

        let mut summary = ReconcileSummary::default();
        for marker in &markers {
            match self.recompute(marker.campaign_id).await {
                Ok(stats) => {
                    debug!(campaign_id = %marker.campaign_id, ?stats, "stats recomputed");
                    summary.recomputed += 1;
                },
                Err(error) => {
                    warn!(
                        campaign_id = %marker.campaign_id,
                        error = %error,
                        "stats recompute failed, will retry next pass"
                    );
                    summary.failed += 1;
                },
            }
        }

        summary.evicted = self.storage.active_campaigns.delete_touched_before(cutoff).await?;

        if !markers.is_empty() || summary.evicted > 0 {
            debug!(
                recomputed = summary.recomputed,
                failed = summary.failed,
                evicted = summary.evicted,
                "reconciliation pass complete"
            );
        }

        Ok(summary)
    }

    /// Recomputes and persists the snapshot for one campaign.
    async fn recompute(&self, campaign_id: CampaignId) -> tally_core::Result<CampaignStats> {
        let stats = self.storage.campaigns.engagement_counts(campaign_id).await?;
        self.storage.campaigns.set_stats(campaign_id, &stats).await?;

        Ok(stats)
    }
}
