//! Event classification and fold pass.
//!
//! Pulls unprocessed raw events in arrival order, decides the envelope
//! shape once, validates the campaign identifier, folds the event into the
//! campaign's engagement state, touches the active-campaign marker, and
//! marks the event processed.
//!
//! The fold is commutative for the set-based kinds (set union), so strict
//! arrival ordering is a fairness concern rather than a correctness one;
//! bounce records are append-only and preserve arrival order naturally.

use std::sync::Arc;

use tally_core::{
    envelope::{EngagementEvent, Envelope, EventKind},
    models::{CampaignId, EngagementSet, RawEvent},
    storage::Storage,
    Clock,
};
use tracing::{debug, warn};

use crate::error::Result;

/// The fold a given event kind maps to.
///
/// Pure classification table, separated from the I/O so the mapping can be
/// tested and reasoned about on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldAction {
    /// Add the recipient to one engagement set.
    AddTo(EngagementSet),
    /// Append to the campaign's bounce list.
    RecordBounce,
    /// Recognized envelope, kind not classified; fold is a no-op.
    Ignore,
}

impl FoldAction {
    /// Classification table from provider event kind to fold.
    pub fn for_kind(kind: EventKind) -> Self {
        match kind {
            EventKind::Delivery => Self::AddTo(EngagementSet::Delivered),
            EventKind::Click => Self::AddTo(EngagementSet::Clicked),
            EventKind::Open | EventKind::InitialOpen => Self::AddTo(EngagementSet::Opened),
            EventKind::Bounce => Self::RecordBounce,
            EventKind::SpamComplaint => Self::AddTo(EngagementSet::Complained),
            EventKind::ListUnsubscribe | EventKind::LinkUnsubscribe => {
                Self::AddTo(EngagementSet::Unsubscribed)
            },
            EventKind::Other => Self::Ignore,
        }
    }
}

/// Why an event was skipped and left unprocessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// None of the three known envelope shapes was present.
    ///
    /// Deliberately not marked processed: the shape is unknown, not
    /// invalid, and the event is kept for manual inspection.
    UnrecognizedShape,
    /// Campaign identifier missing or not numeric.
    ///
    /// Non-numeric identifiers belong to an identifier namespace this
    /// pipeline does not own.
    InvalidCampaignId,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnrecognizedShape => write!(f, "unrecognized envelope shape"),
            Self::InvalidCampaignId => write!(f, "invalid campaign identifier"),
        }
    }
}

/// What happened to one event during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    /// Recipient added to (or already present in) an engagement set.
    Folded(EngagementSet),
    /// Bounce appended to the bounce list.
    Bounced,
    /// No-op fold; event marked processed anyway.
    Ignored,
    /// Event left unprocessed.
    Skipped(SkipReason),
}

/// Counters for one classification pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Events marked processed this pass (folds and no-op folds).
    pub processed: usize,
    /// Events left unprocessed by design (shape or identifier guard).
    pub skipped: usize,
    /// Events left unprocessed because a storage call failed; retried on
    /// the next pass.
    pub failed: usize,
}

/// The classification pass over unprocessed raw events.
pub struct Classifier {
    storage: Storage,
    clock: Arc<dyn Clock>,
    batch_size: i64,
}

impl Classifier {
    /// Creates a classifier reading up to `batch_size` events per pass.
    pub fn new(storage: Storage, clock: Arc<dyn Clock>, batch_size: i64) -> Self {
        Self { storage, clock, batch_size }
    }

    /// Runs one classification pass.
    ///
    /// Events are handled independently: a failure folding one event is
    /// logged and does not abort the rest of the pass. The failing event
    /// stays unprocessed and is picked up again next pass.
    ///
    /// # Errors
    ///
    /// Returns error only if the initial fetch of unprocessed events
    /// fails; everything after that is absorbed into the summary.
    pub async fn run_pass(&self) -> Result<PassSummary> {
        let events = self.storage.raw_events.find_unprocessed(self.batch_size).await?;

        let mut summary = PassSummary::default();
        for event in &events {
            match self.classify_event(event).await {
                Ok(FoldOutcome::Skipped(reason)) => {
                    warn!(event_id = %event.id, %reason, "event skipped, left unprocessed");
                    summary.skipped += 1;
                },
                Ok(_) => summary.processed += 1,
                Err(error) => {
                    warn!(
                        event_id = %event.id,
                        error = %error,
                        "event fold failed, will retry next pass"
                    );
                    summary.failed += 1;
                },
            }
        }

        if !events.is_empty() {
            debug!(
                processed = summary.processed,
                skipped = summary.skipped,
                failed = summary.failed,
                "classification pass complete"
            );
        }

        Ok(summary)
    }

    /// Classifies and folds a single raw event.
    ///
    /// Skips (unrecognized shape, invalid campaign id) are outcomes, not
    /// errors; errors mean a storage call failed mid-fold and the event
    /// should be retried.
    async fn classify_event(&self, event: &RawEvent) -> tally_core::Result<FoldOutcome> {
        let envelope = Envelope::parse(event.payload());
        let Some(record) = envelope.record() else {
            return Ok(FoldOutcome::Skipped(SkipReason::UnrecognizedShape));
        };

        let Some(campaign_id) = record.campaign_id() else {
            return Ok(FoldOutcome::Skipped(SkipReason::InvalidCampaignId));
        };

        // Mark the campaign active before dispatching on kind; even a no-op
        // fold means the campaign is receiving provider traffic.
        self.storage.active_campaigns.touch(campaign_id, self.clock.now()).await?;

        let outcome = self.apply_fold(campaign_id, record).await?;
        self.storage.raw_events.mark_processed(event.id).await?;

        Ok(outcome)
    }

    /// Applies exactly one fold for a recognized event.
    async fn apply_fold(
        &self,
        campaign_id: CampaignId,
        record: &EngagementEvent,
    ) -> tally_core::Result<FoldOutcome> {
        let Some(email) = record.rcpt_to.as_deref() else {
            // A recognized event without a recipient has nothing to fold.
            debug!(%campaign_id, kind = %record.kind, "event has no recipient, folding as no-op");
            return Ok(FoldOutcome::Ignored);
        };

        match FoldAction::for_kind(record.kind) {
            FoldAction::AddTo(set) => {
                let newly_added =
                    self.storage.campaigns.add_recipient(campaign_id, set, email).await?;
                debug!(%campaign_id, %set, email, newly_added, "recipient folded");
                Ok(FoldOutcome::Folded(set))
            },
            FoldAction::RecordBounce => {
                self.storage
                    .campaigns
                    .append_bounce(
                        campaign_id,
                        email,
                        record.bounce_code().as_deref(),
                        self.clock.now(),
                    )
                    .await?;
                debug!(%campaign_id, email, "bounce recorded");
                Ok(FoldOutcome::Bounced)
            },
            FoldAction::Ignore => {
                debug!(%campaign_id, kind = %record.kind, "unclassified kind, folding as no-op");
                Ok(FoldOutcome::Ignored)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_engagement_kind_maps_to_one_fold() {
        assert_eq!(
            FoldAction::for_kind(EventKind::Delivery),
            FoldAction::AddTo(EngagementSet::Delivered)
        );
        assert_eq!(
            FoldAction::for_kind(EventKind::Click),
            FoldAction::AddTo(EngagementSet::Clicked)
        );
        assert_eq!(FoldAction::for_kind(EventKind::Bounce), FoldAction::RecordBounce);
        assert_eq!(
            FoldAction::for_kind(EventKind::SpamComplaint),
            FoldAction::AddTo(EngagementSet::Complained)
        );
    }

    #[test]
    fn both_open_variants_share_the_opened_set() {
        assert_eq!(FoldAction::for_kind(EventKind::Open), FoldAction::AddTo(EngagementSet::Opened));
        assert_eq!(
            FoldAction::for_kind(EventKind::InitialOpen),
            FoldAction::AddTo(EngagementSet::Opened)
        );
    }

    #[test]
    fn both_unsubscribe_variants_share_the_unsubscribed_set() {
        assert_eq!(
            FoldAction::for_kind(EventKind::ListUnsubscribe),
            FoldAction::AddTo(EngagementSet::Unsubscribed)
        );
        assert_eq!(
            FoldAction::for_kind(EventKind::LinkUnsubscribe),
            FoldAction::AddTo(EngagementSet::Unsubscribed)
        );
    }

    #[test]
    fn unknown_kinds_fold_as_no_op() {
        assert_eq!(FoldAction::for_kind(EventKind::Other), FoldAction::Ignore);
    }
}
