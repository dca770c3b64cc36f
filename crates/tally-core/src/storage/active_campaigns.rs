//! Repository for active-campaign markers.
//!
//! Markers are ephemeral bookkeeping: the classifier upserts one per
//! successfully classified event, the reconciler reads the recent ones to
//! scope stats recomputation and deletes the stale ones. Losing a marker
//! costs at most one delayed recompute.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{
    error::Result,
    models::{ActiveCampaign, CampaignId},
};

/// Repository for active-campaign marker operations.
pub struct Repository {
    pool: Arc<PgPool>,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Returns a reference to the database pool.
    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    /// Upserts the marker for a campaign, stamping it with `now`.
    ///
    /// Concurrent touches race benignly; whichever lands last wins and
    /// both keep the campaign inside the recency window.
    ///
    /// # Errors
    ///
    /// Returns error if the upsert fails.
    pub async fn touch(&self, campaign_id: CampaignId, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO active_campaigns (campaign_id, last_touched_at)
            VALUES ($1, $2)
            ON CONFLICT (campaign_id) DO UPDATE SET last_touched_at = EXCLUDED.last_touched_at
            "#,
        )
        .bind(campaign_id)
        .bind(now)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    /// Finds markers touched at or after the cutoff.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_touched_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<ActiveCampaign>> {
        let markers = sqlx::query_as::<_, ActiveCampaign>(
            r#"
            SELECT campaign_id, last_touched_at
            FROM active_campaigns
            WHERE last_touched_at >= $1
            ORDER BY campaign_id
            "#,
        )
        .bind(cutoff)
        .fetch_all(&*self.pool)
        .await?;

        Ok(markers)
    }

    /// Deletes markers last touched before the cutoff.
    ///
    /// Garbage collection for campaigns that have aged out of the recency
    /// window; they received their final recompute on an earlier pass.
    ///
    /// # Errors
    ///
    /// Returns error if the delete fails.
    pub async fn delete_touched_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM active_campaigns WHERE last_touched_at < $1")
            .bind(cutoff)
            .execute(&*self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Finds the marker for one campaign.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find(&self, campaign_id: CampaignId) -> Result<Option<ActiveCampaign>> {
        let marker = sqlx::query_as::<_, ActiveCampaign>(
            "SELECT campaign_id, last_touched_at FROM active_campaigns WHERE campaign_id = $1",
        )
        .bind(campaign_id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(marker)
    }
}
