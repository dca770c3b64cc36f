//! Repository for campaign aggregates and engagement state.
//!
//! Campaign rows are created by the campaign-creation service; this
//! pipeline only adds engagement facts and refreshes the cached stats
//! snapshot. Engagement sets are rows in `campaign_recipients` with a
//! primary key over (campaign, set, email), which makes the fold
//! idempotent at the database level. Bounces are a separate append-only
//! list.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{
    error::Result,
    models::{BounceRecord, Campaign, CampaignId, CampaignStats, EngagementSet},
};

/// Repository for campaign database operations.
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

    /// Inserts a campaign row.
    ///
    /// In production this is done by the campaign-creation service; the
    /// pipeline itself only calls it from fixtures and tests.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails or the campaign already exists.
    pub async fn create(&self, campaign: &Campaign) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO campaigns (
                campaign_id, subject, from_name, from_email, html_content,
                scheduled_at, template_id, recipient_list_id, schedule_sent_at,
                stats, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(campaign.campaign_id)
        .bind(&campaign.subject)
        .bind(&campaign.from_name)
        .bind(&campaign.from_email)
        .bind(&campaign.html_content)
        .bind(campaign.scheduled_at)
        .bind(&campaign.template_id)
        .bind(&campaign.recipient_list_id)
        .bind(campaign.schedule_sent_at)
        .bind(&campaign.stats)
        .bind(campaign.created_at)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    /// Finds a campaign by its provider-assigned identifier.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_by_campaign_id(&self, campaign_id: CampaignId) -> Result<Option<Campaign>> {
        let campaign = sqlx::query_as::<_, Campaign>(
            r#"
            SELECT campaign_id, subject, from_name, from_email, html_content,
                   scheduled_at, template_id, recipient_list_id, schedule_sent_at,
                   stats, created_at
            FROM campaigns
            WHERE campaign_id = $1
            "#,
        )
        .bind(campaign_id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(campaign)
    }

    /// Adds an email to one of a campaign's engagement sets.
    ///
    /// Set semantics come from the primary key: re-adding a member is a
    /// no-op, so re-processing the same event never changes cardinality.
    /// Returns whether the email was newly added.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    pub async fn add_recipient(
        &self,
        campaign_id: CampaignId,
        set: EngagementSet,
        email: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO campaign_recipients (campaign_id, set_name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (campaign_id, set_name, email) DO NOTHING
            "#,
        )
        .bind(campaign_id)
        .bind(set)
        .bind(email)
        .execute(&*self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Appends a bounce record to a campaign's bounce list.
    ///
    /// Deliberately not deduplicated: the same address may bounce again
    /// with a different classification code, and re-processed bounce
    /// events may append again. Arrival order is preserved.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    pub async fn append_bounce(
        &self,
        campaign_id: CampaignId,
        email: &str,
        bounce_code: Option<&str>,
        recorded_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO campaign_bounces (campaign_id, email, bounce_code, recorded_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(campaign_id)
        .bind(email)
        .bind(bounce_code)
        .bind(recorded_at)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    /// Writes the cached stats snapshot for a campaign.
    ///
    /// A no-op when the campaign row does not exist yet; the next
    /// reconciliation pass after the campaign-creation service catches up
    /// will persist the snapshot.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    pub async fn set_stats(&self, campaign_id: CampaignId, stats: &CampaignStats) -> Result<()> {
        sqlx::query("UPDATE campaigns SET stats = $1 WHERE campaign_id = $2")
            .bind(sqlx::types::Json(stats))
            .bind(campaign_id)
            .execute(&*self.pool)
            .await?;

        Ok(())
    }

    /// Computes current engagement cardinalities for a campaign.
    ///
    /// Counts the live set sizes and bounce list length; this is the
    /// source of truth the reconciler snapshots into `stats`.
    ///
    /// # Errors
    ///
    /// Returns error if a query fails.
    pub async fn engagement_counts(&self, campaign_id: CampaignId) -> Result<CampaignStats> {
        let set_counts: Vec<(EngagementSet, i64)> = sqlx::query_as(
            r#"
            SELECT set_name, COUNT(*)
            FROM campaign_recipients
            WHERE campaign_id = $1
            GROUP BY set_name
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&*self.pool)
        .await?;

        let bounce_count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM campaign_bounces WHERE campaign_id = $1")
                .bind(campaign_id)
                .fetch_one(&*self.pool)
                .await?;

        let mut stats = CampaignStats { bounces: bounce_count.0, ..CampaignStats::default() };
        for (set, count) in set_counts {
            stats.set_for(set, count);
        }

        Ok(stats)
    }

    /// Lists the members of one engagement set, ordered by email.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn recipients(
        &self,
        campaign_id: CampaignId,
        set: EngagementSet,
    ) -> Result<Vec<String>> {
        let emails = sqlx::query_scalar(
            r#"
            SELECT email FROM campaign_recipients
            WHERE campaign_id = $1 AND set_name = $2
            ORDER BY email
            "#,
        )
        .bind(campaign_id)
        .bind(set)
        .fetch_all(&*self.pool)
        .await?;

        Ok(emails)
    }

    /// Lists a campaign's bounce records in arrival order.
    ///
    /// Arrival order is the insertion sequence, not `recorded_at`: two
    /// bounces folded in the same pass share a timestamp.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn bounces(&self, campaign_id: CampaignId) -> Result<Vec<BounceRecord>> {
        let records = sqlx::query_as::<_, BounceRecord>(
            r#"
            SELECT campaign_id, email, bounce_code, recorded_at
            FROM campaign_bounces
            WHERE campaign_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&*self.pool)
        .await?;

        Ok(records)
    }
}
