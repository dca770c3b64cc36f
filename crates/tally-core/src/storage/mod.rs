//! Database access layer implementing the repository pattern.
//!
//! The repository layer acts as an anti-corruption layer between domain
//! models and the database schema. All SQL lives here; queries outside
//! this module are forbidden to keep the schema free to evolve.
//!
//! The campaign aggregate is mutated by two components (the classifier and
//! the reconciler), so every mutation is a targeted per-field operation
//! (set-add, list-append, stats-set) keyed by campaign identifier, never a
//! whole-row overwrite.

use std::sync::Arc;

use sqlx::PgPool;

pub mod active_campaigns;
pub mod campaigns;
pub mod raw_events;

use crate::error::Result;

/// Container for all repository instances providing unified database access.
#[derive(Clone)]
pub struct Storage {
    /// Repository for raw inbound events.
    pub raw_events: Arc<raw_events::Repository>,

    /// Repository for campaign aggregates and engagement state.
    pub campaigns: Arc<campaigns::Repository>,

    /// Repository for active-campaign markers.
    pub active_campaigns: Arc<active_campaigns::Repository>,
}

impl Storage {
    /// Creates a new storage instance with the given connection pool.
    ///
    /// All repositories share the same pool through `Arc`.
    pub fn new(pool: PgPool) -> Self {
        let pool = Arc::new(pool);

        Self {
            raw_events: Arc::new(raw_events::Repository::new(pool.clone())),
            campaigns: Arc::new(campaigns::Repository::new(pool.clone())),
            active_campaigns: Arc::new(active_campaigns::Repository::new(pool)),
        }
    }

    /// Performs a health check on the database connection.
    ///
    /// Backs the `/health` and `/ready` probes.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Database` if the connection is unhealthy.
    pub async fn health_check(&self) -> Result<()> {
        let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&*self.raw_events.pool()).await?;

        Ok(())
    }
}

/// Creates the schema if it does not exist.
///
/// Statements are idempotent and additive so repeated startup against an
/// existing database is safe. Campaign descriptive columns are owned by
/// the campaign-creation service; they are declared here so the pipeline
/// can run standalone in development and tests.
///
/// TODO: move to a sqlx `migrate!` directory once the campaign-creation
/// service and this pipeline agree on who runs migrations.
///
/// # Errors
///
/// Returns error if any DDL statement fails.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_events (
            id UUID PRIMARY KEY,
            seq BIGSERIAL,
            received_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            processed BOOLEAN NOT NULL DEFAULT FALSE,
            payload JSONB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS campaigns (
            campaign_id BIGINT PRIMARY KEY,
            subject TEXT NOT NULL,
            from_name TEXT NOT NULL,
            from_email TEXT NOT NULL,
            html_content TEXT NOT NULL,
            scheduled_at TIMESTAMPTZ,
            template_id TEXT,
            recipient_list_id TEXT,
            schedule_sent_at TIMESTAMPTZ,
            stats JSONB NOT NULL DEFAULT '{"delivered":0,"opens":0,"clicks":0,"bounces":0,"unsubscribes":0,"spam_complaints":0}',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS campaign_recipients (
            campaign_id BIGINT NOT NULL,
            set_name TEXT NOT NULL,
            email TEXT NOT NULL,
            added_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (campaign_id, set_name, email)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS campaign_bounces (
            id BIGSERIAL PRIMARY KEY,
            campaign_id BIGINT NOT NULL,
            email TEXT NOT NULL,
            bounce_code TEXT,
            recorded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS active_campaigns (
            campaign_id BIGINT PRIMARY KEY,
            last_touched_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_raw_events_unprocessed
        ON raw_events(received_at)
        WHERE processed = FALSE
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_raw_events_retention
        ON raw_events(received_at)
        WHERE processed = TRUE
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_campaign_bounces_campaign ON campaign_bounces(campaign_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
