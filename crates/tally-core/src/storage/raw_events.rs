//! Repository for the raw event store.
//!
//! Raw events are append-only: the ingestion endpoint inserts them, the
//! classifier flips their processed flag, and the retention sweeper
//! deletes old processed rows. Nothing else writes to this table.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{
    error::Result,
    models::{EventId, RawEvent},
};

/// Repository for raw event database operations.
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

    /// Appends a raw event.
    ///
    /// The durable write is the whole of ingestion; no interpretation
    /// happens here.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails.
    pub async fn append(&self, event: &RawEvent) -> Result<EventId> {
        let id = sqlx::query_scalar(
            r#"
            INSERT INTO raw_events (id, received_at, processed, payload)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(event.id.0)
        .bind(event.received_at)
        .bind(event.processed)
        .bind(&event.payload)
        .fetch_one(&*self.pool)
        .await?;

        Ok(EventId(id))
    }

    /// Fetches unprocessed events in arrival order, oldest first.
    ///
    /// Arrival order keeps the classifier fair: an event is never starved
    /// behind one that arrived later. Items of one ingested batch share a
    /// timestamp, so the insertion sequence breaks ties in array order.
    /// Skipped events (unrecognized shape, invalid campaign id) stay at
    /// the head of this queue until they are handled manually, so the
    /// limit should be comfortably larger than the expected skip backlog.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_unprocessed(&self, limit: i64) -> Result<Vec<RawEvent>> {
        let events = sqlx::query_as::<_, RawEvent>(
            r#"
            SELECT id, received_at, processed, payload
            FROM raw_events
            WHERE processed = FALSE
            ORDER BY received_at ASC, seq ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&*self.pool)
        .await?;

        Ok(events)
    }

    /// Marks an event as processed.
    ///
    /// Terminal for the fold path: once set, the row is immutable until
    /// the retention sweeper deletes it.
    ///
    /// # Errors
    ///
    /// Returns error if the update fails.
    pub async fn mark_processed(&self, event_id: EventId) -> Result<()> {
        sqlx::query("UPDATE raw_events SET processed = TRUE WHERE id = $1")
            .bind(event_id.0)
            .execute(&*self.pool)
            .await?;

        Ok(())
    }

    /// Deletes processed events that arrived at or before the cutoff.
    ///
    /// Unprocessed events are never deleted regardless of age; they are
    /// awaiting retry or manual inspection. The cutoff is inclusive, so an
    /// event aged exactly at the retention threshold is collected by the
    /// next sweep.
    ///
    /// # Errors
    ///
    /// Returns error if the delete fails.
    pub async fn delete_processed_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM raw_events WHERE processed = TRUE AND received_at <= $1")
                .bind(cutoff)
                .execute(&*self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    /// Finds an event by ID.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find_by_id(&self, event_id: EventId) -> Result<Option<RawEvent>> {
        let event = sqlx::query_as::<_, RawEvent>(
            "SELECT id, received_at, processed, payload FROM raw_events WHERE id = $1",
        )
        .bind(event_id.0)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(event)
    }

    /// Counts events still awaiting classification.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn count_unprocessed(&self) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM raw_events WHERE processed = FALSE")
                .fetch_one(&*self.pool)
                .await?;

        Ok(count.0)
    }

    /// Counts all stored events.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn count(&self) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM raw_events").fetch_one(&*self.pool).await?;

        Ok(count.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn repository_can_be_created() {
        let pool = sqlx::PgPool::connect_lazy("postgresql://test").unwrap();
        let _repo = Repository::new(Arc::new(pool));
    }
}
