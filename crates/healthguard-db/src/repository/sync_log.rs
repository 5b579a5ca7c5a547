//! # Sync Audit Log Repository
//!
//! Append-only: rows are inserted by the sync engine, one per cycle, and
//! never updated or deleted.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use super::db_timestamp;
use crate::error::DbResult;
use healthguard_core::{NewSyncAttempt, SyncAttempt, SyncStatus};

#[derive(Debug, FromRow)]
struct SyncLogRow {
    id: i64,
    timestamp: DateTime<Utc>,
    records_sent: i64,
    status: SyncStatus,
    error_message: Option<String>,
    duration_ms: i64,
}

impl From<SyncLogRow> for SyncAttempt {
    fn from(row: SyncLogRow) -> Self {
        SyncAttempt {
            id: row.id,
            timestamp: row.timestamp,
            records_sent: row.records_sent,
            status: row.status,
            error_message: row.error_message,
            duration_ms: row.duration_ms,
        }
    }
}

/// Repository for the sync audit trail.
#[derive(Debug, Clone)]
pub struct SyncLogRepository {
    pool: SqlitePool,
}

impl SyncLogRepository {
    /// Creates a new SyncLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SyncLogRepository { pool }
    }

    /// Appends the audit row for a finished cycle, stamped now.
    pub async fn record(&self, attempt: &NewSyncAttempt) -> DbResult<SyncAttempt> {
        let row = sqlx::query_as::<_, SyncLogRow>(
            r#"
            INSERT INTO sync_log (timestamp, records_sent, status, error_message, duration_ms)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id, timestamp, records_sent, status, error_message, duration_ms
            "#,
        )
        .bind(db_timestamp(&Utc::now()))
        .bind(attempt.records_sent)
        .bind(attempt.status)
        .bind(&attempt.error_message)
        .bind(attempt.duration_ms)
        .fetch_one(&self.pool)
        .await?;

        debug!(
            id = row.id,
            status = %row.status,
            records_sent = row.records_sent,
            "Sync attempt recorded"
        );
        Ok(row.into())
    }

    /// Most recent audit row, if any.
    pub async fn latest(&self) -> DbResult<Option<SyncAttempt>> {
        let row = sqlx::query_as::<_, SyncLogRow>(
            r#"
            SELECT id, timestamp, records_sent, status, error_message, duration_ms
            FROM sync_log
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SyncAttempt::from))
    }

    /// The `limit` most recent audit rows, newest first.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<SyncAttempt>> {
        let rows = sqlx::query_as::<_, SyncLogRow>(
            r#"
            SELECT id, timestamp, records_sent, status, error_message, duration_ms
            FROM sync_log
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SyncAttempt::from).collect())
    }

    /// Counts audit rows.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_log")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
