//! # Vital Readings Repository
//!
//! Stores vital-sign readings and owns their one-way sync-state transition.
//!
//! ## Sync State Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Reading Lifecycle                                    │
//! │                                                                         │
//! │  COLLECTION LOOP                                                       │
//! │       │  insert(patient_id, sample)                                    │
//! │       ▼                                                                 │
//! │  ┌──────────────────────────┐                                          │
//! │  │ synced = 0               │ ◄── fetch_unsynced(limit)                │
//! │  │ synced_at = NULL         │     ORDER BY timestamp, id               │
//! │  └────────────┬─────────────┘                                          │
//! │               │  mark_synced(ids)  (one transaction,                   │
//! │               │                     only ids still unsynced)           │
//! │               ▼                                                         │
//! │  ┌──────────────────────────┐                                          │
//! │  │ synced = 1               │  terminal: nothing writes synced = 0     │
//! │  │ synced_at = <commit time>│                                          │
//! │  └──────────────────────────┘                                          │
//! │                                                                         │
//! │  CHECK ((synced = 1) = (synced_at IS NOT NULL)) in the schema          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Readings inserted while a sync cycle is in flight are never touched by
//! that cycle's `mark_synced`: the update is keyed by the selected ids.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::db_timestamp;
use crate::error::{DbError, DbResult};
use healthguard_core::{page_offset, round_to, Page, TimeRange, VitalRecord, VitalSample, VitalStats};

/// Ids per `UPDATE ... IN (...)` statement, well under SQLite's bind limit.
const MARK_CHUNK: usize = 500;

const VITAL_COLUMNS: &str = "id, uuid, patient_id, timestamp, heart_rate, spo2, temperature, \
     blood_pressure_sys, blood_pressure_dia, respiratory_rate, ppg_raw, synced, synced_at";

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, FromRow)]
struct VitalRow {
    id: i64,
    uuid: String,
    patient_id: i64,
    timestamp: DateTime<Utc>,
    heart_rate: Option<f64>,
    spo2: Option<f64>,
    temperature: Option<f64>,
    blood_pressure_sys: Option<f64>,
    blood_pressure_dia: Option<f64>,
    respiratory_rate: Option<f64>,
    ppg_raw: Option<String>,
    synced: bool,
    synced_at: Option<DateTime<Utc>>,
}

impl TryFrom<VitalRow> for VitalRecord {
    type Error = DbError;

    fn try_from(row: VitalRow) -> DbResult<Self> {
        let ppg_raw = match row.ppg_raw {
            Some(text) => Some(serde_json::from_str::<Vec<f64>>(&text).map_err(|e| {
                DbError::Corrupt {
                    column: "ppg_raw".to_string(),
                    id: row.id,
                    reason: e.to_string(),
                }
            })?),
            None => None,
        };

        Ok(VitalRecord {
            id: row.id,
            uuid: row.uuid,
            patient_id: row.patient_id,
            timestamp: row.timestamp,
            heart_rate: row.heart_rate,
            spo2: row.spo2,
            temperature: row.temperature,
            blood_pressure_sys: row.blood_pressure_sys,
            blood_pressure_dia: row.blood_pressure_dia,
            respiratory_rate: row.respiratory_rate,
            ppg_raw,
            synced: row.synced,
            synced_at: row.synced_at,
        })
    }
}

fn into_records(rows: Vec<VitalRow>) -> DbResult<Vec<VitalRecord>> {
    rows.into_iter().map(VitalRecord::try_from).collect()
}

#[derive(Debug, FromRow)]
struct StatsRow {
    total: i64,
    hr_avg: Option<f64>,
    hr_min: Option<f64>,
    hr_max: Option<f64>,
    spo2_avg: Option<f64>,
    spo2_min: Option<f64>,
    spo2_max: Option<f64>,
    temp_avg: Option<f64>,
    sys_avg: Option<f64>,
    dia_avg: Option<f64>,
    rr_avg: Option<f64>,
}

/// Appends ` WHERE timestamp >= ? AND timestamp <= ?` for the bounds present.
fn push_range(qb: &mut QueryBuilder<'_, Sqlite>, range: &TimeRange) {
    match (range.start, range.end) {
        (Some(start), Some(end)) => {
            qb.push(" WHERE timestamp >= ")
                .push_bind(db_timestamp(&start))
                .push(" AND timestamp <= ")
                .push_bind(db_timestamp(&end));
        }
        (Some(start), None) => {
            qb.push(" WHERE timestamp >= ").push_bind(db_timestamp(&start));
        }
        (None, Some(end)) => {
            qb.push(" WHERE timestamp <= ").push_bind(db_timestamp(&end));
        }
        (None, None) => {}
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for vital readings.
#[derive(Debug, Clone)]
pub struct VitalRepository {
    pool: SqlitePool,
}

impl VitalRepository {
    /// Creates a new VitalRepository.
    pub fn new(pool: SqlitePool) -> Self {
        VitalRepository { pool }
    }

    /// Persists a sample as a new unsynced reading.
    ///
    /// Assigns a fresh UUID v4; the store assigns the sequence id.
    pub async fn insert(&self, patient_id: i64, sample: &VitalSample) -> DbResult<VitalRecord> {
        let uuid = Uuid::new_v4().to_string();
        let ppg_raw = sample
            .ppg_raw
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DbError::Internal(e.to_string()))?;

        let sql = format!(
            "INSERT INTO vital_readings (uuid, patient_id, timestamp, heart_rate, spo2, \
             temperature, blood_pressure_sys, blood_pressure_dia, respiratory_rate, ppg_raw, \
             synced, synced_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, NULL) \
             RETURNING {VITAL_COLUMNS}"
        );

        let row = sqlx::query_as::<_, VitalRow>(&sql)
            .bind(&uuid)
            .bind(patient_id)
            .bind(db_timestamp(&sample.timestamp))
            .bind(sample.heart_rate)
            .bind(sample.spo2)
            .bind(sample.temperature)
            .bind(sample.blood_pressure_sys)
            .bind(sample.blood_pressure_dia)
            .bind(sample.respiratory_rate)
            .bind(ppg_raw)
            .fetch_one(&self.pool)
            .await?;

        debug!(id = row.id, uuid = %row.uuid, "Vital reading stored");
        row.try_into()
    }

    /// Fetches a reading by its sequence id.
    pub async fn get(&self, id: i64) -> DbResult<Option<VitalRecord>> {
        let sql = format!("SELECT {VITAL_COLUMNS} FROM vital_readings WHERE id = ?1");
        sqlx::query_as::<_, VitalRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(VitalRecord::try_from)
            .transpose()
    }

    /// Selects up to `limit` unsynced readings, oldest first (ties by id).
    pub async fn fetch_unsynced(&self, limit: u32) -> DbResult<Vec<VitalRecord>> {
        let sql = format!(
            "SELECT {VITAL_COLUMNS} FROM vital_readings \
             WHERE synced = 0 \
             ORDER BY timestamp ASC, id ASC \
             LIMIT ?1"
        );

        let rows = sqlx::query_as::<_, VitalRow>(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        into_records(rows)
    }

    /// Marks the given readings synced in a single transaction.
    ///
    /// Only rows still unsynced are touched, so `synced_at` is written once.
    ///
    /// ## Returns
    /// Number of rows that transitioned.
    pub async fn mark_synced(&self, ids: &[i64], synced_at: DateTime<Utc>) -> DbResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let stamp = db_timestamp(&synced_at);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let mut updated = 0;
        for chunk in ids.chunks(MARK_CHUNK) {
            let mut qb: QueryBuilder<'_, Sqlite> =
                QueryBuilder::new("UPDATE vital_readings SET synced = 1, synced_at = ");
            qb.push_bind(stamp.clone());
            qb.push(" WHERE synced = 0 AND id IN (");
            let mut separated = qb.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            updated += qb.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(requested = ids.len(), updated, "Readings marked synced");
        Ok(updated)
    }

    /// Lists readings newest first within an optional time range.
    pub async fn list(
        &self,
        range: &TimeRange,
        page: u32,
        page_size: u32,
    ) -> DbResult<Page<VitalRecord>> {
        let total = self.count_in_range(range).await?;

        let mut qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new(format!("SELECT {VITAL_COLUMNS} FROM vital_readings"));
        push_range(&mut qb, range);
        qb.push(" ORDER BY timestamp DESC, id DESC LIMIT ")
            .push_bind(i64::from(page_size))
            .push(" OFFSET ")
            .push_bind(page_offset(page, page_size));

        let rows = qb
            .build_query_as::<VitalRow>()
            .fetch_all(&self.pool)
            .await?;

        let items = into_records(rows)?
            .into_iter()
            .map(VitalRecord::without_waveform)
            .collect();

        Ok(Page::new(items, total, page, page_size))
    }

    /// Most recent reading, if any.
    pub async fn latest(&self) -> DbResult<Option<VitalRecord>> {
        let sql = format!(
            "SELECT {VITAL_COLUMNS} FROM vital_readings ORDER BY timestamp DESC, id DESC LIMIT 1"
        );
        sqlx::query_as::<_, VitalRow>(&sql)
            .fetch_optional(&self.pool)
            .await?
            .map(VitalRecord::try_from)
            .transpose()
    }

    /// Aggregates over `[start, end]`, rounded to one decimal.
    pub async fn stats(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> DbResult<VitalStats> {
        let row = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT
                COUNT(*)                 AS total,
                AVG(heart_rate)          AS hr_avg,
                MIN(heart_rate)          AS hr_min,
                MAX(heart_rate)          AS hr_max,
                AVG(spo2)                AS spo2_avg,
                MIN(spo2)                AS spo2_min,
                MAX(spo2)                AS spo2_max,
                AVG(temperature)         AS temp_avg,
                AVG(blood_pressure_sys)  AS sys_avg,
                AVG(blood_pressure_dia)  AS dia_avg,
                AVG(respiratory_rate)    AS rr_avg
            FROM vital_readings
            WHERE timestamp >= ?1 AND timestamp <= ?2
            "#,
        )
        .bind(db_timestamp(&start))
        .bind(db_timestamp(&end))
        .fetch_one(&self.pool)
        .await?;

        let r = |v: Option<f64>| v.map(|x| round_to(x, 1));

        Ok(VitalStats {
            period_start: start,
            period_end: end,
            total_readings: row.total,
            heart_rate_avg: r(row.hr_avg),
            heart_rate_min: r(row.hr_min),
            heart_rate_max: r(row.hr_max),
            spo2_avg: r(row.spo2_avg),
            spo2_min: r(row.spo2_min),
            spo2_max: r(row.spo2_max),
            temperature_avg: r(row.temp_avg),
            blood_pressure_sys_avg: r(row.sys_avg),
            blood_pressure_dia_avg: r(row.dia_avg),
            respiratory_rate_avg: r(row.rr_avg),
        })
    }

    /// Counts all readings.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vital_readings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Counts readings still waiting for sync.
    pub async fn count_unsynced(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vital_readings WHERE synced = 0")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_in_range(&self, range: &TimeRange) -> DbResult<i64> {
        let mut qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM vital_readings");
        push_range(&mut qb, range);

        let count = qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use crate::{Database, DbConfig};

    use super::*;

    async fn setup() -> (Database, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let patient = db.patients().ensure_default().await.unwrap();
        (db, patient.id)
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
    }

    fn sample_at(ts: DateTime<Utc>, hr: f64) -> VitalSample {
        VitalSample {
            heart_rate: Some(hr),
            spo2: Some(97.5),
            ..VitalSample::empty(ts)
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_identity_and_unsynced_state() {
        let (db, patient_id) = setup().await;
        let mut sample = sample_at(base_time(), 72.0);
        sample.ppg_raw = Some(vec![0.1, 0.25, 0.5]);

        let record = db.vitals().insert(patient_id, &sample).await.unwrap();

        assert!(record.id > 0);
        assert_eq!(record.uuid.len(), 36);
        assert_eq!(record.patient_id, patient_id);
        assert_eq!(record.timestamp, base_time());
        assert_eq!(record.ppg_raw, Some(vec![0.1, 0.25, 0.5]));
        assert!(!record.synced);
        assert!(record.synced_at.is_none());

        let again = db.vitals().insert(patient_id, &sample).await.unwrap();
        assert!(again.id > record.id);
        assert_ne!(again.uuid, record.uuid);
    }

    #[tokio::test]
    async fn test_fetch_unsynced_orders_by_timestamp_and_limits() {
        let (db, patient_id) = setup().await;
        let repo = db.vitals();

        // Inserted out of time order on purpose.
        for offset in [30, 10, 20, 0, 40] {
            repo.insert(patient_id, &sample_at(base_time() + Duration::seconds(offset), 70.0))
                .await
                .unwrap();
        }

        let batch = repo.fetch_unsynced(3).await.unwrap();
        assert_eq!(batch.len(), 3);
        let times: Vec<_> = batch.iter().map(|r| r.timestamp).collect();
        assert_eq!(
            times,
            vec![
                base_time(),
                base_time() + Duration::seconds(10),
                base_time() + Duration::seconds(20),
            ]
        );
    }

    #[tokio::test]
    async fn test_equal_timestamps_tie_break_by_id() {
        let (db, patient_id) = setup().await;
        let repo = db.vitals();

        let a = repo.insert(patient_id, &sample_at(base_time(), 70.0)).await.unwrap();
        let b = repo.insert(patient_id, &sample_at(base_time(), 71.0)).await.unwrap();

        let batch = repo.fetch_unsynced(10).await.unwrap();
        assert_eq!(batch[0].id, a.id);
        assert_eq!(batch[1].id, b.id);
    }

    #[tokio::test]
    async fn test_mark_synced_touches_only_selected_ids() {
        let (db, patient_id) = setup().await;
        let repo = db.vitals();

        let mut ids = Vec::new();
        for i in 0..3 {
            let r = repo
                .insert(patient_id, &sample_at(base_time() + Duration::seconds(i), 70.0))
                .await
                .unwrap();
            ids.push(r.id);
        }
        // Arrives "during" the cycle; not part of the selected batch.
        let late = repo
            .insert(patient_id, &sample_at(base_time() + Duration::seconds(9), 70.0))
            .await
            .unwrap();

        let now = Utc::now();
        assert_eq!(repo.mark_synced(&ids, now).await.unwrap(), 3);

        for id in &ids {
            let r = repo.get(*id).await.unwrap().unwrap();
            assert!(r.synced);
            assert!(r.sync_state_consistent());
        }
        let late = repo.get(late.id).await.unwrap().unwrap();
        assert!(!late.synced);
        assert_eq!(repo.count_unsynced().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_synced_never_rewrites_synced_at() {
        let (db, patient_id) = setup().await;
        let repo = db.vitals();
        let r = repo.insert(patient_id, &sample_at(base_time(), 70.0)).await.unwrap();

        let first = base_time() + Duration::hours(1);
        assert_eq!(repo.mark_synced(&[r.id], first).await.unwrap(), 1);
        assert_eq!(
            repo.mark_synced(&[r.id], first + Duration::hours(1)).await.unwrap(),
            0
        );

        let stored = repo.get(r.id).await.unwrap().unwrap();
        assert_eq!(stored.synced_at, Some(first));
        assert_eq!(repo.mark_synced(&[], Utc::now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_schema_rejects_inconsistent_sync_state() {
        let (db, patient_id) = setup().await;
        let r = db
            .vitals()
            .insert(patient_id, &sample_at(base_time(), 70.0))
            .await
            .unwrap();

        let err: DbError = sqlx::query("UPDATE vital_readings SET synced = 1 WHERE id = ?1")
            .bind(r.id)
            .execute(db.pool())
            .await
            .unwrap_err()
            .into();

        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[tokio::test]
    async fn test_list_newest_first_with_pages() {
        let (db, patient_id) = setup().await;
        let repo = db.vitals();
        for i in 0..5 {
            let mut s = sample_at(base_time() + Duration::minutes(i), 60.0 + i as f64);
            s.ppg_raw = Some(vec![0.5]);
            repo.insert(patient_id, &s).await.unwrap();
        }

        let page = repo.list(&TimeRange::default(), 1, 2).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.pages, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].heart_rate, Some(64.0));
        assert!(page.items[0].ppg_raw.is_none());

        let last = repo.list(&TimeRange::default(), 3, 2).await.unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].heart_rate, Some(60.0));
    }

    #[tokio::test]
    async fn test_list_time_range_is_inclusive() {
        let (db, patient_id) = setup().await;
        let repo = db.vitals();
        for i in 0..5 {
            repo.insert(patient_id, &sample_at(base_time() + Duration::minutes(i), 70.0))
                .await
                .unwrap();
        }

        let range = TimeRange {
            start: Some(base_time() + Duration::minutes(1)),
            end: Some(base_time() + Duration::minutes(3)),
        };
        let page = repo.list(&range, 1, 50).await.unwrap();
        assert_eq!(page.total, 3);

        let empty = TimeRange {
            start: Some(base_time() + Duration::days(1)),
            end: None,
        };
        let page = repo.list(&empty, 1, 50).await.unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.pages, 1);
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn test_latest_and_counts() {
        let (db, patient_id) = setup().await;
        let repo = db.vitals();
        assert!(repo.latest().await.unwrap().is_none());

        repo.insert(patient_id, &sample_at(base_time(), 70.0)).await.unwrap();
        repo.insert(patient_id, &sample_at(base_time() + Duration::seconds(5), 75.0))
            .await
            .unwrap();

        let latest = repo.latest().await.unwrap().unwrap();
        assert_eq!(latest.heart_rate, Some(75.0));
        assert_eq!(repo.count().await.unwrap(), 2);
        assert_eq!(repo.count_unsynced().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_stats_aggregates_and_rounds() {
        let (db, patient_id) = setup().await;
        let repo = db.vitals();
        for (i, hr) in [70.0, 71.0, 73.0].iter().enumerate() {
            let mut s = sample_at(base_time() + Duration::minutes(i as i64), *hr);
            s.temperature = Some(36.6);
            repo.insert(patient_id, &s).await.unwrap();
        }
        // Outside the window.
        repo.insert(patient_id, &sample_at(base_time() - Duration::days(2), 150.0))
            .await
            .unwrap();

        let stats = repo
            .stats(base_time() - Duration::hours(1), base_time() + Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(stats.total_readings, 3);
        assert_eq!(stats.heart_rate_avg, Some(71.3));
        assert_eq!(stats.heart_rate_min, Some(70.0));
        assert_eq!(stats.heart_rate_max, Some(73.0));
        assert_eq!(stats.temperature_avg, Some(36.6));
        assert_eq!(stats.respiratory_rate_avg, None);
    }
}
