//! MySQL-backed [`Store`]. Schema lives in `migrations/0001_init.sql`.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, MySqlPool};

use super::{CasResult, CorrectionFilter, InsertResult, Store};
use crate::error::{EngineError, Result};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, Location};
use crate::model::correction::{CorrectionRequest, CorrectionStatus, NewCorrection};

/// SQLSTATE for integrity constraint violations (duplicate keys).
const DUPLICATE_KEY: &str = "23000";

const RECORD_COLUMNS: &str = r#"
    employee_id, day,
    check_in, check_in_lat, check_in_lng,
    check_out, check_out_lat, check_out_lng,
    total_seconds, status, version, created_at, updated_at
"#;

const CORRECTION_COLUMNS: &str = r#"
    id, employee_id, day, requested_check_in, requested_check_out, reason,
    status, created_at, expires_at, reviewed_at, reviewed_by, review_comments, version
"#;

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct AttendanceRow {
    employee_id: u64,
    day: NaiveDate,
    check_in: Option<DateTime<Utc>>,
    check_in_lat: Option<f64>,
    check_in_lng: Option<f64>,
    check_out: Option<DateTime<Utc>>,
    check_out_lat: Option<f64>,
    check_out_lng: Option<f64>,
    total_seconds: Option<i64>,
    status: String,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn location(latitude: Option<f64>, longitude: Option<f64>) -> Option<Location> {
    Some(Location {
        latitude: latitude?,
        longitude: longitude?,
    })
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = EngineError;

    fn try_from(row: AttendanceRow) -> Result<Self> {
        let status = AttendanceStatus::from_str(&row.status)
            .map_err(|_| EngineError::store(format!("unknown attendance status {}", row.status)))?;
        Ok(Self {
            employee_id: row.employee_id,
            day: row.day,
            check_in: row.check_in,
            check_in_location: location(row.check_in_lat, row.check_in_lng),
            check_out: row.check_out,
            check_out_location: location(row.check_out_lat, row.check_out_lng),
            total_seconds: row.total_seconds,
            status,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct CorrectionRow {
    id: u64,
    employee_id: u64,
    day: NaiveDate,
    requested_check_in: Option<DateTime<Utc>>,
    requested_check_out: Option<DateTime<Utc>>,
    reason: String,
    status: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
    reviewed_by: Option<u64>,
    review_comments: Option<String>,
    version: u64,
}

impl TryFrom<CorrectionRow> for CorrectionRequest {
    type Error = EngineError;

    fn try_from(row: CorrectionRow) -> Result<Self> {
        let status = CorrectionStatus::from_str(&row.status)
            .map_err(|_| EngineError::store(format!("unknown correction status {}", row.status)))?;
        Ok(Self {
            id: row.id,
            employee_id: row.employee_id,
            day: row.day,
            requested_check_in: row.requested_check_in,
            requested_check_out: row.requested_check_out,
            reason: row.reason,
            status,
            created_at: row.created_at,
            expires_at: row.expires_at,
            reviewed_at: row.reviewed_at,
            reviewed_by: row.reviewed_by,
            review_comments: row.review_comments,
            version: row.version,
        })
    }
}

fn is_duplicate(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(DUPLICATE_KEY))
}

/// Distinguishes "row gone" from "row moved on" after an UPDATE matched nothing.
fn cas_miss(actual: Option<u64>) -> CasResult {
    match actual {
        Some(actual) => CasResult::VersionConflict { actual },
        None => CasResult::NotFound,
    }
}

#[async_trait]
impl Store for MySqlStore {
    async fn get_record(
        &self,
        employee_id: u64,
        day: NaiveDate,
    ) -> Result<Option<AttendanceRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM attendance WHERE employee_id = ? AND day = ?"
        );
        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(employee_id)
            .bind(day)
            .fetch_optional(&self.pool)
            .await?;
        row.map(AttendanceRecord::try_from).transpose()
    }

    async fn insert_record(&self, record: &AttendanceRecord) -> Result<InsertResult<AttendanceRecord>> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance
                (employee_id, day, check_in, check_in_lat, check_in_lng,
                 check_out, check_out_lat, check_out_lng,
                 total_seconds, status, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(record.employee_id)
        .bind(record.day)
        .bind(record.check_in)
        .bind(record.check_in_location.map(|l| l.latitude))
        .bind(record.check_in_location.map(|l| l.longitude))
        .bind(record.check_out)
        .bind(record.check_out_location.map(|l| l.latitude))
        .bind(record.check_out_location.map(|l| l.longitude))
        .bind(record.total_seconds)
        .bind(record.status.as_ref())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertResult::Inserted(AttendanceRecord {
                version: 1,
                ..record.clone()
            })),
            Err(e) if is_duplicate(&e) => Ok(InsertResult::Duplicate),
            Err(e) => {
                tracing::error!(error = %e, employee_id = record.employee_id, "Insert attendance failed");
                Err(e.into())
            }
        }
    }

    async fn cas_record(&self, record: &AttendanceRecord) -> Result<CasResult> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET check_in = ?, check_in_lat = ?, check_in_lng = ?,
                check_out = ?, check_out_lat = ?, check_out_lng = ?,
                total_seconds = ?, status = ?, updated_at = ?,
                version = version + 1
            WHERE employee_id = ?
            AND day = ?
            AND version = ?
            "#,
        )
        .bind(record.check_in)
        .bind(record.check_in_location.map(|l| l.latitude))
        .bind(record.check_in_location.map(|l| l.longitude))
        .bind(record.check_out)
        .bind(record.check_out_location.map(|l| l.latitude))
        .bind(record.check_out_location.map(|l| l.longitude))
        .bind(record.total_seconds)
        .bind(record.status.as_ref())
        .bind(record.updated_at)
        .bind(record.employee_id)
        .bind(record.day)
        .bind(record.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(CasResult::Success);
        }
        let actual = sqlx::query_scalar::<_, u64>(
            "SELECT version FROM attendance WHERE employee_id = ? AND day = ?",
        )
        .bind(record.employee_id)
        .bind(record.day)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cas_miss(actual))
    }

    async fn list_records(&self, employee_id: Option<u64>) -> Result<Vec<AttendanceRecord>> {
        let rows = match employee_id {
            Some(id) => {
                let sql = format!(
                    "SELECT {RECORD_COLUMNS} FROM attendance WHERE employee_id = ? ORDER BY day DESC"
                );
                sqlx::query_as::<_, AttendanceRow>(&sql)
                    .bind(id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {RECORD_COLUMNS} FROM attendance ORDER BY day DESC, employee_id ASC"
                );
                sqlx::query_as::<_, AttendanceRow>(&sql)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter().map(AttendanceRecord::try_from).collect()
    }

    async fn invalidate_stale(&self, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET status = 'invalid', updated_at = ?, version = version + 1
            WHERE status = 'pending'
            AND check_in IS NOT NULL
            AND check_in < ?
            AND check_out IS NULL
            "#,
        )
        .bind(now)
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert_correction(
        &self,
        correction: NewCorrection,
    ) -> Result<InsertResult<CorrectionRequest>> {
        // uq_pending_correction on (employee_id, day, pending_slot) guards the single pending slot
        let result = sqlx::query(
            r#"
            INSERT INTO corrections
                (employee_id, day, requested_check_in, requested_check_out, reason,
                 status, created_at, expires_at, version)
            VALUES (?, ?, ?, ?, ?, 'pending', ?, ?, 1)
            "#,
        )
        .bind(correction.employee_id)
        .bind(correction.day)
        .bind(correction.requested_check_in)
        .bind(correction.requested_check_out)
        .bind(&correction.reason)
        .bind(correction.created_at)
        .bind(correction.expires_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => {
                let stored = CorrectionRequest {
                    version: 1,
                    ..correction.into_request(done.last_insert_id())
                };
                Ok(InsertResult::Inserted(stored))
            }
            Err(e) if is_duplicate(&e) => Ok(InsertResult::Duplicate),
            Err(e) => {
                tracing::error!(error = %e, employee_id = correction.employee_id, "Insert correction failed");
                Err(e.into())
            }
        }
    }

    async fn get_correction(&self, id: u64) -> Result<Option<CorrectionRequest>> {
        let sql = format!("SELECT {CORRECTION_COLUMNS} FROM corrections WHERE id = ?");
        let row = sqlx::query_as::<_, CorrectionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(CorrectionRequest::try_from).transpose()
    }

    async fn list_corrections(&self, filter: CorrectionFilter) -> Result<Vec<CorrectionRequest>> {
        let mut sql = format!("SELECT {CORRECTION_COLUMNS} FROM corrections WHERE 1=1");
        if filter.employee_id.is_some() {
            sql.push_str(" AND employee_id = ?");
        }
        if filter.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        sql.push_str(" ORDER BY id DESC");

        let mut query = sqlx::query_as::<_, CorrectionRow>(&sql);
        if let Some(employee_id) = filter.employee_id {
            query = query.bind(employee_id);
        }
        if let Some(status) = filter.status {
            query = query.bind(status.to_string());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(CorrectionRequest::try_from).collect()
    }

    async fn cas_correction(&self, correction: &CorrectionRequest) -> Result<CasResult> {
        let result = sqlx::query(
            r#"
            UPDATE corrections
            SET status = ?, reviewed_at = ?, reviewed_by = ?, review_comments = ?,
                version = version + 1
            WHERE id = ?
            AND version = ?
            "#,
        )
        .bind(correction.status.as_ref())
        .bind(correction.reviewed_at)
        .bind(correction.reviewed_by)
        .bind(&correction.review_comments)
        .bind(correction.id)
        .bind(correction.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(CasResult::Success);
        }
        let actual = sqlx::query_scalar::<_, u64>("SELECT version FROM corrections WHERE id = ?")
            .bind(correction.id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(cas_miss(actual))
    }
}
