//! Persistence contract for attendance records and correction requests.
//!
//! The engine needs only keyed reads, inserts that refuse duplicates, and
//! version-checked single-row writes. No operation spans more than one row
//! except [`Store::invalidate_stale`], which is a conditional bulk update.

pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::Result;
use crate::model::attendance::AttendanceRecord;
use crate::model::correction::{CorrectionRequest, CorrectionStatus, NewCorrection};

pub use memory::InMemoryStore;
pub use mysql::MySqlStore;

/// Outcome of a version-checked write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasResult {
    Success,
    NotFound,
    /// Someone else wrote the row since it was read.
    VersionConflict { actual: u64 },
}

impl CasResult {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Outcome of an insert guarded by a uniqueness rule.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertResult<T> {
    Inserted(T),
    Duplicate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrectionFilter {
    pub employee_id: Option<u64>,
    pub status: Option<CorrectionStatus>,
}

impl CorrectionFilter {
    pub fn pending() -> Self {
        Self {
            employee_id: None,
            status: Some(CorrectionStatus::Pending),
        }
    }

    pub fn for_employee(employee_id: u64) -> Self {
        Self {
            employee_id: Some(employee_id),
            status: None,
        }
    }

    pub fn matches(&self, correction: &CorrectionRequest) -> bool {
        self.employee_id.is_none_or(|id| id == correction.employee_id)
            && self.status.is_none_or(|s| s == correction.status)
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    // --- attendance ---

    async fn get_record(&self, employee_id: u64, day: NaiveDate)
    -> Result<Option<AttendanceRecord>>;

    /// Inserts a new record; `Duplicate` if one already exists for its (employee, day).
    async fn insert_record(&self, record: &AttendanceRecord) -> Result<InsertResult<AttendanceRecord>>;

    /// Replaces the row iff its stored version equals `record.version`.
    /// The stored version is bumped by one on success.
    async fn cas_record(&self, record: &AttendanceRecord) -> Result<CasResult>;

    /// Records ordered by day descending, then employee ascending.
    async fn list_records(&self, employee_id: Option<u64>) -> Result<Vec<AttendanceRecord>>;

    /// Marks PENDING records whose check-in is older than `cutoff` and which
    /// have no check-out as INVALID. The filter is evaluated at write time.
    /// Returns the number of rows changed.
    async fn invalidate_stale(&self, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> Result<u64>;

    // --- corrections ---

    /// Inserts a PENDING correction; `Duplicate` if a PENDING one already
    /// exists for the same (employee, day).
    async fn insert_correction(
        &self,
        correction: NewCorrection,
    ) -> Result<InsertResult<CorrectionRequest>>;

    async fn get_correction(&self, id: u64) -> Result<Option<CorrectionRequest>>;

    /// Corrections newest first.
    async fn list_corrections(&self, filter: CorrectionFilter) -> Result<Vec<CorrectionRequest>>;

    /// Replaces the row iff its stored version equals `correction.version`.
    async fn cas_correction(&self, correction: &CorrectionRequest) -> Result<CasResult>;
}
