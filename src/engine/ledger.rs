use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

use super::{Engine, WRITE_ATTEMPTS, rules};
use crate::error::{EngineError, Result};
use crate::model::attendance::{AttendanceRecord, Location};
use crate::model::role::Principal;
use crate::store::InsertResult;

impl Engine {
    /// Opens the employee's day at `at`: creates the PENDING record, or fills
    /// the check-in of a row that exists without one.
    pub async fn open_day(
        &self,
        employee_id: u64,
        at: DateTime<Utc>,
        location: Location,
    ) -> Result<AttendanceRecord> {
        rules::check_location(&location)?;
        let day = self.clock.day(at);

        for _ in 0..WRITE_ATTEMPTS {
            match self.io(self.store.get_record(employee_id, day)).await? {
                None => {
                    let record = AttendanceRecord::opened(employee_id, day, at, location);
                    match self.io(self.store.insert_record(&record)).await? {
                        InsertResult::Inserted(stored) => {
                            info!(employee_id, %day, "Checked in");
                            return Ok(stored);
                        }
                        // lost the insert race; re-read the winner
                        InsertResult::Duplicate => continue,
                    }
                }
                Some(current) => {
                    let updated = rules::check_in(&current, at, location)?;
                    if self.io(self.store.cas_record(&updated)).await?.is_success() {
                        info!(employee_id, %day, "Checked in on existing record");
                        return Ok(AttendanceRecord {
                            version: updated.version + 1,
                            ..updated
                        });
                    }
                }
            }
        }

        warn!(employee_id, %day, "Check-in lost the race twice");
        Err(EngineError::Conflict)
    }

    /// Closes the employee's open day at `at`, making it VALID.
    pub async fn close_day(
        &self,
        employee_id: u64,
        at: DateTime<Utc>,
        location: Location,
    ) -> Result<AttendanceRecord> {
        rules::check_location(&location)?;
        let day = self.clock.day(at);

        for _ in 0..WRITE_ATTEMPTS {
            let Some(current) = self.io(self.store.get_record(employee_id, day)).await? else {
                return Err(EngineError::NoActiveCheckIn { day });
            };
            let updated = rules::check_out(&current, at, location)?;
            if self.io(self.store.cas_record(&updated)).await?.is_success() {
                info!(
                    employee_id,
                    %day,
                    total_seconds = ?updated.total_seconds,
                    "Checked out"
                );
                return Ok(AttendanceRecord {
                    version: updated.version + 1,
                    ..updated
                });
            }
        }

        warn!(employee_id, %day, "Check-out lost the race twice");
        Err(EngineError::Conflict)
    }

    pub async fn get_record(
        &self,
        employee_id: u64,
        day: NaiveDate,
    ) -> Result<Option<AttendanceRecord>> {
        self.io(self.store.get_record(employee_id, day)).await
    }

    /// Records newest day first; `None` lists every employee.
    pub async fn list_records(&self, employee_id: Option<u64>) -> Result<Vec<AttendanceRecord>> {
        self.io(self.store.list_records(employee_id)).await
    }

    pub async fn check_in(
        &self,
        principal: &Principal,
        location: Location,
    ) -> Result<AttendanceRecord> {
        self.open_day(principal.id, self.clock.now(), location).await
    }

    pub async fn check_out(
        &self,
        principal: &Principal,
        location: Location,
    ) -> Result<AttendanceRecord> {
        self.close_day(principal.id, self.clock.now(), location).await
    }

    pub async fn list_my_attendance(&self, principal: &Principal) -> Result<Vec<AttendanceRecord>> {
        self.list_records(Some(principal.id)).await
    }

    pub async fn list_team_attendance(
        &self,
        principal: &Principal,
    ) -> Result<Vec<AttendanceRecord>> {
        if !principal.is_admin() {
            return Err(EngineError::Forbidden);
        }
        self.list_records(None).await
    }
}
