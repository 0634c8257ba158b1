//! In-memory [`Store`] used by tests and by development runs without a database.
//!
//! State is lost when the process exits. Each method takes the lock once, so
//! every single-row operation is atomic just like a row update in MySQL.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::{CasResult, CorrectionFilter, InsertResult, Store};
use crate::error::{EngineError, Result};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::correction::{CorrectionRequest, CorrectionStatus, NewCorrection};

#[derive(Debug, Default)]
struct Corrections {
    next_id: u64,
    rows: BTreeMap<u64, CorrectionRequest>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<(u64, NaiveDate), AttendanceRecord>>,
    corrections: RwLock<Corrections>,
}

fn poison_err<T>(_: PoisonError<T>) -> EngineError {
    EngineError::store("lock poisoned")
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_record(
        &self,
        employee_id: u64,
        day: NaiveDate,
    ) -> Result<Option<AttendanceRecord>> {
        let records = self.records.read().map_err(poison_err)?;
        Ok(records.get(&(employee_id, day)).cloned())
    }

    async fn insert_record(&self, record: &AttendanceRecord) -> Result<InsertResult<AttendanceRecord>> {
        let mut records = self.records.write().map_err(poison_err)?;
        let key = (record.employee_id, record.day);
        if records.contains_key(&key) {
            return Ok(InsertResult::Duplicate);
        }
        let stored = AttendanceRecord {
            version: 1,
            ..record.clone()
        };
        records.insert(key, stored.clone());
        Ok(InsertResult::Inserted(stored))
    }

    async fn cas_record(&self, record: &AttendanceRecord) -> Result<CasResult> {
        let mut records = self.records.write().map_err(poison_err)?;
        let Some(current) = records.get_mut(&(record.employee_id, record.day)) else {
            return Ok(CasResult::NotFound);
        };
        if current.version != record.version {
            return Ok(CasResult::VersionConflict {
                actual: current.version,
            });
        }
        *current = AttendanceRecord {
            version: record.version + 1,
            ..record.clone()
        };
        Ok(CasResult::Success)
    }

    async fn list_records(&self, employee_id: Option<u64>) -> Result<Vec<AttendanceRecord>> {
        let records = self.records.read().map_err(poison_err)?;
        let mut rows: Vec<AttendanceRecord> = records
            .values()
            .filter(|r| employee_id.is_none_or(|id| id == r.employee_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.day
                .cmp(&a.day)
                .then_with(|| a.employee_id.cmp(&b.employee_id))
        });
        Ok(rows)
    }

    async fn invalidate_stale(&self, cutoff: DateTime<Utc>, now: DateTime<Utc>) -> Result<u64> {
        let mut records = self.records.write().map_err(poison_err)?;
        let mut changed = 0;
        for record in records.values_mut() {
            let stale = record.status == AttendanceStatus::Pending
                && record.check_out.is_none()
                && record.check_in.is_some_and(|at| at < cutoff);
            if stale {
                record.status = AttendanceStatus::Invalid;
                record.updated_at = now;
                record.version += 1;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn insert_correction(
        &self,
        correction: NewCorrection,
    ) -> Result<InsertResult<CorrectionRequest>> {
        let mut corrections = self.corrections.write().map_err(poison_err)?;
        let pending_exists = corrections.rows.values().any(|c| {
            c.employee_id == correction.employee_id
                && c.day == correction.day
                && c.status == CorrectionStatus::Pending
        });
        if pending_exists {
            return Ok(InsertResult::Duplicate);
        }
        corrections.next_id += 1;
        let id = corrections.next_id;
        let stored = CorrectionRequest {
            version: 1,
            ..correction.into_request(id)
        };
        corrections.rows.insert(id, stored.clone());
        Ok(InsertResult::Inserted(stored))
    }

    async fn get_correction(&self, id: u64) -> Result<Option<CorrectionRequest>> {
        let corrections = self.corrections.read().map_err(poison_err)?;
        Ok(corrections.rows.get(&id).cloned())
    }

    async fn list_corrections(&self, filter: CorrectionFilter) -> Result<Vec<CorrectionRequest>> {
        let corrections = self.corrections.read().map_err(poison_err)?;
        // ids are handed out in creation order
        Ok(corrections
            .rows
            .values()
            .rev()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect())
    }

    async fn cas_correction(&self, correction: &CorrectionRequest) -> Result<CasResult> {
        let mut corrections = self.corrections.write().map_err(poison_err)?;
        let Some(current) = corrections.rows.get_mut(&correction.id) else {
            return Ok(CasResult::NotFound);
        };
        if current.version != correction.version {
            return Ok(CasResult::VersionConflict {
                actual: current.version,
            });
        }
        *current = CorrectionRequest {
            version: correction.version + 1,
            ..correction.clone()
        };
        Ok(CasResult::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::Location;
    use chrono::Duration;

    const HERE: Location = Location {
        latitude: 23.8,
        longitude: 90.4,
    };

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn opened(employee_id: u64, rfc3339: &str) -> AttendanceRecord {
        let t = at(rfc3339);
        AttendanceRecord::opened(employee_id, t.date_naive(), t, HERE)
    }

    #[actix_web::test]
    async fn insert_refuses_second_record_for_same_day() {
        let store = InMemoryStore::new();
        let first = opened(1, "2024-03-01T09:00:00Z");
        let InsertResult::Inserted(stored) = store.insert_record(&first).await.unwrap() else {
            panic!("first insert must succeed");
        };
        assert_eq!(stored.version, 1);

        let again = opened(1, "2024-03-01T10:00:00Z");
        assert_eq!(
            store.insert_record(&again).await.unwrap(),
            InsertResult::Duplicate
        );
        let other_employee = opened(2, "2024-03-01T10:00:00Z");
        assert!(matches!(
            store.insert_record(&other_employee).await.unwrap(),
            InsertResult::Inserted(_)
        ));
    }

    #[actix_web::test]
    async fn cas_rejects_stale_version() {
        let store = InMemoryStore::new();
        let InsertResult::Inserted(mut record) = store
            .insert_record(&opened(1, "2024-03-01T09:00:00Z"))
            .await
            .unwrap()
        else {
            panic!("insert");
        };

        record.status = AttendanceStatus::Valid;
        assert_eq!(store.cas_record(&record).await.unwrap(), CasResult::Success);
        assert_eq!(
            store.cas_record(&record).await.unwrap(),
            CasResult::VersionConflict { actual: 2 }
        );

        let missing = opened(9, "2024-03-01T09:00:00Z");
        assert_eq!(store.cas_record(&missing).await.unwrap(), CasResult::NotFound);
    }

    #[actix_web::test]
    async fn list_orders_by_day_descending() {
        let store = InMemoryStore::new();
        for (employee, when) in [
            (2, "2024-03-01T09:00:00Z"),
            (1, "2024-03-02T09:00:00Z"),
            (1, "2024-03-01T09:00:00Z"),
        ] {
            store.insert_record(&opened(employee, when)).await.unwrap();
        }

        let all: Vec<_> = store
            .list_records(None)
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.employee_id, r.day.to_string()))
            .collect();
        assert_eq!(
            all,
            vec![
                (1, "2024-03-02".to_string()),
                (1, "2024-03-01".to_string()),
                (2, "2024-03-01".to_string()),
            ]
        );
        assert_eq!(store.list_records(Some(2)).await.unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn invalidate_only_touches_stale_open_pending_rows() {
        let store = InMemoryStore::new();
        let stale = opened(1, "2024-03-01T09:00:00Z");
        let fresh = opened(2, "2024-03-01T20:00:00Z");
        let mut closed = opened(3, "2024-03-01T08:00:00Z");
        closed.check_out = Some(at("2024-03-01T17:00:00Z"));
        closed.status = AttendanceStatus::Valid;
        for r in [&stale, &fresh, &closed] {
            store.insert_record(r).await.unwrap();
        }

        let now = at("2024-03-01T21:01:00Z");
        let cutoff = now - Duration::hours(12);
        assert_eq!(store.invalidate_stale(cutoff, now).await.unwrap(), 1);
        assert_eq!(store.invalidate_stale(cutoff, now).await.unwrap(), 0);

        let swept = store.get_record(1, stale.day).await.unwrap().unwrap();
        assert_eq!(swept.status, AttendanceStatus::Invalid);
        assert_eq!(swept.updated_at, now);
        assert_eq!(swept.version, 2);
        let untouched = store.get_record(3, closed.day).await.unwrap().unwrap();
        assert_eq!(untouched.status, AttendanceStatus::Valid);
    }

    #[actix_web::test]
    async fn one_pending_correction_per_day() {
        let store = InMemoryStore::new();
        let now = at("2024-03-02T09:00:00Z");
        let new = NewCorrection {
            employee_id: 1,
            day: at("2024-03-01T09:00:00Z").date_naive(),
            requested_check_in: None,
            requested_check_out: Some(at("2024-03-01T17:00:00Z")),
            reason: "forgot to check out".into(),
            created_at: now,
            expires_at: now + Duration::hours(48),
        };

        let InsertResult::Inserted(mut first) =
            store.insert_correction(new.clone()).await.unwrap()
        else {
            panic!("insert");
        };
        assert_eq!(first.id, 1);
        assert_eq!(
            store.insert_correction(new.clone()).await.unwrap(),
            InsertResult::Duplicate
        );

        first.status = CorrectionStatus::Rejected;
        assert_eq!(store.cas_correction(&first).await.unwrap(), CasResult::Success);

        let InsertResult::Inserted(second) = store.insert_correction(new).await.unwrap() else {
            panic!("a decided correction frees the slot");
        };
        assert_eq!(second.id, 2);

        let mine = store
            .list_corrections(CorrectionFilter::for_employee(1))
            .await
            .unwrap();
        assert_eq!(mine.iter().map(|c| c.id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(
            store
                .list_corrections(CorrectionFilter::pending())
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
