//! Transition rules shared by check-in/out, correction review and the sweep.
//!
//! Everything here is pure: a rule takes the current row and returns the row
//! to write, or the error explaining why the transition is not allowed.

use chrono::{DateTime, SubsecRound, Utc};

use crate::error::{EngineError, Result};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, Location};
use crate::model::correction::{CorrectionRequest, CorrectionStatus};

pub fn check_location(location: &Location) -> Result<()> {
    if location.is_valid() {
        Ok(())
    } else {
        Err(EngineError::validation(
            "Location must have latitude in [-90, 90] and longitude in [-180, 180]",
        ))
    }
}

/// Sets the check-in of a row that exists without one.
pub fn check_in(
    record: &AttendanceRecord,
    at: DateTime<Utc>,
    location: Location,
) -> Result<AttendanceRecord> {
    if record.check_in.is_some() {
        return Err(EngineError::AlreadyCheckedIn { day: record.day });
    }
    Ok(AttendanceRecord {
        check_in: Some(at),
        check_in_location: Some(location),
        status: AttendanceStatus::Pending,
        updated_at: at,
        ..record.clone()
    })
}

pub fn check_out(
    record: &AttendanceRecord,
    at: DateTime<Utc>,
    location: Location,
) -> Result<AttendanceRecord> {
    let day = record.day;
    let Some(check_in) = record.check_in else {
        return Err(EngineError::NoActiveCheckIn { day });
    };
    if record.check_out.is_some() {
        return Err(EngineError::AlreadyCheckedOut { day });
    }
    if record.status == AttendanceStatus::Invalid {
        return Err(EngineError::DayInvalidated { day });
    }
    if at <= check_in {
        return Err(EngineError::InvalidInterval);
    }
    Ok(AttendanceRecord {
        check_out: Some(at),
        check_out_location: Some(location),
        total_seconds: Some((at - check_in).num_seconds()),
        status: AttendanceStatus::Valid,
        updated_at: at,
        ..record.clone()
    })
}

/// Normalised fields of a correction request.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionFields {
    pub requested_check_in: Option<DateTime<Utc>>,
    pub requested_check_out: Option<DateTime<Utc>>,
    pub reason: String,
}

pub fn correction_fields(
    requested_check_in: Option<DateTime<Utc>>,
    requested_check_out: Option<DateTime<Utc>>,
    reason: &str,
) -> Result<CorrectionFields> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(EngineError::validation("Reason is required"));
    }
    if requested_check_in.is_none() && requested_check_out.is_none() {
        return Err(EngineError::validation(
            "At least one of requested_check_in or requested_check_out is required",
        ));
    }
    let requested_check_in = requested_check_in.map(|t| t.trunc_subsecs(0));
    let requested_check_out = requested_check_out.map(|t| t.trunc_subsecs(0));
    if let (Some(i), Some(o)) = (requested_check_in, requested_check_out) {
        if o <= i {
            return Err(EngineError::InvalidInterval);
        }
    }
    Ok(CorrectionFields {
        requested_check_in,
        requested_check_out,
        reason: reason.to_string(),
    })
}

/// Overlays an approved correction on the record.
///
/// Requested times replace stored ones; missing ones are kept. A complete
/// day becomes VALID whatever its previous status, which is the only way out
/// of INVALID. An incomplete day keeps its status.
pub fn reconcile(
    record: &AttendanceRecord,
    correction: &CorrectionRequest,
    now: DateTime<Utc>,
) -> Result<AttendanceRecord> {
    let check_in = correction.requested_check_in.or(record.check_in);
    let check_out = correction.requested_check_out.or(record.check_out);

    let mut updated = AttendanceRecord {
        check_in,
        check_out,
        updated_at: now,
        ..record.clone()
    };
    match (check_in, check_out) {
        (None, Some(_)) => {
            return Err(EngineError::validation(
                "Correction would leave a check-out without a check-in",
            ));
        }
        (Some(i), Some(o)) => {
            if o <= i {
                return Err(EngineError::InvalidInterval);
            }
            updated.total_seconds = Some((o - i).num_seconds());
            updated.status = AttendanceStatus::Valid;
        }
        _ => updated.total_seconds = None,
    }
    Ok(updated)
}

/// Stamps the terminal review state onto a PENDING correction.
pub fn review(
    correction: &CorrectionRequest,
    status: CorrectionStatus,
    reviewer: u64,
    comments: Option<&str>,
    now: DateTime<Utc>,
) -> CorrectionRequest {
    CorrectionRequest {
        status,
        reviewed_at: Some(now),
        reviewed_by: Some(reviewer),
        review_comments: comments.map(str::to_string),
        ..correction.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::correction::NewCorrection;
    use chrono::Duration;

    const HERE: Location = Location {
        latitude: 51.5,
        longitude: -0.12,
    };

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn open(rfc3339: &str) -> AttendanceRecord {
        let t = at(rfc3339);
        AttendanceRecord::opened(1, t.date_naive(), t, HERE)
    }

    fn correction(
        check_in: Option<&str>,
        check_out: Option<&str>,
    ) -> CorrectionRequest {
        let now = at("2024-03-02T08:00:00Z");
        NewCorrection {
            employee_id: 1,
            day: at("2024-03-01T00:00:00Z").date_naive(),
            requested_check_in: check_in.map(at),
            requested_check_out: check_out.map(at),
            reason: "badge reader down".into(),
            created_at: now,
            expires_at: now + Duration::hours(48),
        }
        .into_request(1)
    }

    #[test]
    fn check_out_computes_exact_duration() {
        let record = open("2024-03-01T09:00:00Z");
        let closed = check_out(&record, at("2024-03-01T17:30:00Z"), HERE).unwrap();
        assert_eq!(closed.status, AttendanceStatus::Valid);
        assert_eq!(closed.total_duration(), Some(Duration::minutes(510)));
        assert_eq!(closed.check_out_location, Some(HERE));
    }

    #[test]
    fn check_out_rejects_non_positive_interval() {
        let record = open("2024-03-01T09:00:00Z");
        assert!(matches!(
            check_out(&record, at("2024-03-01T09:00:00Z"), HERE),
            Err(EngineError::InvalidInterval)
        ));
        assert!(matches!(
            check_out(&record, at("2024-03-01T08:59:59Z"), HERE),
            Err(EngineError::InvalidInterval)
        ));
    }

    #[test]
    fn check_out_preconditions() {
        let mut record = open("2024-03-01T09:00:00Z");
        record.check_in = None;
        assert!(matches!(
            check_out(&record, at("2024-03-01T17:00:00Z"), HERE),
            Err(EngineError::NoActiveCheckIn { .. })
        ));

        let closed = check_out(&open("2024-03-01T09:00:00Z"), at("2024-03-01T17:00:00Z"), HERE)
            .unwrap();
        assert!(matches!(
            check_out(&closed, at("2024-03-01T18:00:00Z"), HERE),
            Err(EngineError::AlreadyCheckedOut { .. })
        ));

        let mut swept = open("2024-03-01T09:00:00Z");
        swept.status = AttendanceStatus::Invalid;
        assert!(matches!(
            check_out(&swept, at("2024-03-01T22:00:00Z"), HERE),
            Err(EngineError::DayInvalidated { .. })
        ));
    }

    #[test]
    fn check_in_fills_a_blank_row_only() {
        let record = open("2024-03-01T09:00:00Z");
        assert!(matches!(
            check_in(&record, at("2024-03-01T10:00:00Z"), HERE),
            Err(EngineError::AlreadyCheckedIn { .. })
        ));

        let mut blank = record.clone();
        blank.check_in = None;
        blank.check_in_location = None;
        let filled = check_in(&blank, at("2024-03-01T10:00:00Z"), HERE).unwrap();
        assert_eq!(filled.check_in, Some(at("2024-03-01T10:00:00Z")));
        assert_eq!(filled.status, AttendanceStatus::Pending);
    }

    #[test]
    fn correction_fields_validation() {
        assert!(matches!(
            correction_fields(Some(at("2024-03-01T09:00:00Z")), None, "   "),
            Err(EngineError::Validation { .. })
        ));
        assert!(matches!(
            correction_fields(None, None, "forgot"),
            Err(EngineError::Validation { .. })
        ));
        assert!(matches!(
            correction_fields(
                Some(at("2024-03-01T17:00:00Z")),
                Some(at("2024-03-01T09:00:00Z")),
                "swapped"
            ),
            Err(EngineError::InvalidInterval)
        ));

        let fields = correction_fields(
            Some(at("2024-03-01T09:00:00.750Z")),
            None,
            "  forgot  ",
        )
        .unwrap();
        assert_eq!(fields.reason, "forgot");
        assert_eq!(fields.requested_check_in, Some(at("2024-03-01T09:00:00Z")));
    }

    #[test]
    fn reconcile_revives_invalid_day() {
        let mut record = open("2024-03-01T09:00:00Z");
        record.status = AttendanceStatus::Invalid;
        let fix = correction(Some("2024-03-01T09:00:00Z"), Some("2024-03-01T17:30:00Z"));

        let now = at("2024-03-02T10:00:00Z");
        let updated = reconcile(&record, &fix, now).unwrap();
        assert_eq!(updated.status, AttendanceStatus::Valid);
        assert_eq!(updated.total_seconds, Some(30_600));
        assert_eq!(updated.updated_at, now);
    }

    #[test]
    fn reconcile_keeps_fields_not_requested() {
        let record = open("2024-03-01T09:00:00Z");
        let fix = correction(None, Some("2024-03-01T18:00:00Z"));
        let updated = reconcile(&record, &fix, at("2024-03-02T10:00:00Z")).unwrap();
        assert_eq!(updated.check_in, Some(at("2024-03-01T09:00:00Z")));
        assert_eq!(updated.total_seconds, Some(9 * 3600));
        assert_eq!(updated.status, AttendanceStatus::Valid);

        let partial = correction(Some("2024-03-01T08:30:00Z"), None);
        let updated = reconcile(&record, &partial, at("2024-03-02T10:00:00Z")).unwrap();
        assert_eq!(updated.status, AttendanceStatus::Pending);
        assert_eq!(updated.total_seconds, None);
    }

    #[test]
    fn reconcile_refuses_broken_interval() {
        let record = open("2024-03-01T09:00:00Z");
        let early_out = correction(None, Some("2024-03-01T08:00:00Z"));
        assert!(matches!(
            reconcile(&record, &early_out, at("2024-03-02T10:00:00Z")),
            Err(EngineError::InvalidInterval)
        ));

        let mut blank = record.clone();
        blank.check_in = None;
        assert!(matches!(
            reconcile(&blank, &early_out, at("2024-03-02T10:00:00Z")),
            Err(EngineError::Validation { .. })
        ));
    }

    #[test]
    fn review_stamps_metadata() {
        let fix = correction(Some("2024-03-01T09:00:00Z"), None);
        let now = at("2024-03-02T10:00:00Z");
        let reviewed = review(&fix, CorrectionStatus::Rejected, 42, Some("no evidence"), now);
        assert_eq!(reviewed.status, CorrectionStatus::Rejected);
        assert_eq!(reviewed.reviewed_by, Some(42));
        assert_eq!(reviewed.reviewed_at, Some(now));
        assert_eq!(reviewed.review_comments.as_deref(), Some("no evidence"));
        assert_eq!(reviewed.version, fix.version);
    }
}
