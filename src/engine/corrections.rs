use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use super::{Engine, WRITE_ATTEMPTS, rules};
use crate::error::{EngineError, Result};
use crate::model::attendance::AttendanceRecord;
use crate::model::correction::{CorrectionRequest, CorrectionStatus, Decision, NewCorrection};
use crate::model::role::Principal;
use crate::store::{CasResult, CorrectionFilter, InsertResult};

/// Result of an administrator's decision.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    pub correction: CorrectionRequest,
    /// The reconciled record; only present on approval.
    pub record: Option<AttendanceRecord>,
}

impl Engine {
    /// Files a correction against one of the caller's own attendance days.
    pub async fn request_correction(
        &self,
        principal: &Principal,
        day: NaiveDate,
        requested_check_in: Option<DateTime<Utc>>,
        requested_check_out: Option<DateTime<Utc>>,
        reason: &str,
    ) -> Result<CorrectionRequest> {
        let fields = rules::correction_fields(requested_check_in, requested_check_out, reason)?;

        if self.get_record(principal.id, day).await?.is_none() {
            return Err(EngineError::not_found("Attendance record"));
        }

        let now = self.clock.now();
        let new = NewCorrection {
            employee_id: principal.id,
            day,
            requested_check_in: fields.requested_check_in,
            requested_check_out: fields.requested_check_out,
            reason: fields.reason,
            created_at: now,
            expires_at: now + self.settings.correction_window,
        };

        match self.io(self.store.insert_correction(new)).await? {
            InsertResult::Inserted(correction) => {
                info!(
                    correction_id = correction.id,
                    employee_id = principal.id,
                    %day,
                    "Correction requested"
                );
                Ok(correction)
            }
            InsertResult::Duplicate => Err(EngineError::CorrectionAlreadyPending { day }),
        }
    }

    /// Applies an administrator's decision to a PENDING correction.
    ///
    /// On approval the attendance row is reconciled first and the correction
    /// is marked APPROVED only afterwards, so a failure in between leaves the
    /// correction PENDING and decidable again. When the approval does not
    /// commit and the correction is not APPROVED, the record is put back.
    pub async fn decide(
        &self,
        admin: &Principal,
        correction_id: u64,
        decision: Decision,
        comments: Option<&str>,
    ) -> Result<DecisionOutcome> {
        if !admin.is_admin() {
            return Err(EngineError::Forbidden);
        }
        let correction = self
            .io(self.store.get_correction(correction_id))
            .await?
            .ok_or_else(|| EngineError::not_found("Correction"))?;
        if correction.status != CorrectionStatus::Pending {
            return Err(EngineError::AlreadyProcessed { id: correction_id });
        }

        let comments = comments.map(str::trim).filter(|c| !c.is_empty());
        let now = self.clock.now();

        match decision {
            Decision::Reject => {
                let comments = comments.ok_or(EngineError::CommentsRequired)?;
                let reviewed =
                    rules::review(&correction, CorrectionStatus::Rejected, admin.id, Some(comments), now);
                let correction = self.commit_review(reviewed).await?;
                info!(correction_id, reviewed_by = admin.id, "Correction rejected");
                Ok(DecisionOutcome {
                    correction,
                    record: None,
                })
            }
            Decision::Approve => {
                let (before, record) = self.reconcile(&correction, now).await?;
                let reviewed =
                    rules::review(&correction, CorrectionStatus::Approved, admin.id, comments, now);
                let correction = match self.commit_review(reviewed).await {
                    Ok(correction) => correction,
                    Err(e) => {
                        self.restore_unless_approved(correction_id, &before, &record)
                            .await;
                        return Err(e);
                    }
                };
                info!(
                    correction_id,
                    reviewed_by = admin.id,
                    status = %record.status,
                    "Correction approved"
                );
                Ok(DecisionOutcome {
                    correction,
                    record: Some(record),
                })
            }
        }
    }

    pub async fn list_pending_corrections(
        &self,
        admin: &Principal,
    ) -> Result<Vec<CorrectionRequest>> {
        if !admin.is_admin() {
            return Err(EngineError::Forbidden);
        }
        self.io(self.store.list_corrections(CorrectionFilter::pending()))
            .await
    }

    pub async fn list_my_corrections(
        &self,
        principal: &Principal,
    ) -> Result<Vec<CorrectionRequest>> {
        self.io(
            self.store
                .list_corrections(CorrectionFilter::for_employee(principal.id)),
        )
        .await
    }

    /// Writes the corrected record and returns it with the snapshot it replaced.
    async fn reconcile(
        &self,
        correction: &CorrectionRequest,
        now: DateTime<Utc>,
    ) -> Result<(AttendanceRecord, AttendanceRecord)> {
        let (employee_id, day) = (correction.employee_id, correction.day);
        for _ in 0..WRITE_ATTEMPTS {
            let current = self
                .get_record(employee_id, day)
                .await?
                .ok_or_else(|| EngineError::not_found("Attendance record"))?;
            let updated = rules::reconcile(&current, correction, now)?;
            if self.io(self.store.cas_record(&updated)).await?.is_success() {
                let applied = AttendanceRecord {
                    version: updated.version + 1,
                    ..updated
                };
                return Ok((current, applied));
            }
        }

        warn!(correction_id = correction.id, "Reconciliation lost the race twice");
        Err(EngineError::Conflict)
    }

    /// Undoes a reconciliation whose approval did not commit, unless the
    /// correction ended up APPROVED anyway (a concurrent approval won).
    async fn restore_unless_approved(
        &self,
        correction_id: u64,
        before: &AttendanceRecord,
        applied: &AttendanceRecord,
    ) {
        match self.io(self.store.get_correction(correction_id)).await {
            Ok(Some(c)) if c.status == CorrectionStatus::Approved => return,
            Ok(_) => {}
            Err(e) => {
                error!(correction_id, error = %e, "Could not re-read correction, restoring record anyway");
            }
        }

        let restore = AttendanceRecord {
            version: applied.version,
            ..before.clone()
        };
        match self.io(self.store.cas_record(&restore)).await {
            Ok(CasResult::Success) => warn!(
                correction_id,
                employee_id = before.employee_id,
                day = %before.day,
                "Approval lost to a concurrent review; attendance restored"
            ),
            Ok(miss) => error!(
                correction_id,
                employee_id = before.employee_id,
                day = %before.day,
                ?miss,
                "Attendance changed after an uncommitted approval; not restored"
            ),
            Err(e) => error!(
                correction_id,
                employee_id = before.employee_id,
                day = %before.day,
                error = %e,
                "Failed to restore attendance after an uncommitted approval"
            ),
        }
    }

    async fn commit_review(&self, reviewed: CorrectionRequest) -> Result<CorrectionRequest> {
        match self.io(self.store.cas_correction(&reviewed)).await? {
            CasResult::Success => Ok(CorrectionRequest {
                version: reviewed.version + 1,
                ..reviewed
            }),
            CasResult::NotFound => Err(EngineError::not_found("Correction")),
            // only reviews write a correction row, so a moved version means another review landed
            CasResult::VersionConflict { .. } => {
                warn!(
                    correction_id = reviewed.id,
                    "Correction was decided concurrently"
                );
                Err(EngineError::AlreadyProcessed { id: reviewed.id })
            }
        }
    }
}
