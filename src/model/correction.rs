use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CorrectionStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

/// An employee's request to amend one attendance day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionRequest {
    pub id: u64,
    pub employee_id: u64,
    pub day: NaiveDate,
    pub requested_check_in: Option<DateTime<Utc>>,
    pub requested_check_out: Option<DateTime<Utc>>,
    pub reason: String,
    pub status: CorrectionStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<u64>,
    pub review_comments: Option<String>,
    pub version: u64,
}

impl CorrectionRequest {
    /// Expiry is informational: an expired request is still decidable.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == CorrectionStatus::Pending && now > self.expires_at
    }
}

/// Fields supplied when filing a correction; the store assigns `id` and `version`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCorrection {
    pub employee_id: u64,
    pub day: NaiveDate,
    pub requested_check_in: Option<DateTime<Utc>>,
    pub requested_check_out: Option<DateTime<Utc>>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NewCorrection {
    pub fn into_request(self, id: u64) -> CorrectionRequest {
        CorrectionRequest {
            id,
            employee_id: self.employee_id,
            day: self.day,
            requested_check_in: self.requested_check_in,
            requested_check_out: self.requested_check_out,
            reason: self.reason,
            status: CorrectionStatus::Pending,
            created_at: self.created_at,
            expires_at: self.expires_at,
            reviewed_at: None,
            reviewed_by: None,
            review_comments: None,
            version: 0,
        }
    }
}
