use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Lifecycle state of one employee's day.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    Pending,
    Valid,
    Invalid,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Location {
    #[schema(example = 23.8103)]
    pub latitude: f64,
    #[schema(example = 90.4125)]
    pub longitude: f64,
}

impl Location {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// One record per (employee_id, day).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub employee_id: u64,
    pub day: NaiveDate,
    pub check_in: Option<DateTime<Utc>>,
    pub check_in_location: Option<Location>,
    pub check_out: Option<DateTime<Utc>>,
    pub check_out_location: Option<Location>,
    pub total_seconds: Option<i64>,
    pub status: AttendanceStatus,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    /// A fresh PENDING record opened by a check-in.
    pub fn opened(
        employee_id: u64,
        day: NaiveDate,
        at: DateTime<Utc>,
        location: Location,
    ) -> Self {
        Self {
            employee_id,
            day,
            check_in: Some(at),
            check_in_location: Some(location),
            check_out: None,
            check_out_location: None,
            total_seconds: None,
            status: AttendanceStatus::Pending,
            version: 0,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn total_duration(&self) -> Option<Duration> {
        self.total_seconds.map(Duration::seconds)
    }

    pub fn total_hours(&self) -> f64 {
        self.total_duration()
            .map_or(0.0, |d| d.num_seconds() as f64 / 3600.0)
    }
}
