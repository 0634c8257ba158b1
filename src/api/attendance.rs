use crate::auth::auth::AuthUser;
use crate::engine::Engine;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, Location};
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct LocationPayload {
    pub location: Location,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceResponse {
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "2026-01-01T09:00:00Z", format = "date-time", value_type = String, nullable = true)]
    pub check_in: Option<DateTime<Utc>>,
    pub check_in_location: Option<Location>,
    #[schema(example = "2026-01-01T17:30:00Z", format = "date-time", value_type = String, nullable = true)]
    pub check_out: Option<DateTime<Utc>>,
    pub check_out_location: Option<Location>,
    #[schema(example = 8.5)]
    pub total_hours: f64,
    pub status: AttendanceStatus,
    #[schema(example = "2026-01-01T17:30:00Z", format = "date-time", value_type = String)]
    pub updated_at: DateTime<Utc>,
}

impl From<AttendanceRecord> for AttendanceResponse {
    fn from(record: AttendanceRecord) -> Self {
        Self {
            total_hours: record.total_hours(),
            employee_id: record.employee_id,
            date: record.day,
            check_in: record.check_in,
            check_in_location: record.check_in_location,
            check_out: record.check_out,
            check_out_location: record.check_out_location,
            status: record.status,
            updated_at: record.updated_at,
        }
    }
}

fn to_responses(records: Vec<AttendanceRecord>) -> Vec<AttendanceResponse> {
    records.into_iter().map(AttendanceResponse::from).collect()
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body = LocationPayload,
    responses(
        (status = 200, description = "Checked in successfully", body = AttendanceResponse),
        (status = 400, description = "Invalid location"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Already checked in today", body = Object, example = json!({
            "message": "Already checked in on 2026-01-01"
        })),
        (status = 503, description = "Store unavailable")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    engine: web::Data<Engine>,
    payload: web::Json<LocationPayload>,
) -> actix_web::Result<impl Responder> {
    let record = engine.check_in(&auth.principal(), payload.location).await?;
    Ok(HttpResponse::Ok().json(AttendanceResponse::from(record)))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    request_body = LocationPayload,
    responses(
        (status = 200, description = "Checked out successfully", body = AttendanceResponse),
        (status = 400, description = "Invalid location or check-out not after check-in"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "No active check-in, already checked out, or day invalidated", body = Object, example = json!({
            "message": "No active check-in found for 2026-01-01"
        })),
        (status = 503, description = "Store unavailable")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    engine: web::Data<Engine>,
    payload: web::Json<LocationPayload>,
) -> actix_web::Result<impl Responder> {
    let record = engine.check_out(&auth.principal(), payload.location).await?;
    Ok(HttpResponse::Ok().json(AttendanceResponse::from(record)))
}

/// Caller's own attendance, newest day first
#[utoipa::path(
    get,
    path = "/api/attendance",
    responses(
        (status = 200, description = "Attendance history", body = Vec<AttendanceResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn my_attendance(
    auth: AuthUser,
    engine: web::Data<Engine>,
) -> actix_web::Result<impl Responder> {
    let records = engine.list_my_attendance(&auth.principal()).await?;
    Ok(HttpResponse::Ok().json(to_responses(records)))
}

/// Everyone's attendance (Admin)
#[utoipa::path(
    get,
    path = "/api/attendance/team",
    responses(
        (status = 200, description = "Team attendance", body = Vec<AttendanceResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn team_attendance(
    auth: AuthUser,
    engine: web::Data<Engine>,
) -> actix_web::Result<impl Responder> {
    let records = engine.list_team_attendance(&auth.principal()).await?;
    Ok(HttpResponse::Ok().json(to_responses(records)))
}
