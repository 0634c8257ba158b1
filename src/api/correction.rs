use crate::api::attendance::AttendanceResponse;
use crate::auth::auth::AuthUser;
use crate::engine::Engine;
use crate::engine::corrections::DecisionOutcome;
use crate::model::correction::{CorrectionRequest, CorrectionStatus, Decision};
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateCorrection {
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "2026-01-01T09:00:00Z", format = "date-time", value_type = String, nullable = true)]
    pub requested_check_in: Option<DateTime<Utc>>,
    #[schema(example = "2026-01-01T17:30:00Z", format = "date-time", value_type = String, nullable = true)]
    pub requested_check_out: Option<DateTime<Utc>>,
    #[schema(example = "Forgot to check out")]
    pub reason: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ReviewCorrection {
    #[schema(example = "Confirmed with team lead", nullable = true)]
    pub comments: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CorrectionResponse {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(format = "date-time", value_type = String, nullable = true)]
    pub requested_check_in: Option<DateTime<Utc>>,
    #[schema(format = "date-time", value_type = String, nullable = true)]
    pub requested_check_out: Option<DateTime<Utc>>,
    pub reason: String,
    pub status: CorrectionStatus,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
    #[schema(format = "date-time", value_type = String)]
    pub expires_at: DateTime<Utc>,
    /// Pending and past its review window. Still decidable.
    pub expired: bool,
    #[schema(format = "date-time", value_type = String, nullable = true)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[schema(nullable = true)]
    pub reviewed_by: Option<u64>,
    #[schema(nullable = true)]
    pub review_comments: Option<String>,
}

impl CorrectionResponse {
    fn new(correction: CorrectionRequest, now: DateTime<Utc>) -> Self {
        Self {
            expired: correction.is_expired(now),
            id: correction.id,
            employee_id: correction.employee_id,
            date: correction.day,
            requested_check_in: correction.requested_check_in,
            requested_check_out: correction.requested_check_out,
            reason: correction.reason,
            status: correction.status,
            created_at: correction.created_at,
            expires_at: correction.expires_at,
            reviewed_at: correction.reviewed_at,
            reviewed_by: correction.reviewed_by,
            review_comments: correction.review_comments,
        }
    }

    fn list(corrections: Vec<CorrectionRequest>, now: DateTime<Utc>) -> Vec<Self> {
        corrections.into_iter().map(|c| Self::new(c, now)).collect()
    }
}

#[derive(Serialize, ToSchema)]
pub struct DecisionResponse {
    pub correction: CorrectionResponse,
    #[schema(nullable = true)]
    pub record: Option<AttendanceResponse>,
}

impl DecisionResponse {
    fn new(outcome: DecisionOutcome, now: DateTime<Utc>) -> Self {
        Self {
            correction: CorrectionResponse::new(outcome.correction, now),
            record: outcome.record.map(Into::into),
        }
    }
}

/* =========================
Request a correction
========================= */
#[utoipa::path(
    post,
    path = "/api/corrections",
    request_body = CreateCorrection,
    responses(
        (status = 201, description = "Correction submitted", body = CorrectionResponse),
        (status = 400, description = "Missing reason, no requested times, or check-out not after check-in"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No attendance record for that date"),
        (status = 409, description = "A correction is already pending for that date", body = Object, example = json!({
            "message": "A correction for 2026-01-01 is already pending"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Corrections"
)]
pub async fn request_correction(
    auth: AuthUser,
    engine: web::Data<Engine>,
    payload: web::Json<CreateCorrection>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let correction = engine
        .request_correction(
            &auth.principal(),
            payload.date,
            payload.requested_check_in,
            payload.requested_check_out,
            &payload.reason,
        )
        .await?;
    Ok(HttpResponse::Created().json(CorrectionResponse::new(correction, engine.now())))
}

/* =========================
Caller's own corrections
========================= */
#[utoipa::path(
    get,
    path = "/api/corrections/mine",
    responses(
        (status = 200, description = "Caller's corrections, newest first", body = Vec<CorrectionResponse>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Corrections"
)]
pub async fn my_corrections(
    auth: AuthUser,
    engine: web::Data<Engine>,
) -> actix_web::Result<impl Responder> {
    let corrections = engine.list_my_corrections(&auth.principal()).await?;
    Ok(HttpResponse::Ok().json(CorrectionResponse::list(corrections, engine.now())))
}

/* =========================
Pending queue (Admin)
========================= */
#[utoipa::path(
    get,
    path = "/api/corrections/pending",
    responses(
        (status = 200, description = "Pending corrections, newest first", body = Vec<CorrectionResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Corrections"
)]
pub async fn pending_corrections(
    auth: AuthUser,
    engine: web::Data<Engine>,
) -> actix_web::Result<impl Responder> {
    let corrections = engine.list_pending_corrections(&auth.principal()).await?;
    Ok(HttpResponse::Ok().json(CorrectionResponse::list(corrections, engine.now())))
}

/* =========================
Approve correction (Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/corrections/{correction_id}/approve",
    params(
        ("correction_id" = u64, Path, description = "ID of the correction to approve")
    ),
    request_body(content = ReviewCorrection, description = "Optional review comments"),
    responses(
        (status = 200, description = "Correction approved and attendance reconciled", body = DecisionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Correction not found"),
        (status = 409, description = "Correction already processed", body = Object, example = json!({
            "message": "Correction 1 already processed"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Corrections"
)]
pub async fn approve_correction(
    auth: AuthUser,
    engine: web::Data<Engine>,
    path: web::Path<u64>,
    payload: Option<web::Json<ReviewCorrection>>,
) -> actix_web::Result<impl Responder> {
    let correction_id = path.into_inner();
    tracing::info!(reviewer = %auth.username, correction_id, "Approve correction requested");

    let comments = payload.and_then(|p| p.into_inner().comments);
    let outcome = engine
        .decide(
            &auth.principal(),
            correction_id,
            Decision::Approve,
            comments.as_deref(),
        )
        .await?;
    Ok(HttpResponse::Ok().json(DecisionResponse::new(outcome, engine.now())))
}

/* =========================
Reject correction (Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/corrections/{correction_id}/reject",
    params(
        ("correction_id" = u64, Path, description = "ID of the correction to reject")
    ),
    request_body = ReviewCorrection,
    responses(
        (status = 200, description = "Correction rejected", body = DecisionResponse),
        (status = 400, description = "Comments are required when rejecting"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Correction not found"),
        (status = 409, description = "Correction already processed")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Corrections"
)]
pub async fn reject_correction(
    auth: AuthUser,
    engine: web::Data<Engine>,
    path: web::Path<u64>,
    payload: web::Json<ReviewCorrection>,
) -> actix_web::Result<impl Responder> {
    let correction_id = path.into_inner();
    tracing::info!(reviewer = %auth.username, correction_id, "Reject correction requested");

    let outcome = engine
        .decide(
            &auth.principal(),
            correction_id,
            Decision::Reject,
            payload.comments.as_deref(),
        )
        .await?;
    Ok(HttpResponse::Ok().json(DecisionResponse::new(outcome, engine.now())))
}
