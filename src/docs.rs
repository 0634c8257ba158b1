use crate::api::attendance::{AttendanceResponse, LocationPayload};
use crate::api::correction::{
    CorrectionResponse, CreateCorrection, DecisionResponse, ReviewCorrection,
};
use crate::model::attendance::{AttendanceStatus, Location};
use crate::model::correction::CorrectionStatus;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance API",
        version = "1.0.0",
        description = r#"
## Employee Attendance

Daily check-in and check-out with location capture, plus an approval flow
for correcting days that went wrong.

### Rules
- One attendance record per employee per calendar day
- Check-out must follow an open check-in on the same day
- A check-in left open past the staleness threshold is marked **invalid**
- Invalid days can only be repaired through an approved correction

### Security
Every endpoint expects a **JWT Bearer** access token.
Reviewing corrections and viewing team attendance require the **Admin** role.

### Response Format
- JSON responses
- Errors carry a `message` field
"#,
    ),
    paths(
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::my_attendance,
        crate::api::attendance::team_attendance,

        crate::api::correction::request_correction,
        crate::api::correction::my_corrections,
        crate::api::correction::pending_corrections,
        crate::api::correction::approve_correction,
        crate::api::correction::reject_correction
    ),
    components(
        schemas(
            Location,
            LocationPayload,
            AttendanceStatus,
            AttendanceResponse,
            CorrectionStatus,
            CreateCorrection,
            ReviewCorrection,
            CorrectionResponse,
            DecisionResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Check-in, check-out and attendance history"),
        (name = "Corrections", description = "Correction requests and admin review"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
