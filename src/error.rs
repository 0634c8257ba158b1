use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::NaiveDate;
use derive_more::Display;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Coarse class of an engine failure; decides how callers react to it.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Authorization,
    NotFound,
    Store,
    RaceLost,
}

#[derive(Debug, Display)]
pub enum EngineError {
    #[display(fmt = "{}", message)]
    Validation { message: String },

    #[display(fmt = "Comments are required for rejection")]
    CommentsRequired,

    #[display(fmt = "Check-out must be later than check-in")]
    InvalidInterval,

    #[display(fmt = "Already checked in on {}", day)]
    AlreadyCheckedIn { day: NaiveDate },

    #[display(fmt = "Already checked out on {}", day)]
    AlreadyCheckedOut { day: NaiveDate },

    #[display(fmt = "No active check-in found for {}", day)]
    NoActiveCheckIn { day: NaiveDate },

    #[display(fmt = "Attendance for {} was invalidated; request a correction", day)]
    DayInvalidated { day: NaiveDate },

    #[display(fmt = "A correction for {} is already pending", day)]
    CorrectionAlreadyPending { day: NaiveDate },

    #[display(fmt = "Correction {} already processed", id)]
    AlreadyProcessed { id: u64 },

    #[display(fmt = "Admin only")]
    Forbidden,

    #[display(fmt = "{} not found", what)]
    NotFound { what: String },

    #[display(fmt = "Record changed concurrently, retry the request")]
    Conflict,

    #[display(fmt = "Store error: {}", message)]
    Store { message: String },

    #[display(fmt = "Store did not respond in time")]
    Unavailable,
}

impl std::error::Error for EngineError {}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::CommentsRequired | Self::InvalidInterval => {
                ErrorKind::Validation
            }
            Self::AlreadyCheckedIn { .. }
            | Self::AlreadyCheckedOut { .. }
            | Self::NoActiveCheckIn { .. }
            | Self::DayInvalidated { .. }
            | Self::CorrectionAlreadyPending { .. }
            | Self::AlreadyProcessed { .. } => ErrorKind::Conflict,
            Self::Forbidden => ErrorKind::Authorization,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Store { .. } | Self::Unavailable => ErrorKind::Store,
            Self::Conflict => ErrorKind::RaceLost,
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        Self::store(e.to_string())
    }
}

impl ResponseError for EngineError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict | ErrorKind::RaceLost => StatusCode::CONFLICT,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Store => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self.kind() {
            ErrorKind::Store => {
                tracing::error!(error = %self, "Store failure");
                "Service temporarily unavailable".to_string()
            }
            _ => self.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "message": message
        }))
    }
}
