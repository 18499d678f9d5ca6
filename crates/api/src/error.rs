use actix_web::{
    http::{header, StatusCode},
    HttpResponse,
};
use chime_domain::{GrammarError, TimeExprError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChimeError {
    #[error("Internal server error")]
    InternalError,
    #[error("Malformed command: {0}")]
    SyntaxError(String),
    #[error("Could not understand the time `{0}`")]
    InvalidTime(String),
    #[error("The time `{0}` has already passed")]
    PastTime(String),
    #[error("Invalid cron expression: {0}")]
    InvalidCron(String),
    #[error("A reminder with the text `{0}` already exists in this room")]
    DuplicateReminder(String),
    #[error("There is no reminder with the text `{0}` in this room")]
    UnknownReminder(String),
    #[error("There is no alarm with the text `{0}` in this room")]
    UnknownAlarm(String),
    #[error("Unknown command `{0}`")]
    UnknownCommand(String),
}

impl From<GrammarError> for ChimeError {
    fn from(e: GrammarError) -> Self {
        match e {
            GrammarError::Syntax { .. } => ChimeError::SyntaxError(e.to_string()),
            GrammarError::Time(TimeExprError::Unparseable(expr)) => ChimeError::InvalidTime(expr),
            GrammarError::Time(TimeExprError::Past(expr)) => ChimeError::PastTime(expr),
            GrammarError::Cron(e) => ChimeError::InvalidCron(e.to_string()),
        }
    }
}

impl actix_web::error::ResponseError for ChimeError {
    fn status_code(&self) -> StatusCode {
        match *self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::SyntaxError(_) => StatusCode::BAD_REQUEST,
            Self::InvalidTime(_) => StatusCode::BAD_REQUEST,
            Self::PastTime(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCron(_) => StatusCode::BAD_REQUEST,
            Self::DuplicateReminder(_) => StatusCode::CONFLICT,
            Self::UnknownReminder(_) => StatusCode::NOT_FOUND,
            Self::UnknownAlarm(_) => StatusCode::NOT_FOUND,
            Self::UnknownCommand(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header((header::CONTENT_TYPE, "text/html; charset=utf-8"))
            .body(self.to_string())
    }
}
