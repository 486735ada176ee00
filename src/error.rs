use std::fmt::Display;

use axum::{Json, http::StatusCode};
use serde_json::{Value, json};
use sqlx::error::ErrorKind;

/// Error half of every handler result: a status plus `{"error": "..."}`.
pub type ApiError = (StatusCode, Json<Value>);

/// MySQL `ER_DATA_TOO_LONG`.
const MYSQL_DATA_TOO_LONG: u16 = 1406;

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

pub fn internal_error<E: Display>(error: E) -> ApiError {
    tracing::error!("Internal error: {}", error);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

/// Domain errors that know which status they surface as.
pub trait ErrorStatus: Display {
    fn status(&self) -> StatusCode;

    fn message(&self) -> String {
        self.to_string()
    }
}

pub fn domain_error<E: ErrorStatus>(error: E) -> ApiError {
    let status = error.status();
    if status.is_server_error() {
        tracing::error!(status = %status, "{}", error);
    } else {
        tracing::debug!(status = %status, "{}", error);
    }
    api_error(status, error.message())
}

/// Maps a raw database failure to the status and message a client may see.
pub fn classify_database_error(error: &sqlx::Error) -> (StatusCode, &'static str) {
    let sqlx::Error::Database(db_error) = error else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
    };

    let too_long = db_error
        .try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
        .is_some_and(|mysql| mysql.number() == MYSQL_DATA_TOO_LONG);
    if too_long {
        return (StatusCode::BAD_REQUEST, "Field value too long");
    }

    match db_error.kind() {
        ErrorKind::UniqueViolation => (StatusCode::CONFLICT, "DOI already exists"),
        ErrorKind::NotNullViolation => (StatusCode::BAD_REQUEST, "Missing required field"),
        ErrorKind::ForeignKeyViolation => {
            (StatusCode::BAD_REQUEST, "Referenced record does not exist")
        }
        ErrorKind::CheckViolation => (StatusCode::BAD_REQUEST, "Invalid field value"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
    }
}

pub fn database_error(error: sqlx::Error) -> ApiError {
    let (status, message) = classify_database_error(&error);
    if status.is_server_error() {
        tracing::error!("Database error: {}", error);
    } else {
        tracing::debug!(status = %status, "Database constraint rejected write: {}", error);
    }
    api_error(status, message)
}

pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db_error) if db_error.is_unique_violation())
}
