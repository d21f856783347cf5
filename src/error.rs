use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use sqlx::error::ErrorKind;
use thiserror::Error;

use crate::response::ApiResponse;

const INTERNAL_MESSAGE: &str = "Internal Server Error";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error")]
    Database(#[source] sqlx::Error),

    #[error("ORM error")]
    Orm(#[source] DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Orm(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message that is safe to hand to the client.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Orm(_) | AppError::Internal(_) => {
                INTERNAL_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{what} not found."))
    }

    /// Replace the generic constraint message with one the caller can act on.
    pub fn on_conflict(self, message: &str) -> Self {
        match self {
            AppError::Conflict(_) => AppError::Conflict(message.to_string()),
            other => other,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            match db_err.kind() {
                ErrorKind::UniqueViolation => {
                    return AppError::Conflict("Resource already exists.".into());
                }
                ErrorKind::ForeignKeyViolation => {
                    return AppError::Conflict(
                        "Resource is referenced by other records.".into(),
                    );
                }
                ErrorKind::CheckViolation => {
                    return AppError::Validation("Value violates a data constraint.".into());
                }
                _ => {}
            }
        }
        AppError::Database(err)
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                AppError::Conflict("Resource already exists.".into())
            }
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
                AppError::Conflict("Resource is referenced by other records.".into())
            }
            _ => AppError::Orm(err),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "request rejected");
        }

        let body = ApiResponse::<()>::error(self.public_message());
        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_distinct_status_codes() {
        let cases = [
            (AppError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (AppError::Unauthenticated("who".into()), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (AppError::not_found("Order"), StatusCode::NOT_FOUND),
            (AppError::Conflict("dup".into()), StatusCode::CONFLICT),
            (
                AppError::Internal(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status_code(), expected, "{err:?}");
        }
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = AppError::Internal(anyhow::anyhow!("relation \"users\" does not exist"));
        assert_eq!(err.public_message(), "Internal Server Error");

        let err = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.public_message(), "Internal Server Error");
    }

    #[test]
    fn non_constraint_sqlx_errors_stay_internal() {
        let err: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, AppError::Database(_)));
    }

    #[test]
    fn on_conflict_only_rewrites_conflicts() {
        let err = AppError::Conflict("Resource already exists.".into())
            .on_conflict("Email already registered.");
        assert_eq!(err.public_message(), "Email already registered.");

        let err = AppError::not_found("User").on_conflict("Email already registered.");
        assert_eq!(err.public_message(), "User not found.");
    }

    #[test]
    fn classified_messages_pass_through() {
        let err = AppError::not_found("Category");
        assert_eq!(err.public_message(), "Category not found.");
    }
}
