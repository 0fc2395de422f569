use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error};

use agora_db::{DbError, entity_name};
use agora_types::api::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::EmptyField(_) => ApiError::BadRequest(err.to_string()),
            DbError::ParentNotFound { table, id } => {
                ApiError::BadRequest(format!("parent {} {} does not exist", entity_name(table), id))
            }
            DbError::NotFound { table, id } => {
                ApiError::NotFound(format!("{} {} does not exist", entity_name(table), id))
            }
            DbError::CycleDetected { table, .. } => {
                error!(error = %err, "Corrupt hierarchy");
                ApiError::Conflict(format!("{} hierarchy is corrupt", entity_name(table)))
            }
            ref e if e.is_constraint_violation() => {
                debug!(error = %err, "Constraint violation");
                ApiError::Conflict("request conflicts with existing data".into())
            }
            _ => {
                error!(error = %err, "Database error");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (self.status(), body).into_response()
    }
}
