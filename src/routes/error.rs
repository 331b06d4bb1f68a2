use axum::{
    Json,
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_valid::ValidRejection;
use serde::Serialize;

use crate::{aggregation::AggregationError, db::DbError, services::MetricServiceError};

/// Error body: `{"error": {"type": ..., "code": ..., "message": ..., "param": ...}}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorInfo,
}

#[derive(Debug, Serialize)]
pub struct ErrorInfo {
    #[serde(rename = "type")]
    pub error_type: &'static str,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<&'static str>,
}

#[derive(Debug)]
pub enum ApiError {
    /// Caller error; never retryable.
    BadRequest {
        code: &'static str,
        message: String,
        param: Option<&'static str>,
    },
    DatabaseRequired,
    Database(DbError),
}

impl ApiError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            code,
            message: message.into(),
            param: None,
        }
    }

    pub fn invalid_param(param: &'static str, message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            code: "invalid_parameter",
            message: message.into(),
            param: Some(param),
        }
    }
}

impl From<AggregationError> for ApiError {
    fn from(err: AggregationError) -> Self {
        ApiError::BadRequest {
            code: err.code(),
            param: Some(err.param()),
            message: err.to_string(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotConfigured => ApiError::DatabaseRequired,
            _ => ApiError::Database(err),
        }
    }
}

impl From<MetricServiceError> for ApiError {
    fn from(err: MetricServiceError) -> Self {
        match err {
            MetricServiceError::Aggregation(e) => e.into(),
            MetricServiceError::InvalidOrdering(_) => ApiError::BadRequest {
                code: "invalid_ordering",
                message: err.to_string(),
                param: Some("ordering"),
            },
            MetricServiceError::Database(e) => e.into(),
        }
    }
}

impl From<ValidRejection<QueryRejection>> for ApiError {
    fn from(rejection: ValidRejection<QueryRejection>) -> Self {
        match rejection {
            ValidRejection::Valid(errors) => {
                ApiError::bad_request("validation_error", errors.to_string())
            }
            ValidRejection::Inner(inner) => ApiError::bad_request("bad_request", inner.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, code, message, param) = match self {
            ApiError::BadRequest {
                code,
                message,
                param,
            } => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                code,
                message,
                param,
            ),
            ApiError::DatabaseRequired => (
                StatusCode::SERVICE_UNAVAILABLE,
                "internal_error",
                "not_configured",
                "This endpoint requires a configured database".to_string(),
                None,
            ),
            ApiError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "database_error",
                    "An internal database error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorInfo {
                error_type,
                code,
                message,
                param,
            },
        };
        (status, Json(body)).into_response()
    }
}
