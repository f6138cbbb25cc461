//! HTTP Error Handling
//!
//! 业务错误统一以 HTTP 200 + `{errno, error, data}` 返回

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::application::{ApplicationError, ProjectSummary};

/// 统一错误响应格式
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errno: i32,
    pub error: String,
    pub data: Option<ConflictData>,
}

/// 冲突错误附带的数据
#[derive(Debug, Serialize)]
pub struct ConflictData {
    pub existing_project: Option<ProjectSummary>,
}

impl ErrorResponse {
    pub fn new(errno: i32, error: impl Into<String>) -> Self {
        Self {
            errno,
            error: error.into(),
            data: None,
        }
    }
}

/// 错误码定义
pub mod errno {
    pub const BAD_REQUEST: i32 = 400;
    pub const NOT_FOUND: i32 = 404;
    pub const CONFLICT: i32 = 409;
    pub const INTERNAL_ERROR: i32 = 500;
    pub const SERVICE_UNAVAILABLE: i32 = 503;
}

/// API 错误
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
    Conflict {
        message: String,
        existing_project: Option<Box<ProjectSummary>>,
    },
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn errno(&self) -> i32 {
        match self {
            ApiError::NotFound(_) => errno::NOT_FOUND,
            ApiError::BadRequest(_) => errno::BAD_REQUEST,
            ApiError::Internal(_) => errno::INTERNAL_ERROR,
            ApiError::Conflict { .. } => errno::CONFLICT,
            ApiError::ServiceUnavailable(_) => errno::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let errno = self.errno();
        let response = match self {
            ApiError::NotFound(msg) => {
                tracing::warn!(errno, error = %msg, "Resource not found");
                ErrorResponse::new(errno, msg)
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(errno, error = %msg, "Bad request");
                ErrorResponse::new(errno, msg)
            }
            ApiError::Internal(msg) => {
                tracing::error!(errno, error = %msg, "Internal server error");
                ErrorResponse::new(errno, msg)
            }
            ApiError::Conflict {
                message,
                existing_project,
            } => {
                tracing::warn!(errno, error = %message, "Resource conflict");
                ErrorResponse {
                    errno,
                    error: message,
                    data: Some(ConflictData {
                        existing_project: existing_project.map(|p| *p),
                    }),
                }
            }
            ApiError::ServiceUnavailable(msg) => {
                tracing::error!(errno, error = %msg, "Service unavailable");
                ErrorResponse::new(errno, msg)
            }
        };

        (StatusCode::OK, Json(response)).into_response()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(e: ApplicationError) -> Self {
        match e {
            ApplicationError::NotFound { resource_type, id } => {
                ApiError::NotFound(format!("{} not found: {}", resource_type, id))
            }
            ApplicationError::Config(msg) => ApiError::BadRequest(msg),
            ApplicationError::Conflict {
                message,
                existing_project,
            } => ApiError::Conflict {
                message,
                existing_project,
            },
            ApplicationError::InvalidState(msg) => ApiError::BadRequest(msg),
            ApplicationError::RepositoryError(msg) => ApiError::Internal(msg),
            ApplicationError::ExternalServiceError(msg) => ApiError::ServiceUnavailable(msg),
            ApplicationError::StorageError(msg) => ApiError::Internal(msg),
            ApplicationError::InternalError(msg) => ApiError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_errors_use_envelope_with_http_200() {
        let (status, json) = body_json(ApiError::from(ApplicationError::config("bad range"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["errno"], 400);
        assert_eq!(json["error"], "bad range");
        assert!(json["data"].is_null());

        let (_, json) = body_json(ApiError::from(ApplicationError::not_found("Project", "x"))).await;
        assert_eq!(json["errno"], 404);
    }

    #[tokio::test]
    async fn test_conflict_carries_existing_project_slot() {
        let (_, json) = body_json(ApiError::from(ApplicationError::conflict("busy", None))).await;
        assert_eq!(json["errno"], 409);
        assert!(json["data"]["existing_project"].is_null());
        assert!(json["data"].is_object());
    }
}
