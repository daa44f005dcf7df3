use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::ApiResponse;
use crate::services::prize_selector::SelectionError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Selection error: {0}")]
    SelectionError(#[from] SelectionError),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AppError {
    /// 错误响应中的错误码
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::SelectionError(_) => "SELECTION_ERROR",
            AppError::AuthError(_) | AppError::JwtError(_) => "AUTH_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden | AppError::PermissionDenied => "FORBIDDEN",
            AppError::StoreError(_) | AppError::IoError(_) | AppError::SerdeJsonError(_) => {
                "STORE_ERROR"
            }
            AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status_code, message) = match self {
            AppError::ValidationError(msg) => {
                log::warn!("Validation error: {msg}");
                (actix_web::http::StatusCode::BAD_REQUEST, msg.clone())
            }
            AppError::SelectionError(err) => {
                log::warn!("Rejected gacha configuration: {err}");
                (actix_web::http::StatusCode::BAD_REQUEST, err.to_string())
            }
            AppError::AuthError(msg) => {
                log::warn!("Authentication error: {msg}");
                (actix_web::http::StatusCode::UNAUTHORIZED, msg.clone())
            }
            AppError::JwtError(err) => {
                log::warn!("Token rejected: {err}");
                (
                    actix_web::http::StatusCode::UNAUTHORIZED,
                    "Invalid token".to_string(),
                )
            }
            AppError::NotFound(msg) => (actix_web::http::StatusCode::NOT_FOUND, msg.clone()),
            AppError::Forbidden => {
                log::warn!("Forbidden access");
                (
                    actix_web::http::StatusCode::FORBIDDEN,
                    "Forbidden".to_string(),
                )
            }
            AppError::PermissionDenied => {
                log::warn!("Permission denied");
                (
                    actix_web::http::StatusCode::FORBIDDEN,
                    "Permission denied".to_string(),
                )
            }
            AppError::StoreError(_) | AppError::IoError(_) | AppError::SerdeJsonError(_) => {
                log::error!("Store error: {self}");
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Store error".to_string(),
                )
            }
            AppError::InternalError(_) => {
                log::error!("Internal error: {self}");
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        HttpResponse::build(status_code).json(ApiResponse::error(self.code(), message))
    }
}
