use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request-terminal error taxonomy for the query pipeline.
///
/// `Display` carries the full detail for logs; what goes on the wire is
/// decided by `public_message`, which keeps provider detail out of
/// transport-level failures.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Model quota exceeded: {0}")]
    ModelQuota(String),

    #[error("SQL extraction failed: {0}")]
    Extraction(String),

    #[error("Write operation rejected: {0}")]
    WriteOperationRejected(String),

    #[error("Unknown table: {0}")]
    UnknownTableRejected(String),

    #[error("Cost limit exceeded: {0}")]
    CostLimitExceeded(String),

    #[error("Query execution failed: {0}")]
    Execution(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse {
            error: self.error_type(),
            message: self.public_message(),
        };

        match self {
            AppError::WriteOperationRejected(_)
            | AppError::UnknownTableRejected(_)
            | AppError::CostLimitExceeded(_)
            | AppError::InvalidRequest(_) => HttpResponse::BadRequest().json(error_response),
            AppError::ModelQuota(_) => HttpResponse::TooManyRequests().json(error_response),
            AppError::ModelUnavailable(_) | AppError::Extraction(_) | AppError::Execution(_) => {
                HttpResponse::BadGateway().json(error_response)
            }
            AppError::Timeout(_) => HttpResponse::GatewayTimeout().json(error_response),
            AppError::Config(_) | AppError::Io(_) | AppError::Internal(_) => {
                HttpResponse::InternalServerError().json(error_response)
            }
        }
    }
}

impl AppError {
    pub fn error_type(&self) -> String {
        match self {
            AppError::ModelUnavailable(_) => "model_unavailable".to_string(),
            AppError::ModelQuota(_) => "model_quota_exceeded".to_string(),
            AppError::Extraction(_) => "extraction_error".to_string(),
            AppError::WriteOperationRejected(_) => "write_operation_rejected".to_string(),
            AppError::UnknownTableRejected(_) => "unknown_table".to_string(),
            AppError::CostLimitExceeded(_) => "cost_limit_exceeded".to_string(),
            AppError::Execution(_) => "execution_error".to_string(),
            AppError::Timeout(_) => "timeout".to_string(),
            AppError::InvalidRequest(_) => "invalid_request".to_string(),
            AppError::Config(_) => "config_error".to_string(),
            AppError::Io(_) => "io_error".to_string(),
            AppError::Internal(_) => "internal_error".to_string(),
        }
    }

    /// Message safe to put on the wire. Validation failures explain
    /// themselves; upstream failures stay generic.
    pub fn public_message(&self) -> String {
        match self {
            AppError::WriteOperationRejected(_)
            | AppError::UnknownTableRejected(_)
            | AppError::CostLimitExceeded(_)
            | AppError::InvalidRequest(_) => self.to_string(),
            AppError::ModelUnavailable(_) => {
                "The language model is currently unavailable".to_string()
            }
            AppError::ModelQuota(_) => {
                "The language model quota is exhausted, try again shortly".to_string()
            }
            AppError::Extraction(_) => {
                "The model response did not contain a usable SQL statement".to_string()
            }
            AppError::Execution(_) => "The query could not be executed".to_string(),
            AppError::Timeout(_) => "The request timed out".to_string(),
            AppError::Config(_) | AppError::Io(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
