use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::any::Any;
use tracing::{error, warn};

/// Centralized error types for consistent API error handling
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A request field failed validation; the message goes to the client verbatim.
    #[error("{0}")]
    ValidationError(String),

    /// The body could not be read as the expected JSON object.
    #[error("{0}")]
    BadRequest(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// JSON body of every error response.
///
/// Client errors carry only `error`. Server errors add `status: "error"` and,
/// when debug output is enabled, a `traceback` with the full cause chain.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

impl ErrorBody {
    fn client(message: String) -> Self {
        Self {
            error: message,
            status: None,
            traceback: None,
        }
    }

    fn server(message: &str, detail: Option<String>) -> Self {
        Self {
            error: message.to_string(),
            status: Some("error"),
            traceback: detail,
        }
    }
}

pub type ErrorResponse = (StatusCode, Json<ErrorBody>);

/// Error context for structured logging
#[derive(Debug)]
pub struct ErrorContext {
    pub operation: String,
    pub resource_type: String,
    pub debug: bool,
}

impl ErrorContext {
    pub fn new(operation: &str, resource_type: &str) -> Self {
        Self {
            operation: operation.to_string(),
            resource_type: resource_type.to_string(),
            debug: false,
        }
    }

    /// Expose diagnostic detail in server-error bodies.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl ApiError {
    /// Convert API error to HTTP response with consistent structure and logging
    pub fn to_response_with_context(self, context: ErrorContext) -> ErrorResponse {
        match self {
            ApiError::ValidationError(message) | ApiError::BadRequest(message) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    error = %message,
                    "Rejected request"
                );
                (StatusCode::BAD_REQUEST, Json(ErrorBody::client(message)))
            }
            ApiError::StorageError(e) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    error = %format!("{:#}", e),
                    "Storage error"
                );
                let detail = context.debug.then(|| format!("{:?}", e));
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody::server("Progress storage operation failed", detail)),
                )
            }
            ApiError::InternalError(message) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    error = %message,
                    "Internal server error"
                );
                let detail = context.debug.then_some(message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody::server("An internal error occurred", detail)),
                )
            }
        }
    }
}

/// Response for a handler that panicked, in the same shape as other server errors.
pub fn panic_response(debug: bool, panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    ApiError::InternalError(format!("handler panicked: {}", message))
        .to_response_with_context(ErrorContext::new("panic", "request").with_debug(debug))
        .into_response()
}

/// Helper macro for structured error responses
#[macro_export]
macro_rules! api_error {
    (validation, $operation:expr, $resource_type:expr, $message:expr) => {
        $crate::errors::ApiError::ValidationError($message.to_string())
            .to_response_with_context($crate::errors::ErrorContext::new($operation, $resource_type))
    };

    (storage, $operation:expr, $resource_type:expr, $error:expr, debug = $debug:expr) => {
        $crate::errors::ApiError::StorageError($error).to_response_with_context(
            $crate::errors::ErrorContext::new($operation, $resource_type).with_debug($debug),
        )
    };
}
