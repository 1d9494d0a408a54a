use super::response::OutgoingResponse;
use http::StatusCode;
use serde_json::json;
use std::io;
use std::time::Duration;

/// Failures that can occur while turning a connection's bytes into a response
///
/// Every variant except `Io` maps onto an HTTP status and a JSON error body.
/// `Io` means the transport itself failed and nothing can be written back.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Malformed request: {0}")]
    Malformed(String),
    #[error("Request body too large: {actual} bytes, maximum allowed: {max} bytes")]
    PayloadTooLarge { actual: usize, max: usize },
    #[error("Not found")]
    NotFound,
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Request exceeded the {0:?} handling limit")]
    Timeout(Duration),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HttpError {
    /// Status code this error is reported with
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::Malformed(_) | HttpError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            HttpError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            HttpError::NotFound => StatusCode::NOT_FOUND,
            HttpError::Io(_) | HttpError::Timeout(_) | HttpError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Renders the error as a JSON response
    ///
    /// Internal details are logged by the caller and never sent to the client.
    pub fn into_response(self) -> OutgoingResponse {
        let body = match &self {
            HttpError::Malformed(detail) => {
                json!({ "error": "malformed request", "detail": detail })
            }
            HttpError::InvalidParameter(detail) => {
                json!({ "error": "invalid parameter", "detail": detail })
            }
            HttpError::PayloadTooLarge { .. } => {
                json!({ "error": "payload too large", "detail": self.to_string() })
            }
            HttpError::NotFound => json!({ "error": "not found" }),
            HttpError::Io(_) | HttpError::Timeout(_) | HttpError::Internal(_) => {
                json!({ "error": "internal error" })
            }
        };
        OutgoingResponse::json(self.status(), &body)
    }
}
