use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type for gate operations
pub type Result<T> = std::result::Result<T, GateError>;

/// Gate error types
#[derive(Error, Debug)]
pub enum GateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Identity provider error: {0}")]
    IdentityProvider(String),

    #[error("Code exchange failed: {0}")]
    CodeExchange(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl GateError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::IdentityProvider(_) => StatusCode::BAD_GATEWAY,
            GateError::CodeExchange(_) => StatusCode::BAD_REQUEST,
            GateError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GateError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::Http(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Map a reqwest failure while talking to the identity provider
    pub fn from_provider(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GateError::Timeout(format!("Identity provider timed out: {}", e))
        } else {
            GateError::IdentityProvider(format!("Identity provider request failed: {}", e))
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            GateError::IdentityProvider("down".to_string()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GateError::CodeExchange("bad code".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GateError::Timeout("slow".to_string()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            GateError::Config("missing".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_display() {
        let err = GateError::IdentityProvider("connection refused".to_string());
        assert_eq!(
            err.to_string(),
            "Identity provider error: connection refused"
        );
    }

    #[test]
    fn test_error_into_response_status() {
        let response = GateError::Upstream("unreachable".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
