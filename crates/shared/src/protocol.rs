use serde::{Deserialize, Serialize};

use crate::error::{ApiException, ErrorCode};

/// Response envelope used by the cloud-control backend for every endpoint:
/// `success` plus either a payload or a human-readable error message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Envelope for endpoints that carry a payload on success.
    pub fn into_result(self) -> Result<T, ApiException> {
        match self {
            Self {
                success: true,
                data: Some(data),
                ..
            } => Ok(data),
            Self {
                success: true,
                data: None,
                ..
            } => Err(ApiException::new(
                ErrorCode::Validation,
                "response reported success without a payload",
            )),
            Self { error, .. } => Err(ApiException::new(
                ErrorCode::Upstream,
                error.unwrap_or_else(|| "request failed without an error message".to_string()),
            )),
        }
    }

    /// Envelope for command endpoints, where success alone is the payload.
    pub fn ensure_success(self) -> Result<(), ApiException> {
        if self.success {
            return Ok(());
        }
        Err(ApiException::new(
            ErrorCode::Upstream,
            self.error
                .unwrap_or_else(|| "request failed without an error message".to_string()),
        ))
    }
}
