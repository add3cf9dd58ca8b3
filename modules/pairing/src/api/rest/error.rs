use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::contract::error::PairingError;

/// Non-standard status for calls the client abandoned.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// RFC 9457 Problem Details body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(title = "Problem")]
pub struct ProblemDto {
    #[serde(rename = "type")]
    pub type_url: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    /// Stable machine-readable code.
    pub code: String,
}

impl ProblemDto {
    fn new(status: u16, code: &str, title: &str, detail: impl Into<String>) -> Self {
        Self {
            type_url: format!("https://errors.example.com/{code}"),
            title: title.to_string(),
            status,
            detail: detail.into(),
            code: code.to_string(),
        }
    }
}

/// Map a public error to a problem body
impl From<&PairingError> for ProblemDto {
    fn from(e: &PairingError) -> Self {
        match e {
            PairingError::NotFound { message } => {
                Self::new(404, "PAIRING_NOT_FOUND", "Not found", message.clone())
            }
            PairingError::Unauthorized { message } => {
                Self::new(403, "PAIRING_FORBIDDEN", "Forbidden", message.clone())
            }
            PairingError::Conflict { message } => {
                Self::new(409, "PAIRING_CONFLICT", "Conflict", message.clone())
            }
            PairingError::InvalidInput { message } => {
                Self::new(400, "PAIRING_VALIDATION", "Validation error", message.clone())
            }
            PairingError::Aborted { message } => Self::new(
                CLIENT_CLOSED_REQUEST,
                "PAIRING_ABORTED",
                "Request aborted",
                message.clone(),
            ),
            PairingError::Internal { context } => {
                // Log the internal error details but don't expose them to the client
                tracing::error!(error = %context, "Internal pairing error");
                Self::new(
                    500,
                    "PAIRING_INTERNAL",
                    "Internal error",
                    "An internal error occurred",
                )
            }
        }
    }
}
