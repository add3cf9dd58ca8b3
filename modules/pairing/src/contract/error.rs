use thiserror::Error;

/// Errors that are safe to expose to other modules
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PairingError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Aborted: {message}")]
    Aborted { message: String },

    /// `context` names the couple and the failing side or store when known.
    #[error("Internal error: {context}")]
    Internal { context: String },
}

impl PairingError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::Aborted {
            message: message.into(),
        }
    }

    pub fn internal(context: impl Into<String>) -> Self {
        Self::Internal {
            context: context.into(),
        }
    }
}

impl From<crate::domain::error::DomainError> for PairingError {
    fn from(domain_error: crate::domain::error::DomainError) -> Self {
        use crate::domain::error::DomainError::*;
        let message = domain_error.to_string();
        match domain_error {
            RequestNotFound { .. } | UserNotFound { .. } | ReceiverNotFound { .. } => {
                Self::not_found(message)
            }
            NotSender { .. } | NotReceiver { .. } => Self::unauthorized(message),
            DuplicatePending { .. }
            | AlreadyResponded { .. }
            | AlreadyMatched { .. }
            | NotMatched { .. }
            | PurgePending { .. } => Self::conflict(message),
            SelfRequest | InvalidAction { .. } | Validation { .. } => {
                Self::invalid_input(message)
            }
            Cancelled | DeadlineExceeded => Self::aborted(message),
            LinkFailed { .. }
            | PurgeIncomplete { .. }
            | LockUnavailable { .. }
            | Database { .. } => Self::internal(message),
        }
    }
}
