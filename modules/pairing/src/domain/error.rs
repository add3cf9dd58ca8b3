use thiserror::Error;
use uuid::Uuid;

use crate::contract::couple_id::CoupleId;
use crate::contract::model::MatchRequestStatus;

/// Domain-specific errors using thiserror
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Match request not found: {id}")]
    RequestNotFound { id: Uuid },

    #[error("User not found: {id}")]
    UserNotFound { id: Uuid },

    #[error("No user with email '{email}'")]
    ReceiverNotFound { email: String },

    #[error("User {caller} is not the sender of request {request_id}")]
    NotSender { request_id: Uuid, caller: Uuid },

    #[error("User {caller} is not the receiver of request {request_id}")]
    NotReceiver { request_id: Uuid, caller: Uuid },

    #[error("A user cannot send a match request to themselves")]
    SelfRequest,

    #[error("A pending request from {sender} to {receiver} already exists")]
    DuplicatePending { sender: Uuid, receiver: Uuid },

    #[error("Match request {id} was already responded to ({status})")]
    AlreadyResponded {
        id: Uuid,
        status: MatchRequestStatus,
    },

    #[error("User {user_id} already has a partner")]
    AlreadyMatched { user_id: Uuid },

    #[error("User {user_id} has no active partner")]
    NotMatched { user_id: Uuid },

    #[error("Unknown response action '{action}' (expected 'accept' or 'decline')")]
    InvalidAction { action: String },

    #[error("Validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Linking couple {couple_id} failed: {message}")]
    LinkFailed { couple_id: CoupleId, message: String },

    #[error("Purge of couple {couple_id} stopped at store '{store}': {message}")]
    PurgeIncomplete {
        couple_id: CoupleId,
        store: String,
        message: String,
    },

    #[error("Couple {couple_id} still has an unfinished purge")]
    PurgePending { couple_id: CoupleId },

    #[error("Lock for couple {couple_id} not acquired in time")]
    LockUnavailable { couple_id: CoupleId },

    #[error("Operation cancelled by caller")]
    Cancelled,

    #[error("Operation deadline exceeded")]
    DeadlineExceeded,

    #[error("Database error: {message}")]
    Database { message: String },
}

impl DomainError {
    pub fn request_not_found(id: Uuid) -> Self {
        Self::RequestNotFound { id }
    }

    pub fn user_not_found(id: Uuid) -> Self {
        Self::UserNotFound { id }
    }

    pub fn receiver_not_found(email: impl Into<String>) -> Self {
        Self::ReceiverNotFound {
            email: email.into(),
        }
    }

    pub fn not_sender(request_id: Uuid, caller: Uuid) -> Self {
        Self::NotSender { request_id, caller }
    }

    pub fn not_receiver(request_id: Uuid, caller: Uuid) -> Self {
        Self::NotReceiver { request_id, caller }
    }

    pub fn self_request() -> Self {
        Self::SelfRequest
    }

    pub fn duplicate_pending(sender: Uuid, receiver: Uuid) -> Self {
        Self::DuplicatePending { sender, receiver }
    }

    pub fn already_responded(id: Uuid, status: MatchRequestStatus) -> Self {
        Self::AlreadyResponded { id, status }
    }

    pub fn already_matched(user_id: Uuid) -> Self {
        Self::AlreadyMatched { user_id }
    }

    pub fn not_matched(user_id: Uuid) -> Self {
        Self::NotMatched { user_id }
    }

    pub fn invalid_action(action: impl Into<String>) -> Self {
        Self::InvalidAction {
            action: action.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn link_failed(couple_id: &CoupleId, err: impl std::fmt::Display) -> Self {
        Self::LinkFailed {
            couple_id: couple_id.clone(),
            message: format!("{err:#}"),
        }
    }

    pub fn purge_incomplete(
        couple_id: &CoupleId,
        store: impl Into<String>,
        err: impl std::fmt::Display,
    ) -> Self {
        Self::PurgeIncomplete {
            couple_id: couple_id.clone(),
            store: store.into(),
            message: format!("{err:#}"),
        }
    }

    pub fn purge_pending(couple_id: &CoupleId) -> Self {
        Self::PurgePending {
            couple_id: couple_id.clone(),
        }
    }

    pub fn lock_unavailable(couple_id: &CoupleId) -> Self {
        Self::LockUnavailable {
            couple_id: couple_id.clone(),
        }
    }

    pub fn cancelled() -> Self {
        Self::Cancelled
    }

    pub fn deadline_exceeded() -> Self {
        Self::DeadlineExceeded
    }

    /// Keeps the whole `anyhow` context chain.
    pub fn database(err: impl std::fmt::Display) -> Self {
        Self::Database {
            message: format!("{err:#}"),
        }
    }
}
