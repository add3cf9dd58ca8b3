use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::contract::couple_id::CoupleId;

// Pure models for inter-module communication (no serde/schemas).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchRequestStatus {
    Pending,
    Accepted,
    Declined,
}

impl MatchRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }
}

impl fmt::Display for MatchRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "declined" => Ok(Self::Declined),
            other => Err(format!("unknown match request status '{other}'")),
        }
    }
}

/// What the receiver does with a pending request.
/// The wire tokens are exactly `accept` and `decline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseAction {
    Accept,
    Decline,
}

impl ResponseAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Decline => "decline",
        }
    }
}

impl FromStr for ResponseAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(Self::Accept),
            "decline" => Ok(Self::Decline),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRequest {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub receiver_email: String,
    pub anniversary_date: NaiveDate,
    pub message: Option<String>,
    pub status: MatchRequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl MatchRequest {
    pub fn is_pending(&self) -> bool {
        self.status == MatchRequestStatus::Pending
    }
}

/// Data for sending a new match request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMatchRequest {
    pub receiver_email: String,
    pub anniversary_date: NaiveDate,
    pub message: Option<String>,
}

/// The receiver's answer. `action` stays raw so that an unknown token is
/// reported as invalid input by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResponse {
    pub action: String,
    pub anniversary_override: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestListQuery {
    pub status: Option<MatchRequestStatus>,
    /// 1-based; missing or 0 means the first page.
    pub page: Option<u32>,
    /// Missing or 0 means the configured default.
    pub limit: Option<u32>,
}

/// Page envelope for list operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn map_items<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total: self.total,
        }
    }
}

/// User record as seen by this subsystem. The partner view is derived from
/// `couple_id`, never stored on the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub couple_id: Option<CoupleId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
}

impl From<&User> for UserSummary {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            display_name: u.display_name.clone(),
            email: u.email.clone(),
        }
    }
}

/// A request together with its sender's details. `sender` is `None` when
/// the sender record no longer exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRequestView {
    pub request: MatchRequest,
    pub sender: Option<UserSummary>,
}

/// Derived partner linkage of one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerLink {
    pub partner_id: Uuid,
    /// Read fresh from the partner's record; `None` if it is gone.
    pub partner_name: Option<String>,
    pub couple_id: CoupleId,
    pub matched_at: DateTime<Utc>,
    pub anniversary_date: NaiveDate,
}

/// Result of a completed purge run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    pub journal_id: Uuid,
    pub couple_id: CoupleId,
    /// Records removed per shared-data store.
    pub purged: BTreeMap<String, u64>,
}

impl PurgeReport {
    pub fn total(&self) -> u64 {
        self.purged.values().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnmatchOutcome {
    /// The caller had no active partner; nothing changed.
    NotMatched,
    Dissolved(PurgeReport),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeReport {
    pub completed: Vec<PurgeReport>,
    /// Couples whose purge failed again, with the failure text.
    pub failed: Vec<(CoupleId, String)>,
}
