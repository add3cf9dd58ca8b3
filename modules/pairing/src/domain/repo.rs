use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::contract::couple_id::CoupleId;
use crate::contract::lock::LockLease;
use crate::contract::model::{MatchRequest, MatchRequestStatus, User};

/// The authoritative pairing record. Users only point at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Couple {
    pub id: CoupleId,
    pub request_id: Uuid,
    pub matched_at: DateTime<Utc>,
    pub anniversary_date: NaiveDate,
}

/// Everything the accept transaction writes.
#[derive(Debug, Clone)]
pub struct FormCouple {
    pub couple: Couple,
    pub responded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormOutcome {
    Formed,
    /// The request left `pending` before the transition ran.
    RequestNotPending,
    /// This member already points at a couple; nothing was written.
    MemberUnavailable(Uuid),
    /// A purge of this couple id has not completed; nothing was written.
    PurgePending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The one-pending-per-ordered-pair constraint rejected the row.
    DuplicatePending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListFilter {
    pub status: Option<MatchRequestStatus>,
    pub offset: u64,
    pub limit: u64,
}

/// Recorded intent of one dissolution, written together with the couple delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeIntent {
    pub journal_id: Uuid,
    pub couple_id: CoupleId,
    pub requested_by: Uuid,
    pub requested_at: DateTime<Utc>,
}

/// A journal row: the intent plus per-store progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeEntry {
    pub intent: PurgeIntent,
    pub purged: BTreeMap<String, u64>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<PurgeIntent> for PurgeEntry {
    fn from(intent: PurgeIntent) -> Self {
        Self {
            intent,
            purged: BTreeMap::new(),
            completed_at: None,
        }
    }
}

/// Read access to user records. Users are owned by another subsystem.
#[async_trait]
pub trait UsersRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    /// Case-insensitive match on the stored email.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
}

#[async_trait]
pub trait MatchRequestRepository: Send + Sync {
    /// Insert a fully-formed pending request.
    async fn insert_pending(&self, req: MatchRequest) -> anyhow::Result<InsertOutcome>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<MatchRequest>>;
    /// Fast-path check for an active request on the ordered pair.
    async fn pending_exists(&self, sender: Uuid, receiver: Uuid) -> anyhow::Result<bool>;
    /// Newest first, with the unpaged total.
    async fn list_by_sender(
        &self,
        sender: Uuid,
        filter: ListFilter,
    ) -> anyhow::Result<(Vec<MatchRequest>, u64)>;
    async fn list_by_receiver(
        &self,
        receiver: Uuid,
        filter: ListFilter,
    ) -> anyhow::Result<(Vec<MatchRequest>, u64)>;
    /// `pending -> declined`. False if the request was no longer pending.
    async fn decline(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<bool>;
    /// Delete only while pending. False if nothing matched.
    async fn delete_pending(&self, id: Uuid) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait CoupleRepository: Send + Sync {
    /// Atomically: request `pending -> accepted`, couple insert, both users linked.
    /// Refuses with `PurgePending` while an earlier dissolution of the same
    /// couple id is not fully purged.
    async fn form(&self, form: FormCouple) -> anyhow::Result<FormOutcome>;
    async fn find_by_id(&self, id: &CoupleId) -> anyhow::Result<Option<Couple>>;
    /// Atomically: couple delete, users unlinked, journal row inserted.
    /// False (and nothing written) if the couple was already gone.
    async fn dissolve(&self, intent: &PurgeIntent) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait PurgeJournal: Send + Sync {
    async fn record_step(&self, journal_id: Uuid, store: &str, purged: u64)
        -> anyhow::Result<()>;
    async fn complete(&self, journal_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()>;
    async fn find(&self, journal_id: Uuid) -> anyhow::Result<Option<PurgeEntry>>;
    /// Oldest first.
    async fn list_incomplete(&self) -> anyhow::Result<Vec<PurgeEntry>>;
}

/// A store of couple-scoped records (events, photos, ...).
#[async_trait]
pub trait SharedDataPurger: Send + Sync {
    /// Stable name used in the journal and audit records.
    fn kind(&self) -> &'static str;
    /// Delete every record tagged with `couple_id`; returns how many went.
    async fn purge_by_couple(&self, couple_id: &CoupleId) -> anyhow::Result<u64>;
}

/// Per-couple mutual exclusion between unmatch and shared-entity writers.
#[async_trait]
pub trait CoupleLocks: Send + Sync {
    /// `None` when the wait budget ran out.
    async fn acquire(&self, couple_id: &CoupleId) -> anyhow::Result<Option<Box<dyn LockLease>>>;
}
