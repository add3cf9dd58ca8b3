use async_trait::async_trait;
use uuid::Uuid;

use crate::contract::{
    context::CallContext,
    error::PairingError,
    lock::CoupleWriteGuard,
    model::{
        MatchRequest, MatchRequestView, MatchResponse, NewMatchRequest, Page, PartnerLink,
        RequestListQuery, ResumeReport, UnmatchOutcome,
    },
};

/// Public API trait for the pairing module that other modules can use.
/// `caller` is the authenticated user on whose behalf the call runs.
#[async_trait]
pub trait PairingApi: Send + Sync {
    /// Invite the user registered under `new.receiver_email`.
    async fn send_request(
        &self,
        ctx: &CallContext,
        caller: Uuid,
        new: NewMatchRequest,
    ) -> Result<MatchRequestView, PairingError>;

    /// Accept or decline a pending request addressed to `caller`.
    async fn respond(
        &self,
        ctx: &CallContext,
        caller: Uuid,
        request_id: Uuid,
        response: MatchResponse,
    ) -> Result<MatchRequest, PairingError>;

    /// Withdraw a pending request sent by `caller`.
    async fn cancel(
        &self,
        ctx: &CallContext,
        caller: Uuid,
        request_id: Uuid,
    ) -> Result<(), PairingError>;

    async fn list_sent(
        &self,
        ctx: &CallContext,
        caller: Uuid,
        query: RequestListQuery,
    ) -> Result<Page<MatchRequest>, PairingError>;

    async fn list_received(
        &self,
        ctx: &CallContext,
        caller: Uuid,
        query: RequestListQuery,
    ) -> Result<Page<MatchRequestView>, PairingError>;

    async fn partner(
        &self,
        ctx: &CallContext,
        caller: Uuid,
    ) -> Result<Option<PartnerLink>, PairingError>;

    /// Dissolve the caller's couple and purge its shared data. Idempotent.
    async fn unmatch(&self, ctx: &CallContext, caller: Uuid)
        -> Result<UnmatchOutcome, PairingError>;

    /// Finish purges left incomplete by earlier failures.
    async fn resume_purges(&self, ctx: &CallContext) -> Result<ResumeReport, PairingError>;

    /// Serialize a shared-entity write against unmatch for the caller's couple.
    async fn lock_couple_for_write(
        &self,
        ctx: &CallContext,
        caller: Uuid,
    ) -> Result<CoupleWriteGuard, PairingError>;
}
