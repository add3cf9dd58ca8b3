use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::contract::{
    client::PairingApi,
    context::CallContext,
    error::PairingError,
    lock::CoupleWriteGuard,
    model::{
        MatchRequest, MatchRequestView, MatchResponse, NewMatchRequest, Page, PartnerLink,
        RequestListQuery, ResumeReport, UnmatchOutcome,
    },
};
use crate::domain::service::Service;

/// Local implementation of the PairingApi trait that delegates to the domain service
pub struct PairingLocalClient {
    service: Arc<Service>,
}

impl PairingLocalClient {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl PairingApi for PairingLocalClient {
    async fn send_request(
        &self,
        ctx: &CallContext,
        caller: Uuid,
        new: NewMatchRequest,
    ) -> Result<MatchRequestView, PairingError> {
        self.service
            .send_request(ctx, caller, new)
            .await
            .map_err(Into::into)
    }

    async fn respond(
        &self,
        ctx: &CallContext,
        caller: Uuid,
        request_id: Uuid,
        response: MatchResponse,
    ) -> Result<MatchRequest, PairingError> {
        self.service
            .respond(ctx, caller, request_id, response)
            .await
            .map_err(Into::into)
    }

    async fn cancel(
        &self,
        ctx: &CallContext,
        caller: Uuid,
        request_id: Uuid,
    ) -> Result<(), PairingError> {
        self.service
            .cancel(ctx, caller, request_id)
            .await
            .map_err(Into::into)
    }

    async fn list_sent(
        &self,
        ctx: &CallContext,
        caller: Uuid,
        query: RequestListQuery,
    ) -> Result<Page<MatchRequest>, PairingError> {
        self.service
            .list_sent(ctx, caller, query)
            .await
            .map_err(Into::into)
    }

    async fn list_received(
        &self,
        ctx: &CallContext,
        caller: Uuid,
        query: RequestListQuery,
    ) -> Result<Page<MatchRequestView>, PairingError> {
        self.service
            .list_received(ctx, caller, query)
            .await
            .map_err(Into::into)
    }

    async fn partner(
        &self,
        ctx: &CallContext,
        caller: Uuid,
    ) -> Result<Option<PartnerLink>, PairingError> {
        self.service.partner(ctx, caller).await.map_err(Into::into)
    }

    async fn unmatch(
        &self,
        ctx: &CallContext,
        caller: Uuid,
    ) -> Result<UnmatchOutcome, PairingError> {
        self.service.unmatch(ctx, caller).await.map_err(Into::into)
    }

    async fn resume_purges(&self, ctx: &CallContext) -> Result<ResumeReport, PairingError> {
        self.service.resume_purges(ctx).await.map_err(Into::into)
    }

    async fn lock_couple_for_write(
        &self,
        ctx: &CallContext,
        caller: Uuid,
    ) -> Result<CoupleWriteGuard, PairingError> {
        self.service
            .lock_couple_for_write(ctx, caller)
            .await
            .map_err(Into::into)
    }
}
