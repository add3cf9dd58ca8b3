use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::contract::context::CallContext;
use crate::contract::couple_id::CoupleId;
use crate::contract::model::{
    MatchRequest, MatchRequestStatus, MatchRequestView, MatchResponse, NewMatchRequest, Page,
    PartnerLink, RequestListQuery, ResponseAction, User, UserSummary,
};
use crate::domain::error::DomainError;
use crate::domain::guard;
use crate::domain::repo::{
    Couple, CoupleLocks, CoupleRepository, FormCouple, FormOutcome, InsertOutcome, ListFilter,
    MatchRequestRepository, PurgeJournal, SharedDataPurger, UsersRepository,
};

mod purge;

/// Domain service owning the match request lifecycle and couple dissolution.
/// Depends only on the ports in `domain::repo`, not on infra types.
#[derive(Clone)]
pub struct Service {
    users: Arc<dyn UsersRepository>,
    requests: Arc<dyn MatchRequestRepository>,
    couples: Arc<dyn CoupleRepository>,
    journal: Arc<dyn PurgeJournal>,
    /// Purged in this order.
    purgers: Vec<Arc<dyn SharedDataPurger>>,
    locks: Arc<dyn CoupleLocks>,
    config: ServiceConfig,
}

/// Persistence ports the service is built from.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UsersRepository>,
    pub requests: Arc<dyn MatchRequestRepository>,
    pub couples: Arc<dyn CoupleRepository>,
    pub journal: Arc<dyn PurgeJournal>,
}

/// Configuration for the domain service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub max_message_length: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            max_message_length: 500,
        }
    }
}

impl Service {
    pub fn new(
        stores: Stores,
        purgers: Vec<Arc<dyn SharedDataPurger>>,
        locks: Arc<dyn CoupleLocks>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            users: stores.users,
            requests: stores.requests,
            couples: stores.couples,
            journal: stores.journal,
            purgers,
            locks,
            config,
        }
    }

    #[instrument(
        name = "pairing.service.send_request",
        skip(self, ctx, new),
        fields(sender_id = %sender, receiver_email = %new.receiver_email)
    )]
    pub async fn send_request(
        &self,
        ctx: &CallContext,
        sender: Uuid,
        new: NewMatchRequest,
    ) -> Result<MatchRequestView, DomainError> {
        guard::run(ctx, async {
            info!("Sending match request");

            let email = self.validate_email(&new.receiver_email)?;
            let message = self.normalize_message(new.message)?;

            let sender_user = self.load_user(sender).await?;
            let receiver = self
                .users
                .find_by_email(&email)
                .await
                .map_err(DomainError::database)?
                .ok_or_else(|| DomainError::receiver_not_found(email.clone()))?;

            if receiver.id == sender {
                return Err(DomainError::self_request());
            }
            if sender_user.couple_id.is_some() {
                return Err(DomainError::already_matched(sender));
            }
            if self
                .requests
                .pending_exists(sender, receiver.id)
                .await
                .map_err(DomainError::database)?
            {
                return Err(DomainError::duplicate_pending(sender, receiver.id));
            }

            let now = Utc::now();
            let request = MatchRequest {
                id: Uuid::new_v4(),
                sender_id: sender,
                receiver_id: receiver.id,
                receiver_email: email,
                anniversary_date: new.anniversary_date,
                message,
                status: MatchRequestStatus::Pending,
                created_at: now,
                updated_at: now,
                responded_at: None,
            };

            match self
                .requests
                .insert_pending(request.clone())
                .await
                .map_err(DomainError::database)?
            {
                InsertOutcome::Inserted => {}
                InsertOutcome::DuplicatePending => {
                    debug!("Pending-pair constraint rejected the insert");
                    return Err(DomainError::duplicate_pending(sender, receiver.id));
                }
            }

            info!(request_id = %request.id, receiver_id = %receiver.id, "Match request created");
            Ok(MatchRequestView {
                sender: Some(UserSummary::from(&sender_user)),
                request,
            })
        })
        .await
    }

    #[instrument(
        name = "pairing.service.respond",
        skip(self, ctx, response),
        fields(request_id = %request_id, caller_id = %caller, action = %response.action)
    )]
    pub async fn respond(
        &self,
        ctx: &CallContext,
        caller: Uuid,
        request_id: Uuid,
        response: MatchResponse,
    ) -> Result<MatchRequest, DomainError> {
        guard::run(ctx, async {
            let action: ResponseAction = response
                .action
                .parse()
                .map_err(DomainError::invalid_action)?;

            let req = self.load_request(request_id).await?;
            if req.receiver_id != caller {
                return Err(DomainError::not_receiver(request_id, caller));
            }
            if !req.is_pending() {
                return Err(DomainError::already_responded(req.id, req.status));
            }

            let now = Utc::now();
            match action {
                ResponseAction::Decline => {
                    let declined = self
                        .requests
                        .decline(req.id, now)
                        .await
                        .map_err(DomainError::database)?;
                    if !declined {
                        return Err(self.lost_race(req.id).await);
                    }
                    info!("Match request declined");
                    Ok(MatchRequest {
                        status: MatchRequestStatus::Declined,
                        updated_at: now,
                        responded_at: Some(now),
                        ..req
                    })
                }
                ResponseAction::Accept => {
                    let anniversary_date = response
                        .anniversary_override
                        .unwrap_or(req.anniversary_date);
                    let couple_id = CoupleId::from_pair(req.sender_id, req.receiver_id);

                    let form = FormCouple {
                        couple: Couple {
                            id: couple_id.clone(),
                            request_id: req.id,
                            matched_at: now,
                            anniversary_date,
                        },
                        responded_at: now,
                    };
                    // serialized with unmatch and resume on the same couple id
                    let lease = self.acquire_lock(&couple_id).await?;
                    let formed = self.couples.form(form).await;
                    lease.release().await;
                    let outcome = formed.map_err(|e| {
                        let detail = format!("{e:#}");
                        error!(couple_id = %couple_id, error = %detail, "Linking couple failed, rolled back");
                        DomainError::link_failed(&couple_id, detail)
                    })?;

                    match outcome {
                        FormOutcome::Formed => {
                            info!(couple_id = %couple_id, %anniversary_date, "Match request accepted, couple formed");
                            Ok(MatchRequest {
                                status: MatchRequestStatus::Accepted,
                                updated_at: now,
                                responded_at: Some(now),
                                ..req
                            })
                        }
                        FormOutcome::RequestNotPending => Err(self.lost_race(req.id).await),
                        FormOutcome::MemberUnavailable(user_id) => {
                            Err(DomainError::already_matched(user_id))
                        }
                        FormOutcome::PurgePending => {
                            warn!(couple_id = %couple_id, "Earlier dissolution still purging, accept refused");
                            Err(DomainError::purge_pending(&couple_id))
                        }
                    }
                }
            }
        })
        .await
    }

    #[instrument(
        name = "pairing.service.cancel",
        skip(self, ctx),
        fields(request_id = %request_id, caller_id = %caller)
    )]
    pub async fn cancel(
        &self,
        ctx: &CallContext,
        caller: Uuid,
        request_id: Uuid,
    ) -> Result<(), DomainError> {
        guard::run(ctx, async {
            let req = self.load_request(request_id).await?;
            if req.sender_id != caller {
                return Err(DomainError::not_sender(request_id, caller));
            }
            if !req.is_pending() {
                return Err(DomainError::already_responded(req.id, req.status));
            }

            let deleted = self
                .requests
                .delete_pending(req.id)
                .await
                .map_err(DomainError::database)?;
            if !deleted {
                return Err(self.lost_race(req.id).await);
            }

            info!("Match request cancelled");
            Ok(())
        })
        .await
    }

    #[instrument(name = "pairing.service.list_sent", skip(self, ctx, query), fields(caller_id = %caller))]
    pub async fn list_sent(
        &self,
        ctx: &CallContext,
        caller: Uuid,
        query: RequestListQuery,
    ) -> Result<Page<MatchRequest>, DomainError> {
        guard::run(ctx, async {
            let (page, filter) = self.page_window(&query);
            let (items, total) = self
                .requests
                .list_by_sender(caller, filter)
                .await
                .map_err(DomainError::database)?;

            debug!("Listed {} of {} sent requests", items.len(), total);
            Ok(Page {
                items,
                page,
                limit: filter.limit as u32,
                total,
            })
        })
        .await
    }

    #[instrument(name = "pairing.service.list_received", skip(self, ctx, query), fields(caller_id = %caller))]
    pub async fn list_received(
        &self,
        ctx: &CallContext,
        caller: Uuid,
        query: RequestListQuery,
    ) -> Result<Page<MatchRequestView>, DomainError> {
        guard::run(ctx, async {
            let (page, filter) = self.page_window(&query);
            let (requests, total) = self
                .requests
                .list_by_receiver(caller, filter)
                .await
                .map_err(DomainError::database)?;

            // one lookup per distinct sender on this page
            let mut senders: HashMap<Uuid, Option<UserSummary>> = HashMap::new();
            let mut items = Vec::with_capacity(requests.len());
            for request in requests {
                let sender = match senders.get(&request.sender_id) {
                    Some(cached) => cached.clone(),
                    None => {
                        let found = self
                            .users
                            .find_by_id(request.sender_id)
                            .await
                            .map_err(DomainError::database)?
                            .map(|u| UserSummary::from(&u));
                        if found.is_none() {
                            debug!(sender_id = %request.sender_id, "Sender record missing");
                        }
                        senders.insert(request.sender_id, found.clone());
                        found
                    }
                };
                items.push(MatchRequestView { request, sender });
            }

            debug!("Listed {} of {} received requests", items.len(), total);
            Ok(Page {
                items,
                page,
                limit: filter.limit as u32,
                total,
            })
        })
        .await
    }

    #[instrument(name = "pairing.service.partner", skip(self, ctx), fields(caller_id = %caller))]
    pub async fn partner(
        &self,
        ctx: &CallContext,
        caller: Uuid,
    ) -> Result<Option<PartnerLink>, DomainError> {
        guard::run(ctx, async {
            let user = self.load_user(caller).await?;
            let Some(couple_id) = user.couple_id else {
                return Ok(None);
            };
            let Some(couple) = self
                .couples
                .find_by_id(&couple_id)
                .await
                .map_err(DomainError::database)?
            else {
                debug!(couple_id = %couple_id, "User points at a dissolved couple");
                return Ok(None);
            };
            let Some(partner_id) = couple_id.partner_of(caller) else {
                return Ok(None);
            };

            let partner_name = self
                .users
                .find_by_id(partner_id)
                .await
                .map_err(DomainError::database)?
                .map(|u| u.display_name);

            Ok(Some(PartnerLink {
                partner_id,
                partner_name,
                couple_id,
                matched_at: couple.matched_at,
                anniversary_date: couple.anniversary_date,
            }))
        })
        .await
    }

    // --- helpers ---

    async fn load_user(&self, id: Uuid) -> Result<User, DomainError> {
        self.users
            .find_by_id(id)
            .await
            .map_err(DomainError::database)?
            .ok_or_else(|| DomainError::user_not_found(id))
    }

    async fn load_request(&self, id: Uuid) -> Result<MatchRequest, DomainError> {
        self.requests
            .find_by_id(id)
            .await
            .map_err(DomainError::database)?
            .ok_or_else(|| DomainError::request_not_found(id))
    }

    /// Error for a conditional write that matched nothing.
    async fn lost_race(&self, id: Uuid) -> DomainError {
        debug!(request_id = %id, "Conditional update lost a race");
        match self.requests.find_by_id(id).await {
            Ok(Some(current)) => DomainError::already_responded(id, current.status),
            Ok(None) => DomainError::request_not_found(id),
            Err(e) => DomainError::database(e),
        }
    }

    /// Returns the 1-based page number and the storage window.
    fn page_window(&self, query: &RequestListQuery) -> (u32, ListFilter) {
        let page = query.page.filter(|p| *p > 0).unwrap_or(1);
        let limit = query
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(self.config.default_page_size)
            .min(self.config.max_page_size)
            .max(1);
        let filter = ListFilter {
            status: query.status,
            offset: u64::from(page - 1) * u64::from(limit),
            limit: u64::from(limit),
        };
        (page, filter)
    }

    fn validate_email(&self, raw: &str) -> Result<String, DomainError> {
        let email = raw.trim();
        if email.is_empty() || !email.contains('@') || !email.contains('.') {
            return Err(DomainError::validation(
                "receiver_email",
                format!("'{raw}' is not an email address"),
            ));
        }
        Ok(email.to_lowercase())
    }

    fn normalize_message(&self, raw: Option<String>) -> Result<Option<String>, DomainError> {
        let Some(raw) = raw else {
            return Ok(None);
        };
        let message = raw.trim();
        if message.is_empty() {
            return Ok(None);
        }
        let len = message.chars().count();
        if len > self.config.max_message_length {
            return Err(DomainError::validation(
                "message",
                format!(
                    "{len} characters (max: {})",
                    self.config.max_message_length
                ),
            ));
        }
        Ok(Some(message.to_string()))
    }
}
