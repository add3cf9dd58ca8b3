//! Couple dissolution as a saga: the intent is journaled in the same
//! transaction that removes the couple, then each shared-data store is
//! purged and the journal row is completed. An interrupted run leaves the
//! row incomplete for `resume_purges`.

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::Service;
use crate::contract::context::CallContext;
use crate::contract::couple_id::CoupleId;
use crate::contract::lock::{CoupleWriteGuard, LockLease};
use crate::contract::model::{PurgeReport, ResumeReport, UnmatchOutcome};
use crate::domain::error::DomainError;
use crate::domain::guard;
use crate::domain::repo::{PurgeEntry, PurgeIntent};

/// Target of the per-dissolution audit record.
pub const AUDIT_TARGET: &str = "pairing::audit";

impl Service {
    #[instrument(name = "pairing.service.unmatch", skip(self, ctx), fields(caller_id = %caller))]
    pub async fn unmatch(
        &self,
        ctx: &CallContext,
        caller: Uuid,
    ) -> Result<UnmatchOutcome, DomainError> {
        guard::run(ctx, async {
            info!("Unmatching partner");

            let user = self.load_user(caller).await?;
            let Some(couple_id) = user.couple_id else {
                debug!("Caller has no partner, nothing to do");
                return Ok(UnmatchOutcome::NotMatched);
            };

            let lease = self.acquire_lock(&couple_id).await?;
            let outcome = self.dissolve_and_purge(caller, &couple_id).await;
            lease.release().await;
            outcome
        })
        .await
    }

    /// Re-run every purge whose journal row is still incomplete.
    /// One failing couple does not stop the others.
    #[instrument(name = "pairing.service.resume_purges", skip(self, ctx))]
    pub async fn resume_purges(&self, ctx: &CallContext) -> Result<ResumeReport, DomainError> {
        guard::run(ctx, async {
            let pending = self
                .journal
                .list_incomplete()
                .await
                .map_err(DomainError::database)?;
            info!(count = pending.len(), "Resuming incomplete purges");

            let mut report = ResumeReport::default();
            for entry in pending {
                let couple_id = entry.intent.couple_id.clone();
                match self.resume_one(entry).await {
                    Ok(Some(done)) => report.completed.push(done),
                    Ok(None) => {}
                    Err(e) => {
                        warn!(couple_id = %couple_id, error = %e, "Purge still incomplete");
                        report.failed.push((couple_id, e.to_string()));
                    }
                }
            }
            Ok(report)
        })
        .await
    }

    /// Hand out the per-couple lock to a shared-entity writer once the
    /// caller's couple is confirmed to still exist.
    #[instrument(
        name = "pairing.service.lock_couple_for_write",
        skip(self, ctx),
        fields(caller_id = %caller)
    )]
    pub async fn lock_couple_for_write(
        &self,
        ctx: &CallContext,
        caller: Uuid,
    ) -> Result<CoupleWriteGuard, DomainError> {
        guard::run(ctx, async {
            let user = self.load_user(caller).await?;
            let Some(couple_id) = user.couple_id else {
                return Err(DomainError::not_matched(caller));
            };

            let lease = self.acquire_lock(&couple_id).await?;
            match self.couples.find_by_id(&couple_id).await {
                Ok(Some(_)) => {
                    debug!(couple_id = %couple_id, "Couple locked for write");
                    Ok(CoupleWriteGuard::new(couple_id, lease))
                }
                Ok(None) => {
                    lease.release().await;
                    Err(DomainError::not_matched(caller))
                }
                Err(e) => {
                    lease.release().await;
                    Err(DomainError::database(e))
                }
            }
        })
        .await
    }

    async fn dissolve_and_purge(
        &self,
        caller: Uuid,
        couple_id: &CoupleId,
    ) -> Result<UnmatchOutcome, DomainError> {
        let intent = PurgeIntent {
            journal_id: Uuid::new_v4(),
            couple_id: couple_id.clone(),
            requested_by: caller,
            requested_at: Utc::now(),
        };

        let dissolved = self
            .couples
            .dissolve(&intent)
            .await
            .map_err(DomainError::database)?;
        if !dissolved {
            debug!(couple_id = %couple_id, "Couple already dissolved");
            return Ok(UnmatchOutcome::NotMatched);
        }
        info!(couple_id = %couple_id, journal_id = %intent.journal_id, "Couple dissolved, purging shared data");

        let report = self.run_purge(PurgeEntry::from(intent)).await?;
        Ok(UnmatchOutcome::Dissolved(report))
    }

    async fn resume_one(&self, entry: PurgeEntry) -> Result<Option<PurgeReport>, DomainError> {
        let couple_id = entry.intent.couple_id.clone();
        let lease = self.acquire_lock(&couple_id).await?;

        // another run may have finished it while we waited for the lock
        let current = match self.journal.find(entry.intent.journal_id).await {
            Ok(found) => found,
            Err(e) => {
                lease.release().await;
                return Err(DomainError::database(e));
            }
        };
        let outcome = match current {
            Some(current) if current.completed_at.is_none() => {
                self.run_purge(current).await.map(Some)
            }
            _ => Ok(None),
        };
        lease.release().await;
        outcome
    }

    /// Steps 3 and 4 of the saga. Counts accumulate across attempts.
    async fn run_purge(&self, entry: PurgeEntry) -> Result<PurgeReport, DomainError> {
        let journal_id = entry.intent.journal_id;
        let couple_id = entry.intent.couple_id.clone();
        let mut purged = entry.purged;

        for purger in &self.purgers {
            let store = purger.kind();
            let removed = purger.purge_by_couple(&couple_id).await.map_err(|e| {
                let detail = format!("{e:#}");
                error!(couple_id = %couple_id, store, error = %detail, "Shared data purge failed, journal left incomplete");
                DomainError::purge_incomplete(&couple_id, store, detail)
            })?;

            let total = purged.get(store).copied().unwrap_or(0) + removed;
            self.journal
                .record_step(journal_id, store, total)
                .await
                .map_err(|e| DomainError::purge_incomplete(&couple_id, store, e))?;
            purged.insert(store.to_string(), total);
            debug!(couple_id = %couple_id, store, removed, "Store purged");
        }

        self.journal
            .complete(journal_id, Utc::now())
            .await
            .map_err(|e| DomainError::purge_incomplete(&couple_id, "journal", e))?;

        let (member_a, member_b) = couple_id.members();
        let report = PurgeReport {
            journal_id,
            couple_id,
            purged,
        };
        info!(
            target: AUDIT_TARGET,
            couple_id = %report.couple_id,
            journal_id = %journal_id,
            %member_a,
            %member_b,
            requested_by = %entry.intent.requested_by,
            requested_at = %entry.intent.requested_at,
            purged = ?report.purged,
            total = report.total(),
            "Couple shared data purged"
        );
        Ok(report)
    }

    pub(super) async fn acquire_lock(&self, couple_id: &CoupleId) -> Result<Box<dyn LockLease>, DomainError> {
        self.locks
            .acquire(couple_id)
            .await
            .map_err(DomainError::database)?
            .ok_or_else(|| {
                warn!(couple_id = %couple_id, "Couple lock wait budget exhausted");
                DomainError::lock_unavailable(couple_id)
            })
    }
}
