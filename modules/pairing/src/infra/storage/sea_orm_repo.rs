//! SeaORM-backed implementations of the persistence ports.
//!
//! Every repository is generic over the connection type. The ones whose
//! transitions span several tables (`form`, `dissolve`) also need
//! `TransactionTrait` and open their own transaction.
//!
//! Single-row state transitions are compare-and-swap updates filtered on
//! the expected current state; `rows_affected == 0` means another writer
//! got there first.

use anyhow::Context;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::contract::couple_id::CoupleId;
use crate::contract::model::{MatchRequest, MatchRequestStatus, User};
use crate::domain::repo::{
    Couple, CoupleRepository, FormCouple, FormOutcome, InsertOutcome, ListFilter,
    MatchRequestRepository, PurgeEntry, PurgeIntent, PurgeJournal, UsersRepository,
};
use crate::infra::storage::entity::{couples, match_requests, purge_journal, users};
use crate::infra::storage::mapper::{encode_counts, parse_counts};

const PENDING: &str = "pending";

/// Read side of the users table.
pub struct SeaOrmUsersRepository<C>
where
    C: ConnectionTrait + Send + Sync,
{
    conn: C,
}

impl<C> SeaOrmUsersRepository<C>
where
    C: ConnectionTrait + Send + Sync,
{
    pub fn new(conn: C) -> Self {
        Self { conn }
    }
}

#[async_trait::async_trait]
impl<C> UsersRepository for SeaOrmUsersRepository<C>
where
    C: ConnectionTrait + Send + Sync + 'static,
{
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let found = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("users.find_by_id failed")?;
        found.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let found = users::Entity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(users::Column::Email)))
                    .eq(email.to_lowercase()),
            )
            .one(&self.conn)
            .await
            .context("users.find_by_email failed")?;
        found.map(User::try_from).transpose()
    }
}

pub struct SeaOrmMatchRequestRepository<C>
where
    C: ConnectionTrait + Send + Sync,
{
    conn: C,
}

impl<C> SeaOrmMatchRequestRepository<C>
where
    C: ConnectionTrait + Send + Sync,
{
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    async fn list_where(
        &self,
        column: match_requests::Column,
        user: Uuid,
        filter: ListFilter,
    ) -> anyhow::Result<(Vec<MatchRequest>, u64)> {
        let mut query = match_requests::Entity::find().filter(column.eq(user));
        if let Some(status) = filter.status {
            query = query.filter(match_requests::Column::Status.eq(status.as_str()));
        }

        let total = query
            .clone()
            .count(&self.conn)
            .await
            .context("match_requests count failed")?;
        let rows = query
            .order_by_desc(match_requests::Column::CreatedAt)
            .order_by_desc(match_requests::Column::Id)
            .offset(filter.offset)
            .limit(filter.limit)
            .all(&self.conn)
            .await
            .context("match_requests list failed")?;

        let items = rows
            .into_iter()
            .map(MatchRequest::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok((items, total))
    }
}

#[async_trait::async_trait]
impl<C> MatchRequestRepository for SeaOrmMatchRequestRepository<C>
where
    C: ConnectionTrait + Send + Sync + 'static,
{
    async fn insert_pending(&self, req: MatchRequest) -> anyhow::Result<InsertOutcome> {
        let m = match_requests::ActiveModel {
            id: Set(req.id),
            sender_id: Set(req.sender_id),
            receiver_id: Set(req.receiver_id),
            receiver_email: Set(req.receiver_email),
            anniversary_date: Set(req.anniversary_date),
            message: Set(req.message),
            status: Set(PENDING.to_string()),
            pending_key: Set(Some(match_requests::pending_key(
                req.sender_id,
                req.receiver_id,
            ))),
            created_at: Set(req.created_at),
            updated_at: Set(req.updated_at),
            responded_at: Set(None),
        };

        match match_requests::Entity::insert(m)
            .exec_without_returning(&self.conn)
            .await
        {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if db::errors::is_unique_violation(&e) => Ok(InsertOutcome::DuplicatePending),
            Err(e) => Err(anyhow::Error::new(e).context("match_requests insert failed")),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<MatchRequest>> {
        let found = match_requests::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("match_requests.find_by_id failed")?;
        found.map(MatchRequest::try_from).transpose()
    }

    async fn pending_exists(&self, sender: Uuid, receiver: Uuid) -> anyhow::Result<bool> {
        let count = match_requests::Entity::find()
            .filter(match_requests::Column::PendingKey.eq(match_requests::pending_key(sender, receiver)))
            .count(&self.conn)
            .await
            .context("pending_exists failed")?;
        Ok(count > 0)
    }

    async fn list_by_sender(
        &self,
        sender: Uuid,
        filter: ListFilter,
    ) -> anyhow::Result<(Vec<MatchRequest>, u64)> {
        self.list_where(match_requests::Column::SenderId, sender, filter)
            .await
    }

    async fn list_by_receiver(
        &self,
        receiver: Uuid,
        filter: ListFilter,
    ) -> anyhow::Result<(Vec<MatchRequest>, u64)> {
        self.list_where(match_requests::Column::ReceiverId, receiver, filter)
            .await
    }

    async fn decline(&self, id: Uuid, at: DateTime<Utc>) -> anyhow::Result<bool> {
        let res = match_requests::Entity::update_many()
            .col_expr(
                match_requests::Column::Status,
                Expr::value(MatchRequestStatus::Declined.as_str()),
            )
            .col_expr(match_requests::Column::PendingKey, Expr::value(Option::<String>::None))
            .col_expr(match_requests::Column::UpdatedAt, Expr::value(at))
            .col_expr(match_requests::Column::RespondedAt, Expr::value(Some(at)))
            .filter(match_requests::Column::Id.eq(id))
            .filter(match_requests::Column::Status.eq(PENDING))
            .exec(&self.conn)
            .await
            .context("decline failed")?;
        Ok(res.rows_affected > 0)
    }

    async fn delete_pending(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = match_requests::Entity::delete_many()
            .filter(match_requests::Column::Id.eq(id))
            .filter(match_requests::Column::Status.eq(PENDING))
            .exec(&self.conn)
            .await
            .context("delete_pending failed")?;
        Ok(res.rows_affected > 0)
    }
}

/// Couples table plus the two multi-table transitions.
pub struct SeaOrmCoupleRepository<C>
where
    C: ConnectionTrait + TransactionTrait + Send + Sync,
{
    conn: C,
}

impl<C> SeaOrmCoupleRepository<C>
where
    C: ConnectionTrait + TransactionTrait + Send + Sync,
{
    pub fn new(conn: C) -> Self {
        Self { conn }
    }
}

#[async_trait::async_trait]
impl<C> CoupleRepository for SeaOrmCoupleRepository<C>
where
    C: ConnectionTrait + TransactionTrait + Send + Sync + 'static,
{
    async fn form(&self, form: FormCouple) -> anyhow::Result<FormOutcome> {
        let couple = form.couple;
        let txn = self.conn.begin().await.context("begin form transaction")?;

        // same txn as the link, so a dissolve that commits first is always seen
        let unfinished = purge_journal::Entity::find()
            .filter(purge_journal::Column::CoupleId.eq(couple.id.as_str()))
            .filter(purge_journal::Column::CompletedAt.is_null())
            .count(&txn)
            .await
            .context("purge journal lookup failed")?;
        if unfinished > 0 {
            txn.rollback().await.context("rollback form")?;
            return Ok(FormOutcome::PurgePending);
        }

        let accepted = match_requests::Entity::update_many()
            .col_expr(
                match_requests::Column::Status,
                Expr::value(MatchRequestStatus::Accepted.as_str()),
            )
            .col_expr(match_requests::Column::PendingKey, Expr::value(Option::<String>::None))
            .col_expr(match_requests::Column::UpdatedAt, Expr::value(form.responded_at))
            .col_expr(
                match_requests::Column::RespondedAt,
                Expr::value(Some(form.responded_at)),
            )
            .filter(match_requests::Column::Id.eq(couple.request_id))
            .filter(match_requests::Column::Status.eq(PENDING))
            .exec(&txn)
            .await
            .context("accept request failed")?;
        if accepted.rows_affected == 0 {
            txn.rollback().await.context("rollback form")?;
            return Ok(FormOutcome::RequestNotPending);
        }

        let (member_a, member_b) = couple.id.members();
        for member in [member_a, member_b] {
            let linked = users::Entity::update_many()
                .col_expr(users::Column::CoupleId, Expr::value(couple.id.as_str()))
                .filter(users::Column::Id.eq(member))
                .filter(users::Column::CoupleId.is_null())
                .exec(&txn)
                .await
                .with_context(|| format!("link user {member} failed"))?;
            if linked.rows_affected == 0 {
                txn.rollback().await.context("rollback form")?;
                return Ok(FormOutcome::MemberUnavailable(member));
            }
        }

        let row = couples::ActiveModel {
            id: Set(couple.id.to_string()),
            member_a: Set(member_a),
            member_b: Set(member_b),
            request_id: Set(couple.request_id),
            matched_at: Set(couple.matched_at),
            anniversary_date: Set(couple.anniversary_date),
        };
        couples::Entity::insert(row)
            .exec_without_returning(&txn)
            .await
            .context("insert couple failed")?;

        txn.commit().await.context("commit form")?;
        Ok(FormOutcome::Formed)
    }

    async fn find_by_id(&self, id: &CoupleId) -> anyhow::Result<Option<Couple>> {
        let found = couples::Entity::find_by_id(id.as_str().to_owned())
            .one(&self.conn)
            .await
            .context("couples.find_by_id failed")?;
        found.map(Couple::try_from).transpose()
    }

    async fn dissolve(&self, intent: &PurgeIntent) -> anyhow::Result<bool> {
        let couple_id = intent.couple_id.as_str();
        let txn = self
            .conn
            .begin()
            .await
            .context("begin dissolve transaction")?;

        let deleted = couples::Entity::delete_by_id(couple_id.to_owned())
            .exec(&txn)
            .await
            .context("delete couple failed")?;
        if deleted.rows_affected == 0 {
            txn.rollback().await.context("rollback dissolve")?;
            return Ok(false);
        }

        users::Entity::update_many()
            .col_expr(users::Column::CoupleId, Expr::value(Option::<String>::None))
            .filter(users::Column::CoupleId.eq(couple_id))
            .exec(&txn)
            .await
            .context("unlink users failed")?;

        let (member_a, member_b) = intent.couple_id.members();
        let journal = purge_journal::ActiveModel {
            id: Set(intent.journal_id),
            couple_id: Set(couple_id.to_owned()),
            member_a: Set(member_a),
            member_b: Set(member_b),
            requested_by: Set(intent.requested_by),
            requested_at: Set(intent.requested_at),
            purged: Set(encode_counts(&Default::default())?),
            completed_at: Set(None),
        };
        purge_journal::Entity::insert(journal)
            .exec_without_returning(&txn)
            .await
            .context("insert purge journal failed")?;

        txn.commit().await.context("commit dissolve")?;
        Ok(true)
    }
}

pub struct SeaOrmPurgeJournal<C>
where
    C: ConnectionTrait + Send + Sync,
{
    conn: C,
}

impl<C> SeaOrmPurgeJournal<C>
where
    C: ConnectionTrait + Send + Sync,
{
    pub fn new(conn: C) -> Self {
        Self { conn }
    }
}

#[async_trait::async_trait]
impl<C> PurgeJournal for SeaOrmPurgeJournal<C>
where
    C: ConnectionTrait + Send + Sync + 'static,
{
    async fn record_step(
        &self,
        journal_id: Uuid,
        store: &str,
        purged: u64,
    ) -> anyhow::Result<()> {
        let row = purge_journal::Entity::find_by_id(journal_id)
            .one(&self.conn)
            .await
            .context("purge_journal lookup failed")?
            .with_context(|| format!("purge journal {journal_id} not found"))?;

        let mut counts = parse_counts(&row.purged)?;
        counts.insert(store.to_string(), purged);

        purge_journal::Entity::update_many()
            .col_expr(purge_journal::Column::Purged, Expr::value(encode_counts(&counts)?))
            .filter(purge_journal::Column::Id.eq(journal_id))
            .exec(&self.conn)
            .await
            .context("record_step failed")?;
        Ok(())
    }

    async fn complete(&self, journal_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<()> {
        purge_journal::Entity::update_many()
            .col_expr(purge_journal::Column::CompletedAt, Expr::value(Some(at)))
            .filter(purge_journal::Column::Id.eq(journal_id))
            .filter(purge_journal::Column::CompletedAt.is_null())
            .exec(&self.conn)
            .await
            .context("complete purge journal failed")?;
        Ok(())
    }

    async fn find(&self, journal_id: Uuid) -> anyhow::Result<Option<PurgeEntry>> {
        let found = purge_journal::Entity::find_by_id(journal_id)
            .one(&self.conn)
            .await
            .context("purge_journal.find failed")?;
        found.map(PurgeEntry::try_from).transpose()
    }

    async fn list_incomplete(&self) -> anyhow::Result<Vec<PurgeEntry>> {
        purge_journal::Entity::find()
            .filter(purge_journal::Column::CompletedAt.is_null())
            .order_by_asc(purge_journal::Column::RequestedAt)
            .all(&self.conn)
            .await
            .context("list_incomplete failed")?
            .into_iter()
            .map(PurgeEntry::try_from)
            .collect()
    }
}
