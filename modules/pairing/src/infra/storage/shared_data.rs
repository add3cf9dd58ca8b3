//! Couple-scoped stores (calendar events, photos).
//!
//! Writes require a [`CoupleWriteGuard`], so nothing can be tagged with a
//! couple id while that couple is being dissolved. Bulk purge by couple id
//! is the only delete this subsystem performs on them.

use anyhow::Context;
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::contract::couple_id::CoupleId;
use crate::contract::lock::CoupleWriteGuard;
use crate::domain::repo::SharedDataPurger;
use crate::infra::storage::entity::{couple_events, couple_photos};

pub struct NewEvent {
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub created_by: Uuid,
}

pub struct NewPhoto {
    pub object_key: String,
    pub uploaded_by: Uuid,
}

pub struct SeaOrmCoupleEvents<C>
where
    C: ConnectionTrait + Send + Sync,
{
    conn: C,
}

impl<C> SeaOrmCoupleEvents<C>
where
    C: ConnectionTrait + Send + Sync,
{
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    pub async fn create(&self, guard: &CoupleWriteGuard, event: NewEvent) -> anyhow::Result<Uuid> {
        let id = Uuid::new_v4();
        let row = couple_events::ActiveModel {
            id: Set(id),
            couple_id: Set(guard.couple_id().to_string()),
            title: Set(event.title),
            starts_at: Set(event.starts_at),
            created_by: Set(event.created_by),
            created_at: Set(Utc::now()),
        };
        couple_events::Entity::insert(row)
            .exec_without_returning(&self.conn)
            .await
            .context("insert couple event failed")?;
        Ok(id)
    }

    pub async fn count_by_couple(&self, couple_id: &CoupleId) -> anyhow::Result<u64> {
        couple_events::Entity::find()
            .filter(couple_events::Column::CoupleId.eq(couple_id.as_str()))
            .count(&self.conn)
            .await
            .context("count couple events failed")
    }
}

#[async_trait::async_trait]
impl<C> SharedDataPurger for SeaOrmCoupleEvents<C>
where
    C: ConnectionTrait + Send + Sync + 'static,
{
    fn kind(&self) -> &'static str {
        "events"
    }

    async fn purge_by_couple(&self, couple_id: &CoupleId) -> anyhow::Result<u64> {
        let res = couple_events::Entity::delete_many()
            .filter(couple_events::Column::CoupleId.eq(couple_id.as_str()))
            .exec(&self.conn)
            .await
            .context("purge couple events failed")?;
        Ok(res.rows_affected)
    }
}

pub struct SeaOrmCouplePhotos<C>
where
    C: ConnectionTrait + Send + Sync,
{
    conn: C,
}

impl<C> SeaOrmCouplePhotos<C>
where
    C: ConnectionTrait + Send + Sync,
{
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    pub async fn create(&self, guard: &CoupleWriteGuard, photo: NewPhoto) -> anyhow::Result<Uuid> {
        let id = Uuid::new_v4();
        let row = couple_photos::ActiveModel {
            id: Set(id),
            couple_id: Set(guard.couple_id().to_string()),
            object_key: Set(photo.object_key),
            uploaded_by: Set(photo.uploaded_by),
            created_at: Set(Utc::now()),
        };
        couple_photos::Entity::insert(row)
            .exec_without_returning(&self.conn)
            .await
            .context("insert couple photo failed")?;
        Ok(id)
    }

    pub async fn count_by_couple(&self, couple_id: &CoupleId) -> anyhow::Result<u64> {
        couple_photos::Entity::find()
            .filter(couple_photos::Column::CoupleId.eq(couple_id.as_str()))
            .count(&self.conn)
            .await
            .context("count couple photos failed")
    }
}

#[async_trait::async_trait]
impl<C> SharedDataPurger for SeaOrmCouplePhotos<C>
where
    C: ConnectionTrait + Send + Sync + 'static,
{
    fn kind(&self) -> &'static str {
        "photos"
    }

    // Object storage cleanup for `object_key` belongs to the media service.
    async fn purge_by_couple(&self, couple_id: &CoupleId) -> anyhow::Result<u64> {
        let res = couple_photos::Entity::delete_many()
            .filter(couple_photos::Column::CoupleId.eq(couple_id.as_str()))
            .exec(&self.conn)
            .await
            .context("purge couple photos failed")?;
        Ok(res.rows_affected)
    }
}
