use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "purge_journal")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(indexed)]
    pub couple_id: String,
    pub member_a: Uuid,
    pub member_b: Uuid,
    pub requested_by: Uuid,
    pub requested_at: DateTime<Utc>,
    /// JSON object: store kind -> purged count.
    pub purged: String,
    /// NULL while the purge saga is unfinished.
    #[sea_orm(nullable)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
