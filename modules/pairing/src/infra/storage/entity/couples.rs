use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "couples")]
pub struct Model {
    /// Canonical couple id, see `CoupleId`.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Members in sorted order.
    pub member_a: Uuid,
    pub member_b: Uuid,
    pub request_id: Uuid,
    pub matched_at: DateTime<Utc>,
    pub anniversary_date: NaiveDate,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
