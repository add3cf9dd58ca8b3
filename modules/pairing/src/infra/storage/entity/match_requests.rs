use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "match_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub receiver_email: String,
    pub anniversary_date: NaiveDate,
    #[sea_orm(nullable)]
    pub message: Option<String>,
    /// "pending" | "accepted" | "declined"
    pub status: String,
    /// `"<sender>:<receiver>"` while pending, NULL afterwards. Unique.
    #[sea_orm(nullable, unique)]
    pub pending_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub fn pending_key(sender: Uuid, receiver: Uuid) -> String {
    format!("{sender}:{receiver}")
}
