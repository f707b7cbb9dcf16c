use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Server-side session. Rows are never deleted; terminal transitions flip
/// `is_valid` so the history stays auditable.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// Opaque, unguessable id; the only thing the cookie carries
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_id: i32,

    /// Fingerprint recorded at login
    pub user_agent: String,
    pub ip_address: String,

    pub created_at: NaiveDateTime,
    pub last_activity: NaiveDateTime,
    pub expires_at: NaiveDateTime,

    pub is_valid: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// `is_valid` and not past the absolute expiry.
    pub fn is_active(&self, now: NaiveDateTime) -> bool {
        self.is_valid && now < self.expires_at
    }
}
