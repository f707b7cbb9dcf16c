//! Persistence seams for users, sessions and opaque tokens.
//!
//! The auth services only see these traits. [`SeaStore`] implements all of
//! them over a SeaORM connection, bounding every call with a timeout so a
//! stalled database surfaces as [`StoreError::Timeout`] rather than a hung
//! request.

mod sea;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

use crate::models::{opaque_token, session, user};

pub use sea::SeaStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("store call timed out")]
    Timeout,
}

/// Fields needed to create a user record.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

/// Fields needed to persist an opaque token.
#[derive(Debug, Clone)]
pub struct NewOpaqueToken {
    pub value: String,
    pub user_id: i32,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_username(&self, username: &str)
        -> Result<Option<user::Model>, StoreError>;

    async fn find_user_by_id(&self, id: i32) -> Result<Option<user::Model>, StoreError>;

    async fn insert_user(&self, new_user: NewUser) -> Result<user::Model, StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn session_exists(&self, id: &str) -> Result<bool, StoreError>;

    async fn insert_session(&self, session: session::Model) -> Result<(), StoreError>;

    async fn find_session(&self, id: &str) -> Result<Option<session::Model>, StoreError>;

    async fn count_valid_sessions(&self, user_id: i32) -> Result<u64, StoreError>;

    /// Valid sessions of a user, oldest `created_at` first.
    async fn oldest_valid_sessions(
        &self,
        user_id: i32,
        limit: u64,
    ) -> Result<Vec<session::Model>, StoreError>;

    /// Flip `is_valid` to false. Returns whether a valid row was changed.
    async fn invalidate_session(&self, id: &str) -> Result<bool, StoreError>;

    async fn invalidate_user_sessions(&self, user_id: i32) -> Result<u64, StoreError>;

    async fn touch_session(&self, id: &str, at: NaiveDateTime) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn token_exists(&self, value: &str) -> Result<bool, StoreError>;

    async fn insert_token(&self, token: NewOpaqueToken) -> Result<(), StoreError>;

    /// Token row with this value whose `expires_at` is after `now`.
    async fn find_live_token(
        &self,
        value: &str,
        now: NaiveDateTime,
    ) -> Result<Option<opaque_token::Model>, StoreError>;

    async fn purge_expired_tokens(&self, now: NaiveDateTime) -> Result<u64, StoreError>;
}
