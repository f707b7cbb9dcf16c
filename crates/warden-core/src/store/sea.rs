use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use super::{NewOpaqueToken, NewUser, SessionStore, StoreError, TokenStore, UserStore};
use crate::models::{opaque_token, session, user};

/// SeaORM-backed implementation of every store trait.
#[derive(Clone)]
pub struct SeaStore {
    db: DatabaseConnection,
    timeout: Duration,
}

impl SeaStore {
    pub fn new(db: DatabaseConnection, timeout: Duration) -> Self {
        SeaStore { db, timeout }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, DbErr>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout),
        }
    }
}

#[async_trait]
impl UserStore for SeaStore {
    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<user::Model>, StoreError> {
        self.bounded(
            user::Entity::find()
                .filter(user::Column::Username.eq(username))
                .one(&self.db),
        )
        .await
    }

    async fn find_user_by_id(&self, id: i32) -> Result<Option<user::Model>, StoreError> {
        self.bounded(user::Entity::find_by_id(id).one(&self.db)).await
    }

    async fn insert_user(&self, new_user: NewUser) -> Result<user::Model, StoreError> {
        let now = Utc::now().naive_utc();
        let model = user::ActiveModel {
            username: Set(new_user.username),
            email: Set(new_user.email),
            password_hash: Set(new_user.password_hash),
            role: Set(new_user.role),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        self.bounded(model.insert(&self.db)).await
    }
}

#[async_trait]
impl SessionStore for SeaStore {
    async fn session_exists(&self, id: &str) -> Result<bool, StoreError> {
        let count = self
            .bounded(
                session::Entity::find()
                    .filter(session::Column::Id.eq(id))
                    .count(&self.db),
            )
            .await?;
        Ok(count > 0)
    }

    async fn insert_session(&self, session: session::Model) -> Result<(), StoreError> {
        let active: session::ActiveModel = session.into();
        self.bounded(session::Entity::insert(active).exec_without_returning(&self.db))
            .await?;
        Ok(())
    }

    async fn find_session(&self, id: &str) -> Result<Option<session::Model>, StoreError> {
        self.bounded(session::Entity::find_by_id(id.to_string()).one(&self.db))
            .await
    }

    async fn count_valid_sessions(&self, user_id: i32) -> Result<u64, StoreError> {
        self.bounded(
            session::Entity::find()
                .filter(session::Column::UserId.eq(user_id))
                .filter(session::Column::IsValid.eq(true))
                .count(&self.db),
        )
        .await
    }

    async fn oldest_valid_sessions(
        &self,
        user_id: i32,
        limit: u64,
    ) -> Result<Vec<session::Model>, StoreError> {
        self.bounded(
            session::Entity::find()
                .filter(session::Column::UserId.eq(user_id))
                .filter(session::Column::IsValid.eq(true))
                .order_by_asc(session::Column::CreatedAt)
                .limit(limit)
                .all(&self.db),
        )
        .await
    }

    async fn invalidate_session(&self, id: &str) -> Result<bool, StoreError> {
        let result = self
            .bounded(
                session::Entity::update_many()
                    .col_expr(session::Column::IsValid, Expr::value(false))
                    .filter(session::Column::Id.eq(id))
                    .filter(session::Column::IsValid.eq(true))
                    .exec(&self.db),
            )
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn invalidate_user_sessions(&self, user_id: i32) -> Result<u64, StoreError> {
        let result = self
            .bounded(
                session::Entity::update_many()
                    .col_expr(session::Column::IsValid, Expr::value(false))
                    .filter(session::Column::UserId.eq(user_id))
                    .filter(session::Column::IsValid.eq(true))
                    .exec(&self.db),
            )
            .await?;
        Ok(result.rows_affected)
    }

    async fn touch_session(&self, id: &str, at: NaiveDateTime) -> Result<(), StoreError> {
        self.bounded(
            session::Entity::update_many()
                .col_expr(session::Column::LastActivity, Expr::value(at))
                .filter(session::Column::Id.eq(id))
                .exec(&self.db),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for SeaStore {
    async fn token_exists(&self, value: &str) -> Result<bool, StoreError> {
        let count = self
            .bounded(
                opaque_token::Entity::find()
                    .filter(opaque_token::Column::Value.eq(value))
                    .count(&self.db),
            )
            .await?;
        Ok(count > 0)
    }

    async fn insert_token(&self, token: NewOpaqueToken) -> Result<(), StoreError> {
        let model = opaque_token::ActiveModel {
            value: Set(token.value),
            user_id: Set(token.user_id),
            created_at: Set(token.created_at),
            expires_at: Set(token.expires_at),
            ..Default::default()
        };
        self.bounded(opaque_token::Entity::insert(model).exec_without_returning(&self.db))
            .await?;
        Ok(())
    }

    async fn find_live_token(
        &self,
        value: &str,
        now: NaiveDateTime,
    ) -> Result<Option<opaque_token::Model>, StoreError> {
        self.bounded(
            opaque_token::Entity::find()
                .filter(opaque_token::Column::Value.eq(value))
                .filter(opaque_token::Column::ExpiresAt.gt(now))
                .one(&self.db),
        )
        .await
    }

    async fn purge_expired_tokens(&self, now: NaiveDateTime) -> Result<u64, StoreError> {
        let result = self
            .bounded(
                opaque_token::Entity::delete_many()
                    .filter(opaque_token::Column::ExpiresAt.lte(now))
                    .exec(&self.db),
            )
            .await?;
        Ok(result.rows_affected)
    }
}
