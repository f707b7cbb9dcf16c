use std::sync::Arc;

use async_trait::async_trait;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::CookieJar;
use chrono::{NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::credentials::CredentialVerifier;
use crate::auth::random::generate_secure_token;
use crate::auth::scheme::{AuthScheme, Identity, LoginRequest, Presented};
use crate::error::AuthError;
use crate::extractors::ClientInfo;
use crate::models::user;
use crate::store::{NewOpaqueToken, TokenStore};

const VALUE_ATTEMPTS: usize = 3;

/// An issued opaque token.
#[derive(Debug, Clone)]
pub struct OpaqueCredential {
    pub token: String,
    pub expires_at: NaiveDateTime,
    pub user: user::Model,
}

/// Body returned by an opaque-token login.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OpaqueTokenResponse {
    pub token: String,
    pub token_type: String,
    /// Token lifetime in seconds
    pub expires_in: u64,
}

/// Random bearer tokens looked up in the store. Expiry is the only control.
pub struct OpaqueTokenService {
    verifier: CredentialVerifier,
    store: Arc<dyn TokenStore>,
    ttl_secs: u64,
}

impl OpaqueTokenService {
    pub fn new(verifier: CredentialVerifier, store: Arc<dyn TokenStore>, ttl_secs: u64) -> Self {
        OpaqueTokenService {
            verifier,
            store,
            ttl_secs,
        }
    }

    pub async fn issue(&self, user: &user::Model) -> Result<OpaqueCredential, AuthError> {
        let now = Utc::now().naive_utc();
        let expires_at = now + TimeDelta::seconds(self.ttl_secs as i64);
        let token = self.unique_value().await?;

        self.store
            .insert_token(NewOpaqueToken {
                value: token.clone(),
                user_id: user.id,
                created_at: now,
                expires_at,
            })
            .await?;

        Ok(OpaqueCredential {
            token,
            expires_at,
            user: user.clone(),
        })
    }

    async fn unique_value(&self) -> Result<String, AuthError> {
        for _ in 0..VALUE_ATTEMPTS {
            let candidate = generate_secure_token();
            if !self.store.token_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(AuthError::Internal(
            "could not allocate a unique token".to_string(),
        ))
    }

    pub async fn validate(&self, token: &str) -> Result<user::Model, AuthError> {
        let now = Utc::now().naive_utc();
        let record = self
            .store
            .find_live_token(token, now)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        self.verifier.resolve(record.user_id).await
    }

    /// Delete tokens past their expiry. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<u64, AuthError> {
        Ok(self
            .store
            .purge_expired_tokens(Utc::now().naive_utc())
            .await?)
    }
}

#[async_trait]
impl AuthScheme for OpaqueTokenService {
    type Credential = OpaqueCredential;

    async fn login(
        &self,
        request: &LoginRequest,
        _client: &ClientInfo,
    ) -> Result<OpaqueCredential, AuthError> {
        let user = self
            .verifier
            .verify(&request.username, &request.password)
            .await?;
        self.issue(&user).await
    }

    fn login_response(&self, credential: OpaqueCredential, jar: CookieJar) -> Response {
        let body = OpaqueTokenResponse {
            token: credential.token,
            token_type: "Bearer".to_string(),
            expires_in: self.ttl_secs,
        };
        (jar, Json(body)).into_response()
    }

    async fn authenticate(&self, presented: &Presented) -> Result<Identity, AuthError> {
        let token = presented
            .bearer()
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidCredentials)?;
        Ok(Identity::user(self.validate(token).await?))
    }
}
