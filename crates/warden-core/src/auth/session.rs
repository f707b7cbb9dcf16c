use std::sync::Arc;

use async_trait::async_trait;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::CookieJar;
use chrono::{NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::cookies::{cleared_cookie, credential_cookie, SESSION_COOKIE};
use crate::auth::credentials::CredentialVerifier;
use crate::auth::locks::KeyedLocks;
use crate::auth::random::generate_secure_token;
use crate::auth::scheme::{AuthScheme, Identity, LoginRequest, Presented};
use crate::config::SecurityConfig;
use crate::error::AuthError;
use crate::extractors::ClientInfo;
use crate::models::session;
use crate::models::user::{self, UserResponse};
use crate::store::SessionStore;

const ID_ATTEMPTS: usize = 3;

/// A freshly created session and its owner.
#[derive(Debug, Clone)]
pub struct SessionLogin {
    pub session: session::Model,
    pub user: user::Model,
}

/// Body returned by a session login.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionLoginResponse {
    pub message: String,
    pub user: UserResponse,
}

/// Server-side sessions bound to a client fingerprint, with a per-user cap,
/// an idle timeout and an absolute lifetime.
pub struct SessionService {
    verifier: CredentialVerifier,
    store: Arc<dyn SessionStore>,
    locks: Arc<KeyedLocks>,
    ttl_secs: u64,
    idle_timeout: TimeDelta,
    max_sessions: u32,
}

impl SessionService {
    pub fn new(
        verifier: CredentialVerifier,
        store: Arc<dyn SessionStore>,
        locks: Arc<KeyedLocks>,
        security: &SecurityConfig,
    ) -> Self {
        SessionService {
            verifier,
            store,
            locks,
            ttl_secs: security.session_ttl_secs,
            idle_timeout: TimeDelta::seconds(security.session_idle_timeout_secs as i64),
            max_sessions: security.max_sessions.max(1),
        }
    }

    pub fn locks(&self) -> &Arc<KeyedLocks> {
        &self.locks
    }

    /// Create a session for an already verified user, evicting the oldest
    /// sessions if the user is at the cap.
    pub async fn open(
        &self,
        user: &user::Model,
        client: &ClientInfo,
    ) -> Result<session::Model, AuthError> {
        let _guard = self.locks.lock(user.id).await;

        let max = u64::from(self.max_sessions);
        let active = self.store.count_valid_sessions(user.id).await?;
        if active >= max {
            let excess = active - (max - 1);
            for old in self.store.oldest_valid_sessions(user.id, excess).await? {
                if self.store.invalidate_session(&old.id).await? {
                    tracing::info!(
                        user_id = user.id,
                        session_id = %old.id,
                        "session cap reached, oldest session invalidated"
                    );
                }
            }
        }

        let now = Utc::now().naive_utc();
        let record = session::Model {
            id: self.unique_id().await?,
            user_id: user.id,
            user_agent: client.user_agent.clone(),
            ip_address: client.ip.clone(),
            created_at: now,
            last_activity: now,
            expires_at: now + TimeDelta::seconds(self.ttl_secs as i64),
            is_valid: true,
        };
        self.store.insert_session(record.clone()).await?;

        tracing::debug!(user_id = user.id, client_ip = %client.ip, "session created");
        Ok(record)
    }

    async fn unique_id(&self) -> Result<String, AuthError> {
        for _ in 0..ID_ATTEMPTS {
            let candidate = generate_secure_token();
            if !self.store.session_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(AuthError::Internal(
            "could not allocate a unique session id".to_string(),
        ))
    }

    /// Validate a session id presented by `client` at `now`.
    pub async fn validate(
        &self,
        id: &str,
        client: &ClientInfo,
        now: NaiveDateTime,
    ) -> Result<Identity, AuthError> {
        let Some(mut record) = self.store.find_session(id).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        if !record.is_active(now) {
            return Err(AuthError::InvalidCredentials);
        }

        if record.user_agent != client.user_agent || record.ip_address != client.ip {
            self.store.invalidate_session(id).await?;
            tracing::warn!(
                user_id = record.user_id,
                session_id = %id,
                client_ip = %client.ip,
                recorded_ip = %record.ip_address,
                "session fingerprint mismatch, possible hijack; session invalidated"
            );
            return Err(AuthError::InvalidCredentials);
        }

        if now.signed_duration_since(record.last_activity) > self.idle_timeout {
            self.store.invalidate_session(id).await?;
            tracing::info!(
                user_id = record.user_id,
                session_id = %id,
                "session idle timeout exceeded, session invalidated"
            );
            return Err(AuthError::InvalidCredentials);
        }

        self.store.touch_session(id, now).await?;
        record.last_activity = now;

        let user = self.verifier.resolve(record.user_id).await?;
        Ok(Identity {
            user,
            claims: None,
            session: Some(record),
        })
    }

    /// Invalidate every valid session of a user.
    pub async fn revoke_all(&self, user_id: i32) -> Result<u64, AuthError> {
        let _guard = self.locks.lock(user_id).await;
        let count = self.store.invalidate_user_sessions(user_id).await?;
        tracing::info!(user_id, count, "all sessions revoked");
        Ok(count)
    }
}

#[async_trait]
impl AuthScheme for SessionService {
    type Credential = SessionLogin;

    const HAS_LOGOUT: bool = true;

    async fn login(
        &self,
        request: &LoginRequest,
        client: &ClientInfo,
    ) -> Result<SessionLogin, AuthError> {
        let user = self
            .verifier
            .verify(&request.username, &request.password)
            .await?;
        let session = self.open(&user, client).await?;
        Ok(SessionLogin { session, user })
    }

    fn login_response(&self, credential: SessionLogin, jar: CookieJar) -> Response {
        let jar = jar.add(credential_cookie(
            SESSION_COOKIE,
            credential.session.id,
            self.ttl_secs,
        ));
        let body = SessionLoginResponse {
            message: "Login successful".to_string(),
            user: UserResponse::from(credential.user),
        };
        (jar, Json(body)).into_response()
    }

    async fn authenticate(&self, presented: &Presented) -> Result<Identity, AuthError> {
        let id = presented
            .cookie(SESSION_COOKIE)
            .filter(|id| !id.is_empty())
            .ok_or(AuthError::InvalidCredentials)?;
        self.validate(&id, &presented.client, Utc::now().naive_utc())
            .await
    }

    fn reject(&self, error: AuthError, jar: CookieJar) -> Response {
        (jar.add(cleared_cookie(SESSION_COOKIE)), error).into_response()
    }

    async fn logout(&self, presented: &Presented) -> CookieJar {
        if let Some(id) = presented.cookie(SESSION_COOKIE).filter(|id| !id.is_empty()) {
            match self.store.invalidate_session(&id).await {
                Ok(true) => tracing::info!(session_id = %id, "session logged out"),
                Ok(false) => {}
                Err(e) => tracing::error!(session_id = %id, error = %e, "failed to invalidate session on logout"),
            }
        }
        presented.cookies.clone().add(cleared_cookie(SESSION_COOKIE))
    }
}
