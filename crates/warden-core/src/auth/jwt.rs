use std::sync::Arc;

use async_trait::async_trait;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::cookies::{cleared_cookie, credential_cookie, REFRESH_COOKIE};
use crate::auth::credentials::CredentialVerifier;
use crate::auth::revocation::RevocationList;
use crate::auth::scheme::{AuthScheme, Identity, LoginRequest, Presented};
use crate::auth::throttle::RefreshThrottle;
use crate::config::SecurityConfig;
use crate::error::AuthError;
use crate::extractors::ClientInfo;
use crate::models::user;

/// Which half of a pair a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Access,
    Refresh,
}

/// Signed token claims payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Claims {
    pub user_id: String,
    pub username: String,
    pub role: String,
    /// Issuer
    pub iss: String,
    /// Subject (user ID)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp)
    pub nbf: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Unique per token, so two tokens minted in the same second differ
    pub jti: String,
    pub token_use: TokenUse,
}

impl Claims {
    /// `now < exp`; a token exactly at `exp` is expired.
    pub fn is_live(&self, now: i64) -> bool {
        now < self.exp
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

/// Access/refresh pair minted together for one subject.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_claims: Claims,
    pub refresh_claims: Claims,
}

/// Body returned when an access token is issued.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

/// Issues, validates, rotates and revokes HS256 access/refresh pairs.
pub struct SignedTokenService {
    verifier: CredentialVerifier,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
    revoked: Arc<RevocationList>,
    throttle: Arc<RefreshThrottle>,
}

impl SignedTokenService {
    pub fn new(
        verifier: CredentialVerifier,
        secret: &str,
        security: &SecurityConfig,
        revoked: Arc<RevocationList>,
        throttle: Arc<RefreshThrottle>,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[security.jwt_issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);
        // Expiry and not-before are checked by hand with closed-open bounds.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;

        SignedTokenService {
            verifier,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer: security.jwt_issuer.clone(),
            access_ttl_secs: security.access_token_ttl_secs,
            refresh_ttl_secs: security.refresh_token_ttl_secs,
            revoked,
            throttle,
        }
    }

    pub fn access_ttl_secs(&self) -> u64 {
        self.access_ttl_secs
    }

    pub fn revocations(&self) -> &Arc<RevocationList> {
        &self.revoked
    }

    pub fn throttle(&self) -> &Arc<RefreshThrottle> {
        &self.throttle
    }

    /// Claims for `user` of the given kind, issued at `now`.
    pub fn claims_for(&self, user: &user::Model, token_use: TokenUse, now: i64) -> Claims {
        let ttl = match token_use {
            TokenUse::Access => self.access_ttl_secs,
            TokenUse::Refresh => self.refresh_ttl_secs,
        };
        Claims {
            user_id: user.id.to_string(),
            username: user.username.clone(),
            role: user.role.clone(),
            iss: self.issuer.clone(),
            sub: user.id.to_string(),
            iat: now,
            nbf: now,
            exp: now + ttl as i64,
            jti: Uuid::new_v4().to_string(),
            token_use,
        }
    }

    /// Sign arbitrary claims with the service key.
    pub fn encode_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Mint a fresh access/refresh pair for `user`.
    pub fn issue_pair(&self, user: &user::Model) -> Result<TokenPair, AuthError> {
        let now = Utc::now().timestamp();
        let access_claims = self.claims_for(user, TokenUse::Access, now);
        let refresh_claims = self.claims_for(user, TokenUse::Refresh, now);

        Ok(TokenPair {
            access_token: self.encode_claims(&access_claims)?,
            refresh_token: self.encode_claims(&refresh_claims)?,
            access_claims,
            refresh_claims,
        })
    }

    /// Signature, algorithm and issuer only.
    fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "signed token rejected");
                AuthError::InvalidCredentials
            })
    }

    /// Full access-token check: not revoked, correctly signed, an access
    /// token, and inside `[nbf, exp)`.
    pub fn validate_access(&self, token: &str) -> Result<Claims, AuthError> {
        if self.revoked.is_revoked(token) {
            return Err(AuthError::InvalidCredentials);
        }
        let claims = self.decode(token)?;
        let now = Utc::now().timestamp();
        if claims.token_use != TokenUse::Access || !claims.is_live(now) || now < claims.nbf {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(claims)
    }

    /// Exchange a refresh token for a new pair, revoking the old one.
    pub async fn refresh(
        &self,
        client: &ClientInfo,
        refresh_token: Option<&str>,
    ) -> Result<TokenPair, AuthError> {
        self.throttle
            .attempt(&client.ip)
            .map_err(|retry_after| AuthError::RateLimited { retry_after })?;

        let token = refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidCredentials)?;

        let claims = self.decode(token)?;
        if claims.token_use != TokenUse::Refresh || !claims.is_live(Utc::now().timestamp()) {
            return Err(AuthError::InvalidCredentials);
        }
        if self.revoked.is_revoked(token) {
            tracing::warn!(
                user_id = %claims.user_id,
                client_ip = %client.ip,
                "revoked refresh token presented"
            );
            return Err(AuthError::InvalidCredentials);
        }

        let user = self.verifier.resolve_str(&claims.user_id).await?;

        if !self.revoked.try_revoke(token, claims.expires_at()) {
            tracing::warn!(user_id = user.id, "refresh token already consumed");
            return Err(AuthError::InvalidCredentials);
        }

        let pair = self.issue_pair(&user)?;
        tracing::info!(user_id = user.id, client_ip = %client.ip, "refresh token rotated");
        Ok(pair)
    }

    /// Revoke a presented access token until its own expiry. Tokens that do
    /// not decode are ignored.
    pub fn revoke_access(&self, token: &str) {
        if let Ok(claims) = self.decode(token) {
            self.revoked.revoke(token, claims.expires_at());
            tracing::info!(user_id = %claims.user_id, "access token revoked");
        }
    }

    pub fn access_response(&self, pair: &TokenPair) -> AccessTokenResponse {
        AccessTokenResponse {
            access_token: pair.access_token.clone(),
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl_secs,
        }
    }

    /// Set the refresh cookie and return the access token body.
    pub fn pair_response(&self, pair: TokenPair, jar: CookieJar) -> (CookieJar, Json<AccessTokenResponse>) {
        let body = self.access_response(&pair);
        let jar = jar.add(credential_cookie(
            REFRESH_COOKIE,
            pair.refresh_token,
            self.refresh_ttl_secs,
        ));
        (jar, Json(body))
    }
}

#[async_trait]
impl AuthScheme for SignedTokenService {
    type Credential = TokenPair;

    const HAS_LOGOUT: bool = true;

    async fn login(
        &self,
        request: &LoginRequest,
        _client: &ClientInfo,
    ) -> Result<TokenPair, AuthError> {
        let user = self
            .verifier
            .verify(&request.username, &request.password)
            .await?;
        self.issue_pair(&user)
    }

    fn login_response(&self, credential: TokenPair, jar: CookieJar) -> Response {
        self.pair_response(credential, jar).into_response()
    }

    async fn authenticate(&self, presented: &Presented) -> Result<Identity, AuthError> {
        let token = presented.bearer().ok_or(AuthError::InvalidCredentials)?;
        let claims = self.validate_access(token)?;
        let user = self.verifier.resolve_str(&claims.user_id).await?;

        Ok(Identity {
            user,
            claims: Some(claims),
            session: None,
        })
    }

    async fn logout(&self, presented: &Presented) -> CookieJar {
        if let Some(token) = presented.bearer() {
            self.revoke_access(token);
        }
        presented.cookies.clone().add(cleared_cookie(REFRESH_COOKIE))
    }
}
