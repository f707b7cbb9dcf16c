//! The seam shared by every credential scheme.
//!
//! A scheme knows how to turn a login body into a credential, how to write
//! that credential into a response, and how to turn whatever a later
//! request presents back into an [`Identity`]. Route registration and the
//! `require` middleware are generic over [`AuthScheme`], so shared code never
//! branches on which scheme is in play.

use std::convert::Infallible;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::jwt::Claims;
use crate::error::AuthError;
use crate::extractors::ClientInfo;
use crate::models::{session, user};

/// Login request body, shared by every scheme.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    /// Reject blank fields before any credential check runs.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(AuthError::MalformedRequest(
                "username and password are required".to_string(),
            ));
        }
        Ok(())
    }
}

/// The authenticated principal attached to a request.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user: user::Model,
    /// Present when authenticated by a signed access token
    pub claims: Option<Claims>,
    /// Present when authenticated by a server-side session
    pub session: Option<session::Model>,
}

impl Identity {
    pub fn user(user: user::Model) -> Self {
        Identity {
            user,
            claims: None,
            session: None,
        }
    }
}

/// Everything a request offers as proof of identity.
#[derive(Debug, Clone)]
pub struct Presented {
    pub authorization: Option<String>,
    pub cookies: CookieJar,
    pub client: ClientInfo,
}

impl Presented {
    /// Token after `Bearer `, if that is the scheme used.
    pub fn bearer(&self) -> Option<&str> {
        self.authorization.as_deref()?.strip_prefix("Bearer ")
    }

    /// Payload after `Basic `, if that is the scheme used.
    pub fn basic(&self) -> Option<&str> {
        self.authorization.as_deref()?.strip_prefix("Basic ")
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name).map(|c| c.value().to_string())
    }
}

impl<S> FromRequestParts<S> for Presented
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let authorization = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let cookies = CookieJar::from_headers(&parts.headers);
        let client = ClientInfo::from_request_parts(parts, state).await?;

        Ok(Presented {
            authorization,
            cookies,
            client,
        })
    }
}

/// A credential scheme: login, authenticate, and optionally logout.
#[async_trait]
pub trait AuthScheme: Send + Sync + 'static {
    /// What a successful login hands out.
    type Credential: Send;

    /// Whether the scheme exposes a logout route.
    const HAS_LOGOUT: bool = false;

    /// Whether [`authenticate`](Self::authenticate) checks a password on
    /// every request. Such protected routes share the login rate limit.
    const VERIFIES_SECRET: bool = false;

    async fn login(
        &self,
        request: &LoginRequest,
        client: &ClientInfo,
    ) -> Result<Self::Credential, AuthError>;

    /// Render an issued credential, writing any cookie into `jar`.
    fn login_response(&self, credential: Self::Credential, jar: CookieJar) -> Response;

    async fn authenticate(&self, presented: &Presented) -> Result<Identity, AuthError>;

    /// Response for a failed [`authenticate`](Self::authenticate).
    fn reject(&self, error: AuthError, jar: CookieJar) -> Response {
        let _ = jar;
        error.into_response()
    }

    /// Invalidate whatever was presented. Never fails; returns the cookies
    /// to send back.
    async fn logout(&self, presented: &Presented) -> CookieJar {
        presented.cookies.clone()
    }
}
