//! Login, protected and logout routes, registered once per scheme.
//!
//! Every scheme gets the same three handlers through [`scheme_routes`]; the
//! signed-token scheme adds `/refresh` on top.

use std::sync::Arc;

use axum::extract::State;
use axum::middleware::from_fn_with_state;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Router};
use axum_extra::extract::CookieJar;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::cookies::REFRESH_COOKIE;
use crate::auth::jwt::AccessTokenResponse;
use crate::auth::middleware::{limit_logins, require};
use crate::auth::{AuthScheme, Identity, LoginRequest, Presented, RateLimiter, SignedTokenService};
use crate::controllers::AppState;
use crate::error::AuthError;
use crate::extractors::{ClientInfo, Json};
use crate::models::session;
use crate::models::user::UserResponse;

// ── Response types ─────────────────────────────────────────────

/// Session details echoed back by the session-protected route.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionInfo {
    pub user_agent: String,
    pub ip_address: String,
    pub created_at: NaiveDateTime,
    pub last_activity: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

impl From<&session::Model> for SessionInfo {
    fn from(s: &session::Model) -> Self {
        SessionInfo {
            user_agent: s.user_agent.clone(),
            ip_address: s.ip_address.clone(),
            created_at: s.created_at,
            last_activity: s.last_activity,
            expires_at: s.expires_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProtectedResponse {
    pub message: String,
    pub user: UserResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionInfo>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

// ── Routes ─────────────────────────────────────────────────────

/// Every scheme's routes, nested under `/api/<scheme>-auth`.
pub fn routes(state: &AppState) -> Router {
    let limiter = state.login_limiter.clone();

    Router::new()
        .nest(
            "/api/basic-auth",
            scheme_routes(state.basic.clone(), limiter.clone()),
        )
        .nest(
            "/api/token-auth",
            scheme_routes(state.opaque.clone(), limiter.clone()),
        )
        .nest(
            "/api/jwt-auth",
            signed_token_routes(state.signed.clone(), limiter.clone()),
        )
        .nest(
            "/api/session-auth",
            scheme_routes(state.sessions.clone(), limiter),
        )
}

/// `/login`, `/protected` and (when the scheme has one) `/logout` for `S`.
///
/// `/protected` is rate limited as well when the scheme checks a password
/// on every request; the limiter runs before the credential check.
pub fn scheme_routes<S: AuthScheme>(scheme: Arc<S>, limiter: Arc<RateLimiter>) -> Router {
    let mut protected_route =
        get(protected).route_layer(from_fn_with_state(scheme.clone(), require::<S>));
    if S::VERIFIES_SECRET {
        protected_route =
            protected_route.route_layer(from_fn_with_state(limiter.clone(), limit_logins));
    }

    let mut router = Router::new()
        .route(
            "/login",
            post(login::<S>).route_layer(from_fn_with_state(limiter, limit_logins)),
        )
        .route("/protected", protected_route);

    if S::HAS_LOGOUT {
        router = router.route("/logout", post(logout::<S>));
    }

    router.with_state(scheme)
}

/// Scheme routes plus `/refresh` for signed tokens.
pub fn signed_token_routes(
    service: Arc<SignedTokenService>,
    limiter: Arc<RateLimiter>,
) -> Router {
    scheme_routes(service.clone(), limiter).merge(
        Router::new()
            .route("/refresh", post(refresh))
            .with_state(service),
    )
}

// ── Handlers ───────────────────────────────────────────────────

async fn login<S: AuthScheme>(
    State(scheme): State<Arc<S>>,
    client: ClientInfo,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<Response, AuthError> {
    body.validate()?;
    let credential = scheme.login(&body, &client).await?;
    Ok(scheme.login_response(credential, jar))
}

async fn protected(Extension(identity): Extension<Identity>) -> Json<ProtectedResponse> {
    Json(ProtectedResponse {
        message: "Access granted".to_string(),
        user: UserResponse::from(&identity.user),
        session: identity.session.as_ref().map(SessionInfo::from),
    })
}

async fn logout<S: AuthScheme>(
    State(scheme): State<Arc<S>>,
    presented: Presented,
) -> (CookieJar, Json<MessageResponse>) {
    let jar = scheme.logout(&presented).await;
    (
        jar,
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    )
}

async fn refresh(
    State(service): State<Arc<SignedTokenService>>,
    client: ClientInfo,
    jar: CookieJar,
) -> Result<(CookieJar, axum::Json<AccessTokenResponse>), AuthError> {
    let presented = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());
    let pair = service.refresh(&client, presented.as_deref()).await?;
    Ok(service.pair_response(pair, jar))
}
