//! Route-level middleware for credential checks and login throttling.
//!
//! # Usage
//!
//! ```rust,ignore
//! use axum::middleware::from_fn_with_state;
//! use warden_core::auth::middleware::{limit_logins, require};
//!
//! Router::new()
//!     .route("/protected", get(protected).route_layer(from_fn_with_state(scheme, require::<SessionService>)))
//!     .route("/login", post(login).route_layer(from_fn_with_state(limiter, limit_logins)))
//! ```

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::auth::rate_limit::RateLimiter;
use crate::auth::scheme::{AuthScheme, Presented};
use crate::error::AuthError;
use crate::extractors::ClientInfo;

/// Authenticate with `S` and attach the resulting `Identity` to the request.
pub async fn require<S: AuthScheme>(
    State(scheme): State<Arc<S>>,
    presented: Presented,
    mut req: Request,
    next: Next,
) -> Response {
    match scheme.authenticate(&presented).await {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(error) => scheme.reject(error, presented.cookies),
    }
}

/// Sliding-window limit on password checks, keyed by client IP.
pub async fn limit_logins(
    State(limiter): State<Arc<RateLimiter>>,
    client: ClientInfo,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if let Err(retry_after) = limiter.check(&client.ip) {
        tracing::warn!(client_ip = %client.ip, retry_after, "login rate limit exceeded");
        return Err(AuthError::RateLimited { retry_after });
    }
    Ok(next.run(req).await)
}
