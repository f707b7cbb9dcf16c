use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;

use crate::auth::{
    BasicScheme, CredentialVerifier, OpaqueTokenService, RateLimiter, RefreshThrottle,
    RevocationList, SessionService, SignedTokenService,
};
use crate::auth::locks::KeyedLocks;
use crate::config::Config;
use crate::store::SeaStore;

/// Shared application state: one instance of every scheme plus the tables
/// they share.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
    pub basic: Arc<BasicScheme>,
    pub opaque: Arc<OpaqueTokenService>,
    pub signed: Arc<SignedTokenService>,
    pub sessions: Arc<SessionService>,
    pub login_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Wire every service over one SeaORM store.
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        let store = Arc::new(SeaStore::new(db.clone(), config.store_timeout()));
        let verifier = CredentialVerifier::new(store.clone());
        let security = &config.security;

        let throttle = Arc::new(RefreshThrottle::new(
            security.refresh_max_attempts,
            Duration::from_secs(security.refresh_window_secs),
            Duration::from_secs(security.refresh_ban_secs),
        ));
        let signed = SignedTokenService::new(
            verifier.clone(),
            &config.jwt_secret,
            security,
            Arc::new(RevocationList::new()),
            throttle,
        );
        let sessions = SessionService::new(
            verifier.clone(),
            store.clone(),
            Arc::new(KeyedLocks::new()),
            security,
        );
        let opaque =
            OpaqueTokenService::new(verifier.clone(), store, security.opaque_token_ttl_secs);
        let login_limiter = RateLimiter::new(
            security.login_rate_limit,
            Duration::from_secs(security.login_rate_window_secs),
        );

        AppState {
            db,
            basic: Arc::new(BasicScheme::new(verifier)),
            opaque: Arc::new(opaque),
            signed: Arc::new(signed),
            sessions: Arc::new(sessions),
            login_limiter: Arc::new(login_limiter),
            config: Arc::new(config),
        }
    }
}

pub mod auth;
pub mod health;
