use std::sync::{Arc, LazyLock};

use crate::auth::password::{hash_password, verify_password};
use crate::error::AuthError;
use crate::models::user;
use crate::store::UserStore;

/// Hash checked when the username is unknown, so that path costs one
/// Argon2 verify like a wrong password does.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("warden-dummy-password").ok());

/// Run a verify against [`DUMMY_HASH`]. Returns whether Argon2 actually ran.
fn verify_dummy(secret: &str) -> bool {
    match DUMMY_HASH.as_deref() {
        Some(hash) => verify_password(secret, hash).is_ok(),
        None => false,
    }
}

/// Checks a username/secret pair against the user store.
///
/// Unknown users and wrong secrets fail identically.
#[derive(Clone)]
pub struct CredentialVerifier {
    users: Arc<dyn UserStore>,
}

impl CredentialVerifier {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        CredentialVerifier { users }
    }

    pub async fn verify(&self, username: &str, secret: &str) -> Result<user::Model, AuthError> {
        let Some(user_model) = self.users.find_user_by_username(username).await? else {
            verify_dummy(secret);
            tracing::info!(username, "login attempt for unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        match verify_password(secret, &user_model.password_hash) {
            Ok(true) => Ok(user_model),
            Ok(false) => {
                tracing::info!(user_id = user_model.id, "login attempt with wrong password");
                Err(AuthError::InvalidCredentials)
            }
            Err(e) => {
                tracing::error!(user_id = user_model.id, error = %e, "stored password hash is unreadable");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Re-load the user a credential points at. A vanished user is an
    /// invalid credential, a store failure is not.
    pub async fn resolve(&self, user_id: i32) -> Result<user::Model, AuthError> {
        self.users
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)
    }

    /// Same as [`resolve`](Self::resolve) for ids carried as strings in claims.
    pub async fn resolve_str(&self, user_id: &str) -> Result<user::Model, AuthError> {
        let id: i32 = user_id.parse().map_err(|_| AuthError::InvalidCredentials)?;
        self.resolve(id).await
    }
}
