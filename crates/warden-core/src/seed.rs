use crate::auth::password::hash_password;
use crate::error::AuthError;
use crate::models::user;
use crate::store::{NewUser, UserStore};

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";

/// Create a user unless one with that username exists.
///
/// Returns the user and whether it was created by this call.
pub async fn ensure_user(
    users: &dyn UserStore,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> Result<(user::Model, bool), AuthError> {
    if let Some(existing) = users.find_user_by_username(username).await? {
        return Ok((existing, false));
    }

    let created = users
        .insert_user(NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: hash_password(password)?,
            role: role.to_string(),
        })
        .await?;
    tracing::info!(user_id = created.id, username, "user created");
    Ok((created, true))
}

/// Seed the default `admin` account.
pub async fn seed_admin(users: &dyn UserStore) -> Result<(user::Model, bool), AuthError> {
    ensure_user(
        users,
        DEFAULT_ADMIN_USERNAME,
        DEFAULT_ADMIN_EMAIL,
        DEFAULT_ADMIN_PASSWORD,
        "admin",
    )
    .await
}
