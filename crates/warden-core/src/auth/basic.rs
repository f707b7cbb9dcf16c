use async_trait::async_trait;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::CookieJar;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::auth::credentials::CredentialVerifier;
use crate::auth::scheme::{AuthScheme, Identity, LoginRequest, Presented};
use crate::error::AuthError;
use crate::extractors::ClientInfo;
use crate::models::user::{self, UserResponse};

/// `Authorization: Basic` on every request; nothing is issued.
pub struct BasicScheme {
    verifier: CredentialVerifier,
}

impl BasicScheme {
    pub fn new(verifier: CredentialVerifier) -> Self {
        BasicScheme { verifier }
    }
}

/// Decode a Basic payload into `(username, password)`, splitting on the
/// first `:` so passwords may contain colons.
pub fn decode_basic(payload: &str) -> Option<(String, String)> {
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let (username, password) = text.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

#[async_trait]
impl AuthScheme for BasicScheme {
    type Credential = user::Model;

    const VERIFIES_SECRET: bool = true;

    async fn login(
        &self,
        request: &LoginRequest,
        _client: &ClientInfo,
    ) -> Result<user::Model, AuthError> {
        self.verifier
            .verify(&request.username, &request.password)
            .await
    }

    fn login_response(&self, credential: user::Model, jar: CookieJar) -> Response {
        (jar, Json(UserResponse::from(credential))).into_response()
    }

    async fn authenticate(&self, presented: &Presented) -> Result<Identity, AuthError> {
        let (username, password) = presented
            .basic()
            .and_then(decode_basic)
            .ok_or(AuthError::InvalidCredentials)?;
        let user = self.verifier.verify(&username, &password).await?;
        Ok(Identity::user(user))
    }
}
