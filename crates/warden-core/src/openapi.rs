use utoipa::OpenApi;

use crate::auth::jwt::AccessTokenResponse;
use crate::auth::opaque::OpaqueTokenResponse;
use crate::auth::session::SessionLoginResponse;
use crate::auth::LoginRequest;
use crate::controllers::auth::{MessageResponse, ProtectedResponse, SessionInfo};
use crate::controllers::health::HealthResponse;
use crate::error::{ErrorBody, ErrorDetail};
use crate::models::user::UserResponse;

/// OpenAPI documentation for every scheme's routes.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Warden API",
        description = "Basic, opaque-token, signed-token and session authentication."
    ),
    paths(
        crate::controllers::health::health,
        paths::basic_login,
        paths::basic_protected,
        paths::token_login,
        paths::token_protected,
        paths::jwt_login,
        paths::jwt_protected,
        paths::jwt_refresh,
        paths::jwt_logout,
        paths::session_login,
        paths::session_protected,
        paths::session_logout,
    ),
    components(
        schemas(
            LoginRequest,
            UserResponse,
            AccessTokenResponse,
            OpaqueTokenResponse,
            SessionLoginResponse,
            ProtectedResponse,
            SessionInfo,
            MessageResponse,
            HealthResponse,
            ErrorBody,
            ErrorDetail,
        )
    ),
    tags(
        (name = "basic-auth", description = "HTTP Basic credentials on every request"),
        (name = "token-auth", description = "Opaque bearer tokens"),
        (name = "jwt-auth", description = "Signed access tokens with rotating refresh cookies"),
        (name = "session-auth", description = "Server-side sessions"),
        (name = "health", description = "Liveness")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Register the security schemes the protected routes refer to.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{ApiKey, ApiKeyValue, Http, HttpAuthScheme, SecurityScheme};

        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "basic_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Basic)),
            );
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
            components.add_security_scheme(
                "session_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("session_id"))),
            );
            components.add_security_scheme(
                "refresh_cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("refresh_token"))),
            );
        }
    }
}

/// Route descriptions. The handlers themselves are generic over the scheme,
/// so each concrete route is documented here.
#[allow(dead_code)]
mod paths {
    use super::*;

    #[utoipa::path(
        post, path = "/api/basic-auth/login", request_body = LoginRequest,
        responses(
            (status = 200, description = "Credentials accepted", body = UserResponse),
            (status = 400, description = "Malformed body", body = ErrorBody),
            (status = 401, description = "Invalid credentials", body = ErrorBody),
            (status = 429, description = "Too many attempts", body = ErrorBody)
        ),
        tag = "basic-auth"
    )]
    pub fn basic_login() {}

    #[utoipa::path(
        get, path = "/api/basic-auth/protected",
        responses(
            (status = 200, description = "Access granted", body = ProtectedResponse),
            (status = 401, description = "Invalid credentials", body = ErrorBody)
        ),
        tag = "basic-auth",
        security(("basic_auth" = []))
    )]
    pub fn basic_protected() {}

    #[utoipa::path(
        post, path = "/api/token-auth/login", request_body = LoginRequest,
        responses(
            (status = 200, description = "Token issued", body = OpaqueTokenResponse),
            (status = 400, description = "Malformed body", body = ErrorBody),
            (status = 401, description = "Invalid credentials", body = ErrorBody),
            (status = 429, description = "Too many attempts", body = ErrorBody)
        ),
        tag = "token-auth"
    )]
    pub fn token_login() {}

    #[utoipa::path(
        get, path = "/api/token-auth/protected",
        responses(
            (status = 200, description = "Access granted", body = ProtectedResponse),
            (status = 401, description = "Invalid credentials", body = ErrorBody)
        ),
        tag = "token-auth",
        security(("bearer_auth" = []))
    )]
    pub fn token_protected() {}

    #[utoipa::path(
        post, path = "/api/jwt-auth/login", request_body = LoginRequest,
        responses(
            (status = 200, description = "Access token issued, refresh cookie set", body = AccessTokenResponse),
            (status = 400, description = "Malformed body", body = ErrorBody),
            (status = 401, description = "Invalid credentials", body = ErrorBody),
            (status = 429, description = "Too many attempts", body = ErrorBody)
        ),
        tag = "jwt-auth"
    )]
    pub fn jwt_login() {}

    #[utoipa::path(
        get, path = "/api/jwt-auth/protected",
        responses(
            (status = 200, description = "Access granted", body = ProtectedResponse),
            (status = 401, description = "Invalid credentials", body = ErrorBody)
        ),
        tag = "jwt-auth",
        security(("bearer_auth" = []))
    )]
    pub fn jwt_protected() {}

    #[utoipa::path(
        post, path = "/api/jwt-auth/refresh",
        responses(
            (status = 200, description = "Pair rotated, new refresh cookie set", body = AccessTokenResponse),
            (status = 401, description = "Invalid credentials", body = ErrorBody),
            (status = 429, description = "Refresh throttled", body = ErrorBody)
        ),
        tag = "jwt-auth",
        security(("refresh_cookie" = []))
    )]
    pub fn jwt_refresh() {}

    #[utoipa::path(
        post, path = "/api/jwt-auth/logout",
        responses(
            (status = 200, description = "Logged out", body = MessageResponse)
        ),
        tag = "jwt-auth",
        security(("bearer_auth" = []))
    )]
    pub fn jwt_logout() {}

    #[utoipa::path(
        post, path = "/api/session-auth/login", request_body = LoginRequest,
        responses(
            (status = 200, description = "Session created, cookie set", body = SessionLoginResponse),
            (status = 400, description = "Malformed body", body = ErrorBody),
            (status = 401, description = "Invalid credentials", body = ErrorBody),
            (status = 429, description = "Too many attempts", body = ErrorBody)
        ),
        tag = "session-auth"
    )]
    pub fn session_login() {}

    #[utoipa::path(
        get, path = "/api/session-auth/protected",
        responses(
            (status = 200, description = "Access granted", body = ProtectedResponse),
            (status = 401, description = "Invalid or expired session", body = ErrorBody)
        ),
        tag = "session-auth",
        security(("session_cookie" = []))
    )]
    pub fn session_protected() {}

    #[utoipa::path(
        post, path = "/api/session-auth/logout",
        responses(
            (status = 200, description = "Logged out", body = MessageResponse)
        ),
        tag = "session-auth",
        security(("session_cookie" = []))
    )]
    pub fn session_logout() {}
}
