use axum_extra::extract::cookie::{Cookie, SameSite};

/// Cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Cookie carrying the session id.
pub const SESSION_COOKIE: &str = "session_id";

/// Secure, HttpOnly, SameSite=Strict cookie scoped to `/`.
pub fn credential_cookie(name: &'static str, value: String, max_age_secs: u64) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .secure(true)
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::seconds(max_age_secs as i64))
        .build()
}

/// Empty cookie with `Max-Age=-1`, telling the client to drop `name`.
pub fn cleared_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .secure(true)
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::seconds(-1))
        .build()
}
