use chrono::Utc;
use warden_core::auth::TokenUse;
use warden_core::TestApp;

struct Issued {
    access_token: String,
    refresh_token: String,
}

async fn login(app: &TestApp, username: &str, password: &str) -> Issued {
    let res = app
        .client
        .post(
            &app.url("/api/jwt-auth/login"),
            &TestApp::credentials(username, password),
        )
        .await;
    assert_eq!(res.status, 200, "login failed: {}", res.body);
    Issued {
        access_token: res.json()["access_token"].as_str().unwrap().to_string(),
        refresh_token: res.cookie("refresh_token").expect("refresh cookie"),
    }
}

async fn refresh(app: &TestApp, refresh_token: &str) -> warden_core::TestResponse {
    app.client
        .post_with_cookie(&app.url("/api/jwt-auth/refresh"), "refresh_token", refresh_token)
        .await
}

#[tokio::test]
async fn test_jwt_login_sets_refresh_cookie() {
    let app = TestApp::new().await;
    app.seed_user("carol", "s3cret").await;

    let res = app
        .client
        .post(
            &app.url("/api/jwt-auth/login"),
            &TestApp::credentials("carol", "s3cret"),
        )
        .await;

    assert_eq!(res.status, 200);
    let json = res.json();
    assert_eq!(json["token_type"], "Bearer");
    assert_eq!(json["expires_in"], 900);
    assert!(json["access_token"].is_string());

    let cookie = res.set_cookie("refresh_token").unwrap();
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=604800"));
}

#[tokio::test]
async fn test_jwt_protected_requires_bearer_access_token() {
    let app = TestApp::new().await;
    app.seed_user("carol", "s3cret").await;
    let issued = login(&app, "carol", "s3cret").await;
    let url = app.url("/api/jwt-auth/protected");

    let ok = app.client.get_with_auth(&url, &issued.access_token).await;
    assert_eq!(ok.status, 200);
    assert_eq!(ok.json()["user"]["username"], "carol");

    let missing = app.client.get(&url).await;
    assert_eq!(missing.status, 401);

    let refresh_as_access = app.client.get_with_auth(&url, &issued.refresh_token).await;
    assert_eq!(refresh_as_access.status, 401);

    let wrong_scheme = app
        .client
        .send(
            app.client
                .request(reqwest::Method::GET, &url)
                .header("Authorization", format!("Token {}", issued.access_token)),
        )
        .await;
    assert_eq!(wrong_scheme.status, 401);
}

#[tokio::test]
async fn test_expired_access_token_is_rejected() {
    let app = TestApp::new().await;
    let user = app.seed_user("carol", "s3cret").await;
    let signer = &app.state.signed;

    let now = Utc::now().timestamp();
    let mut claims = signer.claims_for(&user, TokenUse::Access, now - 1000);
    claims.exp = now - 1;
    let token = signer.encode_claims(&claims).unwrap();

    let res = app
        .client
        .get_with_auth(&app.url("/api/jwt-auth/protected"), &token)
        .await;
    assert_eq!(res.status, 401);
}

#[tokio::test]
async fn test_refresh_rotates_and_old_token_dies() {
    let app = TestApp::new().await;
    app.seed_user("carol", "s3cret").await;
    let issued = login(&app, "carol", "s3cret").await;

    let first = refresh(&app, &issued.refresh_token).await;
    assert_eq!(first.status, 200, "refresh failed: {}", first.body);
    let new_access = first.json()["access_token"].as_str().unwrap().to_string();
    let new_refresh = first.cookie("refresh_token").unwrap();
    assert_ne!(new_access, issued.access_token);
    assert_ne!(new_refresh, issued.refresh_token);

    let reuse = refresh(&app, &issued.refresh_token).await;
    assert_eq!(reuse.status, 401);

    let second = refresh(&app, &new_refresh).await;
    assert_eq!(second.status, 200);

    let protected = app
        .client
        .get_with_auth(&app.url("/api/jwt-auth/protected"), &new_access)
        .await;
    assert_eq!(protected.status, 200);
}

#[tokio::test]
async fn test_refresh_without_cookie_is_unauthorized() {
    let app = TestApp::new().await;

    let res = app.client.post(&app.url("/api/jwt-auth/refresh"), "").await;
    assert_eq!(res.status, 401);
    assert_eq!(res.error()["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_refresh_rejects_access_token_in_cookie() {
    let app = TestApp::new().await;
    app.seed_user("carol", "s3cret").await;
    let issued = login(&app, "carol", "s3cret").await;

    let res = refresh(&app, &issued.access_token).await;
    assert_eq!(res.status, 401);
}

#[tokio::test]
async fn test_refresh_uses_current_username() {
    let app = TestApp::new().await;
    let user = app.seed_user("carol", "s3cret").await;
    let issued = login(&app, "carol", "s3cret").await;

    use sea_orm::{ActiveModelTrait, Set};
    let mut active: warden_core::models::user::ActiveModel = user.into();
    active.username = Set("caroline".to_string());
    active.update(&app.db).await.unwrap();

    let res = refresh(&app, &issued.refresh_token).await;
    assert_eq!(res.status, 200);
    let token = res.json()["access_token"].as_str().unwrap().to_string();
    let claims = app.state.signed.validate_access(&token).unwrap();
    assert_eq!(claims.username, "caroline");
}

#[tokio::test]
async fn test_concurrent_refresh_admits_exactly_one() {
    let app = TestApp::new().await;
    app.seed_user("carol", "s3cret").await;
    let issued = login(&app, "carol", "s3cret").await;

    let (a, b) = tokio::join!(
        refresh(&app, &issued.refresh_token),
        refresh(&app, &issued.refresh_token)
    );
    let mut statuses = [a.status, b.status];
    statuses.sort();
    assert_eq!(statuses, [200, 401]);
}

#[tokio::test]
async fn test_refresh_throttle_returns_429() {
    let app = TestApp::new().await;

    for _ in 0..5 {
        let res = refresh(&app, "garbage").await;
        assert_eq!(res.status, 401);
    }
    let throttled = refresh(&app, "garbage").await;
    assert_eq!(throttled.status, 429);
    assert_eq!(throttled.error()["code"], "TOO_MANY_REQUESTS");
    let retry_after: u64 = throttled.header("retry-after").unwrap().parse().unwrap();
    assert!(retry_after > 0 && retry_after <= 3600);

    // Banned clients are refused even with a valid token.
    app.seed_user("carol", "s3cret").await;
    let issued = login(&app, "carol", "s3cret").await;
    assert_eq!(refresh(&app, &issued.refresh_token).await.status, 429);
}

#[tokio::test]
async fn test_logout_revokes_access_token_and_clears_cookie() {
    let app = TestApp::new().await;
    app.seed_user("carol", "s3cret").await;
    let issued = login(&app, "carol", "s3cret").await;

    let res = app
        .client
        .post_with_auth(&app.url("/api/jwt-auth/logout"), &issued.access_token)
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(res.cookie("refresh_token").as_deref(), Some(""));
    assert!(res.set_cookie("refresh_token").unwrap().contains("Max-Age=-1"));

    let protected = app
        .client
        .get_with_auth(&app.url("/api/jwt-auth/protected"), &issued.access_token)
        .await;
    assert_eq!(protected.status, 401);
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let app = TestApp::new().await;
    app.seed_user("carol", "s3cret").await;
    let issued = login(&app, "carol", "s3cret").await;
    let url = app.url("/api/jwt-auth/logout");

    for _ in 0..2 {
        let res = app.client.post_with_auth(&url, &issued.access_token).await;
        assert_eq!(res.status, 200);
    }
    assert_eq!(app.client.post(&url, "").await.status, 200);
    assert_eq!(app.client.post_with_auth(&url, "not-a-jwt").await.status, 200);
}

#[tokio::test]
async fn test_end_to_end_flow() {
    let app = TestApp::new().await;
    app.seed_user("carol", "s3cret").await;

    let issued = login(&app, "carol", "s3cret").await;

    let protected = app
        .client
        .get_with_auth(&app.url("/api/jwt-auth/protected"), &issued.access_token)
        .await;
    assert_eq!(protected.status, 200);
    assert_eq!(protected.json()["user"]["username"], "carol");

    let refreshed = refresh(&app, &issued.refresh_token).await;
    assert_eq!(refreshed.status, 200);
    assert!(refreshed.json()["access_token"].is_string());

    let replay = refresh(&app, &issued.refresh_token).await;
    assert_eq!(replay.status, 401);
}

#[tokio::test]
async fn test_sweep_drops_expired_revocations() {
    let app = TestApp::new().await;
    let revocations = app.state.signed.revocations();

    revocations.revoke("old", Utc::now() - chrono::TimeDelta::seconds(1));
    revocations.revoke("live", Utc::now() + chrono::TimeDelta::minutes(15));

    warden_core::app::sweep(&app.state).await;
    assert_eq!(revocations.len(), 1);
    assert!(revocations.is_revoked("live"));
}
