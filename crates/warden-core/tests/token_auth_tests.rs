use chrono::{TimeDelta, Utc};
use warden_core::store::{NewOpaqueToken, TokenStore};
use warden_core::TestApp;

async fn login(app: &TestApp, username: &str, password: &str) -> String {
    let res = app
        .client
        .post(
            &app.url("/api/token-auth/login"),
            &TestApp::credentials(username, password),
        )
        .await;
    assert_eq!(res.status, 200, "login failed: {}", res.body);
    res.json()["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_token_login_response_shape() {
    let app = TestApp::new().await;
    app.seed_user("bob", "builder").await;

    let res = app
        .client
        .post(
            &app.url("/api/token-auth/login"),
            &TestApp::credentials("bob", "builder"),
        )
        .await;

    assert_eq!(res.status, 200);
    let json = res.json();
    assert_eq!(json["token_type"], "Bearer");
    assert_eq!(json["expires_in"], 86400);
    assert_eq!(json["token"].as_str().unwrap().len(), 43);
}

#[tokio::test]
async fn test_token_protected_accepts_issued_token() {
    let app = TestApp::new().await;
    app.seed_user("bob", "builder").await;
    let token = login(&app, "bob", "builder").await;

    let res = app
        .client
        .get_with_auth(&app.url("/api/token-auth/protected"), &token)
        .await;

    assert_eq!(res.status, 200);
    assert_eq!(res.json()["user"]["username"], "bob");
}

#[tokio::test]
async fn test_each_login_issues_a_distinct_token() {
    let app = TestApp::new().await;
    app.seed_user("bob", "builder").await;

    let a = login(&app, "bob", "builder").await;
    let b = login(&app, "bob", "builder").await;
    assert_ne!(a, b);
}

#[tokio::test]
async fn test_unknown_and_expired_tokens_are_rejected() {
    let app = TestApp::new().await;
    let user = app.seed_user("bob", "builder").await;
    let url = app.url("/api/token-auth/protected");

    let unknown = app.client.get_with_auth(&url, "made-up-token").await;
    assert_eq!(unknown.status, 401);

    let now = Utc::now().naive_utc();
    app.store()
        .insert_token(NewOpaqueToken {
            value: "expired-token".to_string(),
            user_id: user.id,
            created_at: now - TimeDelta::hours(25),
            expires_at: now - TimeDelta::hours(1),
        })
        .await
        .unwrap();

    let expired = app.client.get_with_auth(&url, "expired-token").await;
    assert_eq!(expired.status, 401);
}

#[tokio::test]
async fn test_sweep_purges_expired_tokens() {
    let app = TestApp::new().await;
    let user = app.seed_user("bob", "builder").await;
    let live = login(&app, "bob", "builder").await;

    let now = Utc::now().naive_utc();
    app.store()
        .insert_token(NewOpaqueToken {
            value: "stale".to_string(),
            user_id: user.id,
            created_at: now - TimeDelta::days(2),
            expires_at: now - TimeDelta::days(1),
        })
        .await
        .unwrap();

    warden_core::app::sweep(&app.state).await;

    assert!(!app.store().token_exists("stale").await.unwrap());
    assert!(app.store().token_exists(&live).await.unwrap());
}
