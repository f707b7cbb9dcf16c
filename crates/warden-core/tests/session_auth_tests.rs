use chrono::{TimeDelta, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use warden_core::extractors::ClientInfo;
use warden_core::models::session;
use warden_core::store::SessionStore;
use warden_core::{TestApp, TestResponse};

const UA: &str = "A";
const IP: &str = "1.2.3.4";

async fn login_as(app: &TestApp, ua: &str, ip: &str) -> TestResponse {
    app.client
        .send(
            app.client
                .request(reqwest::Method::POST, &app.url("/api/session-auth/login"))
                .header("Content-Type", "application/json")
                .header("User-Agent", ua)
                .header("X-Forwarded-For", ip)
                .body(TestApp::credentials("dave", "hunter2")),
        )
        .await
}

async fn login(app: &TestApp) -> String {
    let res = login_as(app, UA, IP).await;
    assert_eq!(res.status, 200, "login failed: {}", res.body);
    res.cookie("session_id").expect("session cookie")
}

async fn protected_as(app: &TestApp, id: &str, ua: &str, ip: &str) -> TestResponse {
    app.client
        .send(
            app.client
                .request(reqwest::Method::GET, &app.url("/api/session-auth/protected"))
                .header("Cookie", format!("session_id={}", id))
                .header("User-Agent", ua)
                .header("X-Forwarded-For", ip),
        )
        .await
}

async fn valid_sessions(app: &TestApp, user_id: i32) -> Vec<session::Model> {
    session::Entity::find()
        .filter(session::Column::UserId.eq(user_id))
        .filter(session::Column::IsValid.eq(true))
        .order_by_asc(session::Column::CreatedAt)
        .all(&app.db)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_session_login_sets_cookie_and_records_fingerprint() {
    let app = TestApp::new().await;
    let user = app.seed_user("dave", "hunter2").await;

    let res = login_as(&app, UA, IP).await;
    assert_eq!(res.status, 200);
    let json = res.json();
    assert_eq!(json["message"], "Login successful");
    assert_eq!(json["user"]["username"], "dave");

    let cookie = res.set_cookie("session_id").unwrap();
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Max-Age=86400"));

    let id = res.cookie("session_id").unwrap();
    let record = app.store().find_session(&id).await.unwrap().unwrap();
    assert_eq!(record.user_id, user.id);
    assert_eq!(record.user_agent, UA);
    assert_eq!(record.ip_address, IP);
    assert!(record.is_valid);
    assert_eq!(record.expires_at - record.created_at, TimeDelta::hours(24));
}

#[tokio::test]
async fn test_session_protected_returns_session_details() {
    let app = TestApp::new().await;
    app.seed_user("dave", "hunter2").await;
    let id = login(&app).await;

    let res = protected_as(&app, &id, UA, IP).await;
    assert_eq!(res.status, 200);
    let json = res.json();
    assert_eq!(json["message"], "Access granted");
    assert_eq!(json["user"]["username"], "dave");
    assert_eq!(json["session"]["ip_address"], IP);
}

#[tokio::test]
async fn test_sixth_login_evicts_the_oldest_session() {
    let app = TestApp::new().await;
    let user = app.seed_user("dave", "hunter2").await;

    let mut ids = Vec::new();
    for _ in 0..6 {
        ids.push(login(&app).await);
    }

    let valid = valid_sessions(&app, user.id).await;
    assert_eq!(valid.len(), 5);
    assert!(valid.iter().all(|s| s.id != ids[0]));

    let oldest = app.store().find_session(&ids[0]).await.unwrap().unwrap();
    assert!(!oldest.is_valid);
    assert_eq!(protected_as(&app, &ids[0], UA, IP).await.status, 401);
    assert_eq!(protected_as(&app, &ids[5], UA, IP).await.status, 200);
}

#[tokio::test]
async fn test_concurrent_logins_respect_the_cap() {
    let app = TestApp::new().await;
    let user = app.seed_user("dave", "hunter2").await;
    let url = app.url("/api/session-auth/login");

    let mut handles = Vec::new();
    for _ in 0..10 {
        let client = app.client.clone();
        let url = url.clone();
        handles.push(tokio::spawn(async move {
            client
                .post(&url, &TestApp::credentials("dave", "hunter2"))
                .await
                .status
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), 200);
    }

    assert_eq!(valid_sessions(&app, user.id).await.len(), 5);
}

#[tokio::test]
async fn test_hijack_invalidates_session() {
    let app = TestApp::new().await;
    app.seed_user("dave", "hunter2").await;
    let id = login(&app).await;

    assert_eq!(protected_as(&app, &id, UA, IP).await.status, 200);

    let hijack = protected_as(&app, &id, "B", IP).await;
    assert_eq!(hijack.status, 401);
    assert_eq!(hijack.cookie("session_id").as_deref(), Some(""));

    let retry = protected_as(&app, &id, UA, IP).await;
    assert_eq!(retry.status, 401);

    let record = app.store().find_session(&id).await.unwrap().unwrap();
    assert!(!record.is_valid);
}

#[tokio::test]
async fn test_ip_change_is_a_hijack_too() {
    let app = TestApp::new().await;
    app.seed_user("dave", "hunter2").await;
    let id = login(&app).await;

    assert_eq!(protected_as(&app, &id, UA, "5.6.7.8").await.status, 401);
    assert_eq!(protected_as(&app, &id, UA, IP).await.status, 401);
}

#[tokio::test]
async fn test_idle_session_is_invalidated() {
    let app = TestApp::new().await;
    app.seed_user("dave", "hunter2").await;
    let id = login(&app).await;
    let idle = TimeDelta::seconds(app.config.security.session_idle_timeout_secs as i64);

    let stale = Utc::now().naive_utc() - idle - TimeDelta::seconds(1);
    app.store().touch_session(&id, stale).await.unwrap();

    let res = protected_as(&app, &id, UA, IP).await;
    assert_eq!(res.status, 401);
    assert_eq!(res.cookie("session_id").as_deref(), Some(""));
    assert!(!app.store().find_session(&id).await.unwrap().unwrap().is_valid);
}

#[tokio::test]
async fn test_activity_inside_idle_window_slides_it() {
    let app = TestApp::new().await;
    app.seed_user("dave", "hunter2").await;
    let id = login(&app).await;
    let idle = TimeDelta::seconds(app.config.security.session_idle_timeout_secs as i64);

    let recent = Utc::now().naive_utc() - idle + TimeDelta::seconds(1);
    app.store().touch_session(&id, recent).await.unwrap();

    let res = protected_as(&app, &id, UA, IP).await;
    assert_eq!(res.status, 200);
    let record = app.store().find_session(&id).await.unwrap().unwrap();
    assert!(record.last_activity > recent);
}

#[tokio::test]
async fn test_idle_boundary_with_explicit_clock() {
    let app = TestApp::new().await;
    app.seed_user("dave", "hunter2").await;
    let id = login(&app).await;
    let client = ClientInfo::new(IP, UA);
    let idle = TimeDelta::seconds(app.config.security.session_idle_timeout_secs as i64);

    let record = app.store().find_session(&id).await.unwrap().unwrap();
    let at_limit = record.last_activity + idle;
    assert!(app.state.sessions.validate(&id, &client, at_limit).await.is_ok());

    let record = app.store().find_session(&id).await.unwrap().unwrap();
    let past_limit = record.last_activity + idle + TimeDelta::seconds(1);
    assert!(app.state.sessions.validate(&id, &client, past_limit).await.is_err());
}

#[tokio::test]
async fn test_unknown_or_missing_session_cookie() {
    let app = TestApp::new().await;

    let unknown = protected_as(&app, "does-not-exist", UA, IP).await;
    assert_eq!(unknown.status, 401);
    assert_eq!(unknown.cookie("session_id").as_deref(), Some(""));

    let missing = app.client.get(&app.url("/api/session-auth/protected")).await;
    assert_eq!(missing.status, 401);
}

#[tokio::test]
async fn test_logout_invalidates_and_is_idempotent() {
    let app = TestApp::new().await;
    app.seed_user("dave", "hunter2").await;
    let id = login(&app).await;
    let url = app.url("/api/session-auth/logout");

    for _ in 0..2 {
        let res = app.client.post_with_cookie(&url, "session_id", &id).await;
        assert_eq!(res.status, 200);
        assert!(res.set_cookie("session_id").unwrap().contains("Max-Age=-1"));
    }
    assert_eq!(app.client.post(&url, "").await.status, 200);

    assert_eq!(protected_as(&app, &id, UA, IP).await.status, 401);
}

#[tokio::test]
async fn test_revoke_all_sessions() {
    let app = TestApp::new().await;
    let user = app.seed_user("dave", "hunter2").await;
    for _ in 0..3 {
        login(&app).await;
    }

    let revoked = app.state.sessions.revoke_all(user.id).await.unwrap();
    assert_eq!(revoked, 3);
    assert!(valid_sessions(&app, user.id).await.is_empty());
}
