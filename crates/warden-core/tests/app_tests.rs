use warden_core::TestApp;

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let res = app.client.get(&app.url("/health")).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.json()["status"], "ok");
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let app = TestApp::new().await;

    for path in ["/health", "/api/basic-auth/protected"] {
        let res = app.client.get(&app.url(path)).await;
        assert_eq!(res.header("x-frame-options").as_deref(), Some("DENY"));
        assert_eq!(res.header("x-content-type-options").as_deref(), Some("nosniff"));
        assert!(res.header("strict-transport-security").is_some());
        assert!(res.header("content-security-policy").is_some());
        assert!(res.header("referrer-policy").is_some());
        assert!(res.header("permissions-policy").is_some());
        assert!(res.header("x-xss-protection").is_some());
    }
}

#[tokio::test]
async fn test_request_id_is_generated_and_propagated() {
    let app = TestApp::new().await;

    let generated = app.client.get(&app.url("/health")).await;
    assert!(generated.header("x-request-id").is_some());

    let res = app
        .client
        .send(
            app.client
                .request(reqwest::Method::GET, &app.url("/health"))
                .header("x-request-id", "req-123"),
        )
        .await;
    assert_eq!(res.header("x-request-id").as_deref(), Some("req-123"));
}

#[tokio::test]
async fn test_cors_allows_configured_origin_only() {
    let app = TestApp::new().await;
    let preflight = |origin: &'static str| {
        app.client
            .request(reqwest::Method::OPTIONS, &app.url("/api/jwt-auth/login"))
            .header("Origin", origin)
            .header("Access-Control-Request-Method", "POST")
    };

    let allowed = app.client.send(preflight("http://localhost:3000")).await;
    assert_eq!(
        allowed.header("access-control-allow-origin").as_deref(),
        Some("http://localhost:3000")
    );
    assert_eq!(
        allowed.header("access-control-allow-credentials").as_deref(),
        Some("true")
    );

    let denied = app.client.send(preflight("http://evil.example")).await;
    assert!(denied.header("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_openapi_lists_every_route() {
    let app = TestApp::new().await;
    let res = app.client.get(&app.url("/api-docs/openapi.json")).await;
    assert_eq!(res.status, 200);

    let json = res.json();
    let paths = json["paths"].as_object().unwrap();
    for path in [
        "/health",
        "/api/basic-auth/login",
        "/api/basic-auth/protected",
        "/api/token-auth/login",
        "/api/token-auth/protected",
        "/api/jwt-auth/login",
        "/api/jwt-auth/protected",
        "/api/jwt-auth/refresh",
        "/api/jwt-auth/logout",
        "/api/session-auth/login",
        "/api/session-auth/protected",
        "/api/session-auth/logout",
    ] {
        assert!(paths.contains_key(path), "missing {}", path);
    }
    assert!(json["components"]["securitySchemes"]["bearer_auth"].is_object());
}

#[tokio::test]
async fn test_schemes_without_logout_have_no_logout_route() {
    let app = TestApp::new().await;
    for scheme in ["basic-auth", "token-auth"] {
        let res = app
            .client
            .post(&app.url(&format!("/api/{}/logout", scheme)), "")
            .await;
        assert_eq!(res.status, 404);
    }
}

#[tokio::test]
async fn test_serve_stops_on_shutdown_signal() {
    let config = TestApp::config();
    let db = warden_core::db::connect(&config).await.unwrap();
    let app = warden_core::App::from_parts(db, config);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    tx.send(()).unwrap();

    let result = tokio::time::timeout(
        std::time::Duration::from_secs(15),
        app.serve(listener, async {
            let _ = rx.await;
        }),
    )
    .await
    .expect("server did not stop");
    assert!(result.is_ok());
}
