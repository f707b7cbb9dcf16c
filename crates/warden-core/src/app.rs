use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::get;
use axum::{Extension, Router};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use utoipa::OpenApi;

use crate::config::Config;
use crate::controllers::{self, AppState};
use crate::extractors::TrustedProxies;
use crate::migrations::Migrator;
use crate::openapi::ApiDoc;

/// How long in-flight requests get to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-frame-options", "DENY"),
    ("x-content-type-options", "nosniff"),
    ("x-xss-protection", "1; mode=block"),
    (
        "strict-transport-security",
        "max-age=31536000; includeSubDomains",
    ),
    ("content-security-policy", "default-src 'self'"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    (
        "permissions-policy",
        "geolocation=(), microphone=(), camera=()",
    ),
];

/// The authentication server: configuration, database and wired services.
pub struct App {
    pub config: Config,
    pub db: DatabaseConnection,
    state: AppState,
}

impl App {
    /// Load config from the environment, connect and migrate.
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::from_env()?;
        Self::with_config(config).await
    }

    /// Connect with a given config and run pending migrations.
    pub async fn with_config(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;
        let db = crate::db::connect(&config).await?;

        tracing::info!("Running pending database migrations...");
        Migrator::up(&db, None).await?;
        tracing::info!("Migrations complete.");

        Ok(Self::from_parts(db, config))
    }

    /// Wire services over an already migrated connection.
    pub fn from_parts(db: DatabaseConnection, config: Config) -> Self {
        let state = AppState::new(db.clone(), config.clone());
        App { config, db, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with every scheme's routes and the HTTP layers.
    pub fn router(&self) -> Router {
        let document = ApiDoc::openapi();

        let mut router = Router::new()
            .route("/health", get(controllers::health::health))
            .route(
                "/api-docs/openapi.json",
                get(move || {
                    let document = document.clone();
                    async move { axum::Json(document) }
                }),
            )
            .merge(controllers::auth::routes(&self.state))
            .layer(Extension(TrustedProxies::new(
                self.config.trusted_proxies.clone(),
            )));

        for (name, value) in SECURITY_HEADERS {
            router = router.layer(SetResponseHeaderLayer::overriding(
                HeaderName::from_static(*name),
                HeaderValue::from_static(*value),
            ));
        }

        let x_request_id = HeaderName::from_static("x-request-id");
        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
                        .on_request(DefaultOnRequest::new().level(tracing::Level::DEBUG))
                        .on_response(
                            DefaultOnResponse::new()
                                .level(tracing::Level::INFO)
                                .latency_unit(LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(cors_layer(&self.config)),
        )
    }

    /// Periodically drop expired revocations, idle counters and expired
    /// opaque tokens.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let state = self.state.clone();
        let period = self.config.sweep_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                sweep(&state).await;
            }
        })
    }

    /// Serve until SIGINT/SIGTERM, then drain for up to ten seconds.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = self.config.server_addr();
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an existing listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), Box<dyn std::error::Error>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let local = listener.local_addr()?;
        let router = self.router();
        let sweeper = self.spawn_sweeper();

        tracing::info!(
            addr = %local,
            environment = %self.config.environment,
            "Warden server running on http://{}",
            local
        );

        let stop = Arc::new(Notify::new());
        let graceful = {
            let stop = stop.clone();
            async move { stop.notified().await }
        };
        let mut server = tokio::spawn(
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(graceful)
            .into_future(),
        );

        let early = tokio::select! {
            result = &mut server => Some(result),
            _ = shutdown => None,
        };
        sweeper.abort();

        if let Some(result) = early {
            result??;
            return Ok(());
        }

        tracing::info!("shutdown signal received, draining connections");
        stop.notify_one();
        match tokio::time::timeout(DRAIN_TIMEOUT, &mut server).await {
            Ok(result) => result??,
            Err(_) => {
                tracing::warn!("drain timed out, closing remaining connections");
                server.abort();
            }
        }
        tracing::info!("server stopped");
        Ok(())
    }
}

/// One pass over every in-memory table plus the opaque token purge.
pub async fn sweep(state: &AppState) {
    let revocations = state.signed.revocations().sweep();
    state.signed.throttle().cleanup();
    state.login_limiter.cleanup();
    state.sessions.locks().cleanup();

    let purged = match state.opaque.purge_expired().await {
        Ok(count) => count,
        Err(e) => {
            tracing::error!(error = %e, "failed to purge expired opaque tokens");
            0
        }
    };
    tracing::debug!(revocations, purged, "sweep complete");
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(12 * 60 * 60))
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
