use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

const DEV_JWT_SECRET: &str = "warden-dev-secret-change-me";

/// Ceiling for every lifetime, window and ban: ten years.
pub const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Required environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database connection URL (e.g. sqlite://warden.db?mode=rwc, postgres://...)
    pub database_url: String,

    /// HMAC secret for signed tokens
    pub jwt_secret: String,

    /// Server host (default: 127.0.0.1)
    pub server_host: String,

    /// Server port (default: 8080)
    pub server_port: u16,

    /// Environment: development, production, test
    pub environment: String,

    /// Origins allowed by CORS. Credentials are allowed for these only.
    pub allowed_origins: Vec<String>,

    /// Peers whose `X-Forwarded-For` / `X-Real-IP` headers are believed.
    /// Empty means the socket peer address is always the client IP.
    pub trusted_proxies: Vec<IpAddr>,

    /// Upper bound on a single store call, in seconds (default: 10)
    pub store_timeout_secs: u64,

    /// How often in-memory tables are swept, in seconds (default: 300)
    pub sweep_interval_secs: u64,

    pub security: SecurityConfig,
}

/// Lifetimes, caps and limits for every credential scheme.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// `iss` claim stamped into and required from signed tokens
    pub jwt_issuer: String,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,

    /// Refresh attempts allowed per client inside one window
    pub refresh_max_attempts: u32,
    pub refresh_window_secs: u64,
    pub refresh_ban_secs: u64,

    /// Absolute session lifetime
    pub session_ttl_secs: u64,
    pub session_idle_timeout_secs: u64,
    pub max_sessions: u32,

    pub opaque_token_ttl_secs: u64,

    /// Sliding-window limit applied to every login route, per client IP
    pub login_rate_limit: u32,
    pub login_rate_window_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        SecurityConfig {
            jwt_issuer: "auth-service".to_string(),
            access_token_ttl_secs: 15 * 60,
            refresh_token_ttl_secs: 7 * 24 * 60 * 60,
            refresh_max_attempts: 5,
            refresh_window_secs: 15 * 60,
            refresh_ban_secs: 60 * 60,
            session_ttl_secs: 24 * 60 * 60,
            session_idle_timeout_secs: 30 * 60,
            max_sessions: 5,
            opaque_token_ttl_secs: 24 * 60 * 60,
            login_rate_limit: 100,
            login_rate_window_secs: 60,
        }
    }
}

impl SecurityConfig {
    pub fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_ttl_secs)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_token_ttl_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }

    pub fn opaque_token_ttl(&self) -> Duration {
        Duration::from_secs(self.opaque_token_ttl_secs)
    }
}

impl Config {
    /// Load configuration from environment variables (with .env support).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if missing)
        let _ = dotenvy::dotenv();

        let environment =
            std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let jwt_secret = match std::env::var("JWT_SECRET_KEY") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if environment == "development" || environment == "test" => {
                tracing::warn!("JWT_SECRET_KEY not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
            _ => return Err(ConfigError::MissingVar("JWT_SECRET_KEY")),
        };

        let defaults = SecurityConfig::default();
        let security = SecurityConfig {
            jwt_issuer: std::env::var("JWT_ISSUER").unwrap_or(defaults.jwt_issuer),
            access_token_ttl_secs: env_or("ACCESS_TOKEN_TTL_SECS", defaults.access_token_ttl_secs),
            refresh_token_ttl_secs: env_or(
                "REFRESH_TOKEN_TTL_SECS",
                defaults.refresh_token_ttl_secs,
            ),
            refresh_max_attempts: env_or("REFRESH_MAX_ATTEMPTS", defaults.refresh_max_attempts),
            refresh_window_secs: env_or("REFRESH_WINDOW_SECS", defaults.refresh_window_secs),
            refresh_ban_secs: env_or("REFRESH_BAN_SECS", defaults.refresh_ban_secs),
            session_ttl_secs: env_or("SESSION_TTL_SECS", defaults.session_ttl_secs),
            session_idle_timeout_secs: env_or(
                "SESSION_IDLE_TIMEOUT_SECS",
                defaults.session_idle_timeout_secs,
            ),
            max_sessions: env_or("MAX_SESSIONS", defaults.max_sessions),
            opaque_token_ttl_secs: env_or("OPAQUE_TOKEN_TTL_SECS", defaults.opaque_token_ttl_secs),
            login_rate_limit: env_or("LOGIN_RATE_LIMIT", defaults.login_rate_limit),
            login_rate_window_secs: env_or(
                "LOGIN_RATE_WINDOW_SECS",
                defaults.login_rate_window_secs,
            ),
        };

        let allowed_origins = match std::env::var("ALLOWED_ORIGINS") {
            Ok(origins) if !origins.trim().is_empty() => origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            _ => vec!["http://localhost:3000".to_string()],
        };

        let trusted_proxies = match std::env::var("TRUSTED_PROXIES") {
            Ok(raw) => parse_ip_list(&raw)?,
            Err(_) => Vec::new(),
        };

        let config = Config {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://warden.db?mode=rwc".to_string()),
            jwt_secret,
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env_or("PORT", 8080),
            environment,
            allowed_origins,
            trusted_proxies,
            store_timeout_secs: env_or("STORE_TIMEOUT_SECS", 10),
            sweep_interval_secs: env_or("SWEEP_INTERVAL_SECS", 300),
            security,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check invariants the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.is_empty() {
            return Err(ConfigError::MissingVar("DATABASE_URL"));
        }
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingVar("JWT_SECRET_KEY"));
        }
        if self.is_production() && self.jwt_secret == DEV_JWT_SECRET {
            return Err(ConfigError::Invalid(
                "the development JWT secret cannot be used in production".to_string(),
            ));
        }

        let s = &self.security;
        if s.access_token_ttl_secs == 0 || s.access_token_ttl_secs >= s.refresh_token_ttl_secs {
            return Err(ConfigError::Invalid(
                "access token lifetime must be non-zero and shorter than refresh token lifetime"
                    .to_string(),
            ));
        }
        if s.max_sessions == 0 {
            return Err(ConfigError::Invalid("MAX_SESSIONS must be at least 1".to_string()));
        }
        if s.session_idle_timeout_secs == 0 || s.session_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "session lifetimes must be non-zero".to_string(),
            ));
        }
        if s.login_rate_limit == 0 || s.refresh_max_attempts == 0 {
            return Err(ConfigError::Invalid("rate limits must be at least 1".to_string()));
        }

        let durations = [
            ("ACCESS_TOKEN_TTL_SECS", s.access_token_ttl_secs),
            ("REFRESH_TOKEN_TTL_SECS", s.refresh_token_ttl_secs),
            ("REFRESH_WINDOW_SECS", s.refresh_window_secs),
            ("REFRESH_BAN_SECS", s.refresh_ban_secs),
            ("SESSION_TTL_SECS", s.session_ttl_secs),
            ("SESSION_IDLE_TIMEOUT_SECS", s.session_idle_timeout_secs),
            ("OPAQUE_TOKEN_TTL_SECS", s.opaque_token_ttl_secs),
            ("LOGIN_RATE_WINDOW_SECS", s.login_rate_window_secs),
            ("STORE_TIMEOUT_SECS", self.store_timeout_secs),
            ("SWEEP_INTERVAL_SECS", self.sweep_interval_secs),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, v)| *v > MAX_DURATION_SECS) {
            return Err(ConfigError::Invalid(format!(
                "{} exceeds {} seconds",
                name, MAX_DURATION_SECS
            )));
        }
        Ok(())
    }

    /// Check if running in development mode.
    pub fn is_dev(&self) -> bool {
        self.environment == "development"
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Get the full server address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn parse_ip_list(raw: &str) -> Result<Vec<IpAddr>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry.parse().map_err(|_| {
                ConfigError::Invalid(format!("TRUSTED_PROXIES entry {:?} is not an IP", entry))
            })
        })
        .collect()
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "unparsable value, using default");
            default
        }),
        Err(_) => default,
    }
}
