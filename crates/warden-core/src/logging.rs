//! Tracing subscriber setup.
//!
//! Audit events (hijack detection, idle eviction, cap eviction, refresh
//! rotation) are plain `tracing` events with structured fields, so the
//! chosen [`LogFormat`] decides whether they land as text or JSON lines.
//!
//! ```bash
//! RUST_LOG=warden_core=debug,tower_http=debug,sqlx=warn warden serve
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Plain,
    Pretty,
    Json,
}

/// Install the global subscriber. `fallback` is the filter used when
/// `RUST_LOG` is unset or unparsable.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init(format: LogFormat, fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Plain => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_line_number(true)
                    .with_target(true),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false),
            )
            .init(),
    }
}
