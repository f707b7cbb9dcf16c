//! Multi-scheme authentication and session lifecycle engine.
//!
//! Four credential schemes share one [`auth::AuthScheme`] seam: HTTP Basic,
//! opaque bearer tokens, signed access/refresh pairs and server-side
//! sessions. [`App`] wires them over a SeaORM store and serves them with
//! axum.

pub mod app;
pub mod auth;
pub mod config;
pub mod controllers;
pub mod db;
pub mod error;
pub mod extractors;
pub mod logging;
pub mod migrations;
pub mod models;
pub mod openapi;
pub mod seed;
pub mod store;
pub mod testing;

pub use app::App;
pub use config::{Config, ConfigError, SecurityConfig};
pub use error::AuthError;
pub use store::{SeaStore, StoreError};
pub use testing::{TestApp, TestClient, TestResponse};
