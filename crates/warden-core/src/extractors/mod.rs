pub mod client_info;
pub mod json;

pub use client_info::{ClientInfo, TrustedProxies};
pub use json::Json;
