pub mod opaque_token;
pub mod session;
pub mod user;
