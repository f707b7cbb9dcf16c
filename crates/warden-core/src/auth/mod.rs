pub mod basic;
pub mod cookies;
pub mod credentials;
pub mod jwt;
pub mod locks;
pub mod middleware;
pub mod opaque;
pub mod password;
pub mod random;
pub mod rate_limit;
pub mod revocation;
pub mod scheme;
pub mod session;
pub mod throttle;

#[cfg(test)]
mod testing_support;

pub use basic::BasicScheme;
pub use credentials::CredentialVerifier;
pub use jwt::{Claims, SignedTokenService, TokenPair, TokenUse};
pub use opaque::OpaqueTokenService;
pub use password::{hash_password, verify_password};
pub use rate_limit::RateLimiter;
pub use revocation::RevocationList;
pub use scheme::{AuthScheme, Identity, LoginRequest, Presented};
pub use session::SessionService;
pub use throttle::RefreshThrottle;
