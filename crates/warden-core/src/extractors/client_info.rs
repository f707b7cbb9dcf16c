use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::http::HeaderMap;

/// Peers allowed to report the client address through forwarding headers.
///
/// Installed as a request extension by the app router. Without it no
/// forwarding header is believed.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies(Arc<Vec<IpAddr>>);

impl TrustedProxies {
    pub fn new(proxies: Vec<IpAddr>) -> Self {
        TrustedProxies(Arc::new(proxies))
    }

    pub fn trusts(&self, peer: IpAddr) -> bool {
        self.0.contains(&peer)
    }
}

/// Client fingerprint used for rate-limit keys and session binding.
///
/// Usage in handlers:
/// ```rust,ignore
/// async fn my_handler(client: ClientInfo) -> impl IntoResponse {
///     tracing::info!(ip = %client.ip, "request");
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
}

impl ClientInfo {
    pub fn new(ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        ClientInfo {
            ip: ip.into(),
            user_agent: user_agent.into(),
        }
    }

    /// Resolve the client IP. When the socket peer is a trusted proxy, the
    /// first `X-Forwarded-For` hop wins, then `X-Real-IP`; otherwise the
    /// peer address is used as is.
    pub fn from_headers(
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
        trusted: &TrustedProxies,
    ) -> Self {
        let via_proxy = peer.is_some_and(|addr| trusted.trusts(addr.ip()));
        let forwarded = via_proxy.then(|| forwarded_ip(headers)).flatten();

        let ip = forwarded
            .or_else(|| peer.map(|addr| addr.ip().to_string()))
            .unwrap_or_else(|| "unknown".to_string());

        let user_agent = headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        ClientInfo { ip, user_agent }
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    forwarded.or(real_ip).map(str::to_string)
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let trusted = parts
            .extensions
            .get::<TrustedProxies>()
            .cloned()
            .unwrap_or_default();
        Ok(ClientInfo::from_headers(&parts.headers, peer, &trusted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn proxied_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("5.6.7.8"));
        headers.insert(USER_AGENT, HeaderValue::from_static("A"));
        headers
    }

    fn proxy() -> SocketAddr {
        "10.0.0.1:1234".parse().unwrap()
    }

    fn trusting_proxy() -> TrustedProxies {
        TrustedProxies::new(vec![proxy().ip()])
    }

    #[test]
    fn forwarded_for_wins_when_peer_is_trusted() {
        let client = ClientInfo::from_headers(&proxied_headers(), Some(proxy()), &trusting_proxy());
        assert_eq!(client, ClientInfo::new("1.2.3.4", "A"));

        let mut headers = proxied_headers();
        headers.remove("x-forwarded-for");
        let client = ClientInfo::from_headers(&headers, Some(proxy()), &trusting_proxy());
        assert_eq!(client.ip, "5.6.7.8");
    }

    #[test]
    fn forwarding_headers_from_untrusted_peers_are_ignored() {
        let stranger: SocketAddr = "9.9.9.9:1234".parse().unwrap();
        let client = ClientInfo::from_headers(&proxied_headers(), Some(stranger), &trusting_proxy());
        assert_eq!(client.ip, "9.9.9.9");

        let client =
            ClientInfo::from_headers(&proxied_headers(), Some(proxy()), &TrustedProxies::default());
        assert_eq!(client.ip, "10.0.0.1");
    }

    #[test]
    fn falls_back_to_peer_then_unknown() {
        let headers = HeaderMap::new();
        assert_eq!(
            ClientInfo::from_headers(&headers, Some(proxy()), &trusting_proxy()).ip,
            "10.0.0.1"
        );

        let client = ClientInfo::from_headers(&proxied_headers(), None, &trusting_proxy());
        assert_eq!(client.ip, "unknown");

        let client = ClientInfo::from_headers(&headers, None, &TrustedProxies::default());
        assert_eq!(client.user_agent, "");
    }
}
