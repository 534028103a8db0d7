pub mod auth;
pub mod invitation;
pub mod password;

use axum::extract::ConnectInfo;
use axum::http::HeaderMap;
use std::net::SocketAddr;

use crate::models::ClientMeta;

/// Client metadata for audit entries. Proxy headers win over the socket
/// peer address.
pub(crate) fn client_meta(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
) -> ClientMeta {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
        })
        .or_else(|| connect_info.map(|ci| ci.0.ip().to_string()));

    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    ClientMeta {
        ip_address,
        user_agent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::USER_AGENT;

    #[test]
    fn test_client_meta_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        headers.insert(USER_AGENT, "test-agent".parse().unwrap());

        let connect_info = ConnectInfo("192.0.2.1:443".parse().unwrap());
        let meta = client_meta(&headers, Some(&connect_info));

        assert_eq!(meta.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(meta.user_agent.as_deref(), Some("test-agent"));
    }

    #[test]
    fn test_client_meta_falls_back_to_peer_address() {
        let headers = HeaderMap::new();
        let connect_info = ConnectInfo("192.0.2.1:443".parse().unwrap());
        let meta = client_meta(&headers, Some(&connect_info));

        assert_eq!(meta.ip_address.as_deref(), Some("192.0.2.1"));
        assert!(meta.user_agent.is_none());
    }
}
