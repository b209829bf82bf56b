//! Client address extraction.
//!
//! Forwarded headers are only honored when the direct peer is a private or
//! loopback address (i.e. a reverse proxy in front of us). A public peer
//! could forge X-Forwarded-For, so for direct connections the socket
//! address wins.

use std::net::IpAddr;

use actix_web::HttpRequest;
use tracing::debug;

/// Check whether an IP is private or localhost.
pub fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
        IpAddr::V6(v6) => {
            // fc00::/7 (ULA), fe80::/10 (link-local), ::1
            v6.is_loopback()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Extract the forwarded client IP from headers (X-Forwarded-For first
/// entry, then X-Real-IP).
pub fn extract_forwarded_ip_from_headers(
    headers: &actix_web::http::header::HeaderMap,
) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(String::from)
        })
}

/// Extract the real client IP for a request.
///
/// Private/loopback peer: assume a reverse proxy and prefer the forwarded
/// header. Public peer: always the socket address.
pub fn extract_client_ip(req: &HttpRequest) -> Option<String> {
    let conn_info = req.connection_info();
    let peer_ip = conn_info.peer_addr()?;

    if let Ok(ip_addr) = peer_ip.parse::<IpAddr>()
        && is_private_or_local(&ip_addr)
    {
        if let Some(real_ip) = extract_forwarded_ip_from_headers(req.headers()) {
            debug!(
                "Proxy detected (private peer {}): using forwarded IP {}",
                peer_ip, real_ip
            );
            return Some(real_ip);
        }
    }

    Some(peer_ip.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_private_or_local_ipv4() {
        assert!(is_private_or_local(&"10.0.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"172.16.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"192.168.1.1".parse().unwrap()));
        assert!(is_private_or_local(&"127.0.0.1".parse().unwrap()));
        assert!(!is_private_or_local(&"8.8.8.8".parse().unwrap()));
        assert!(!is_private_or_local(&"1.1.1.1".parse().unwrap()));
    }

    #[test]
    fn test_is_private_or_local_ipv6() {
        assert!(is_private_or_local(&"::1".parse().unwrap()));
        assert!(is_private_or_local(&"fd00::1".parse().unwrap()));
        assert!(is_private_or_local(&"fc00::1".parse().unwrap()));
        assert!(is_private_or_local(&"fe80::1".parse().unwrap()));
        assert!(!is_private_or_local(
            &"2001:4860:4860::8888".parse().unwrap()
        ));
    }

    #[test]
    fn test_forwarded_header_first_entry_wins() {
        let req = actix_web::test::TestRequest::default()
            .insert_header(("x-forwarded-for", "203.0.113.9, 10.0.0.2"))
            .to_http_request();
        assert_eq!(
            extract_forwarded_ip_from_headers(req.headers()),
            Some("203.0.113.9".to_string())
        );
    }

    #[test]
    fn test_real_ip_fallback() {
        let req = actix_web::test::TestRequest::default()
            .insert_header(("x-real-ip", "203.0.113.7"))
            .to_http_request();
        assert_eq!(
            extract_forwarded_ip_from_headers(req.headers()),
            Some("203.0.113.7".to_string())
        );
    }
}
