use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Client identity used as the rate-limiting key.
///
/// Precedence, first non-empty match wins: left-most `X-Forwarded-For`
/// entry (trimmed), then `X-Real-IP`, then the peer address host portion.
pub fn client_key(headers: &HeaderMap, peer: SocketAddr) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    peer.ip().to_string()
}
