//! Client identity for rate limiting.
//!
//! Resolution order: first `X-Forwarded-For` entry, `X-Real-IP`, the socket
//! address injected by `axum::serve`, then the literal `"unknown"`.
//! Proxy headers are trusted as-is, so the service must sit behind a reverse
//! proxy that overwrites them.

use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderMap,
};
use std::net::SocketAddr;

pub const UNKNOWN_CLIENT: &str = "unknown";

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub fn client_identifier_from(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = header_value(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }
    if let Some(real_ip) = header_value(headers, "x-real-ip") {
        return real_ip.to_string();
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

pub fn client_identifier(request: &Request) -> String {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    client_identifier_from(request.headers(), peer)
}
