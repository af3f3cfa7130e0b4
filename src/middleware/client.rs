//! Client address resolution.

use axum::{extract::ConnectInfo, http::HeaderMap, http::Request};
use std::net::{IpAddr, SocketAddr};

/// How to find the client address of a request.
///
/// Forwarding headers are client-controlled, so they are only read when the
/// server sits behind a proxy that overwrites them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientAddrPolicy {
    pub trust_proxy_headers: bool,
}

impl ClientAddrPolicy {
    pub fn new(trust_proxy_headers: bool) -> Self {
        Self { trust_proxy_headers }
    }

    /// Proxy headers (if trusted), then the socket peer
    pub fn resolve<B>(&self, req: &Request<B>) -> Option<IpAddr> {
        if self.trust_proxy_headers {
            if let Some(ip) = forwarded_ip(req.headers()) {
                return Some(ip);
            }
        }

        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let first_forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok());

    first_forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    })
}
