//! Client key extractor
//!
//! Identifies the remote client for per-client throttling. The peer address
//! is used unless the server is configured to sit behind a proxy, in which
//! case the first `X-Forwarded-For` hop wins.

use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};

use crate::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey(pub String);

impl ClientKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve the key for a request. Client-supplied headers are ignored
    /// unless `trust_forwarded_for` is set.
    pub fn from_parts(parts: &Parts, trust_forwarded_for: bool) -> Self {
        if trust_forwarded_for {
            let forwarded = parts
                .headers
                .get(FORWARDED_FOR)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(hop) = forwarded {
                return ClientKey(hop.to_string());
            }
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map_or_else(|| "unknown".to_string(), |ConnectInfo(addr)| addr.ip().to_string());
        ClientKey(peer)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for ClientKey {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts, state.config().api.trust_forwarded_for))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(forwarded: Option<&str>, peer: Option<[u8; 4]>) -> Parts {
        let mut builder = Request::builder();
        if let Some(value) = forwarded {
            builder = builder.header(FORWARDED_FOR, value);
        }
        let mut request = builder.body(()).unwrap();
        if let Some(ip) = peer {
            request
                .extensions_mut()
                .insert(ConnectInfo(SocketAddr::from((ip, 4000))));
        }
        request.into_parts().0
    }

    #[test]
    fn test_forwarded_for_ignored_by_default() {
        let rotated = ["203.0.113.7", "198.51.100.1, 10.0.0.1"];
        for value in rotated {
            let key = ClientKey::from_parts(&parts(Some(value), Some([127, 0, 0, 1])), false);
            assert_eq!(key.as_str(), "127.0.0.1");
        }
    }

    #[test]
    fn test_forwarded_for_behind_trusted_proxy() {
        let request = parts(Some("203.0.113.7, 10.0.0.1"), Some([10, 0, 0, 1]));
        assert_eq!(ClientKey::from_parts(&request, true).as_str(), "203.0.113.7");

        let blank = parts(Some(" "), Some([10, 0, 0, 1]));
        assert_eq!(ClientKey::from_parts(&blank, true).as_str(), "10.0.0.1");
    }

    #[test]
    fn test_missing_peer_address() {
        assert_eq!(ClientKey::from_parts(&parts(None, None), false).as_str(), "unknown");
    }
}
