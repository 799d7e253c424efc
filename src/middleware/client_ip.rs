//! Resolves the client address and stores it as a request attribute.
//!
//! # Security Warning: IP Spoofing Risk
//!
//! `X-Forwarded-For` and `X-Real-IP` are set by whoever sends the request.
//! They are only honored when the connection itself comes from one of the
//! configured trusted proxies; any other peer gets its socket address recorded
//! and its headers ignored.
//!
//! Configure the proxy to overwrite (not append to) client IP headers:
//!
//! ```nginx
//! proxy_set_header X-Real-IP $remote_addr;
//! proxy_set_header X-Forwarded-For $remote_addr;
//! ```
//!
//! # Resolution
//!
//! ```text
//!   ConnectInfo ──► peer in trusted proxies? ──no──► peer address
//!                              │
//!                             yes
//!                              ▼
//!                 X-Forwarded-For (first entry), else X-Real-IP
//!                              │
//!                 parseable? ──yes──► header address
//!                              │
//!                              no ──► attribute not set
//! ```
//!
//! Without `ConnectInfo` the attribute is not set either, so a downstream
//! [`super::IpFilterLayer`] reading it denies the request.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response};
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::attributes::RequestAttributesExt;
use super::ip_ranges::{IpRanges, parse_address};

/// Attribute name used when none is configured.
pub const DEFAULT_CLIENT_IP_ATTRIBUTE: &str = "client_ip";

/// Where a header-supplied client address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtractedIp<'a> {
    /// First entry of X-Forwarded-For.
    FromXff(&'a str),
    FromRealIp(&'a str),
    NotFound,
}

impl ExtractedIp<'_> {
    fn header(&self) -> &'static str {
        match self {
            ExtractedIp::FromXff(_) => "x-forwarded-for",
            ExtractedIp::FromRealIp(_) => "x-real-ip",
            ExtractedIp::NotFound => "none",
        }
    }
}

fn extract_ip_from_headers<B>(req: &Request<B>) -> ExtractedIp<'_> {
    // Format: "client, proxy1, proxy2"
    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first_ip) = value.split(',').next()
    {
        return ExtractedIp::FromXff(first_ip.trim());
    }

    if let Some(real_ip) = req.headers().get("x-real-ip")
        && let Ok(value) = real_ip.to_str()
    {
        return ExtractedIp::FromRealIp(value.trim());
    }

    ExtractedIp::NotFound
}

/// Client IP layer for the Tower middleware stack.
#[derive(Debug, Clone)]
pub struct ClientIpLayer {
    trusted_proxies: Arc<IpRanges>,
    attribute: Arc<str>,
}

impl Default for ClientIpLayer {
    fn default() -> Self {
        Self::new(IpRanges::default())
    }
}

impl ClientIpLayer {
    /// Trust forwarding headers from peers inside `trusted_proxies`.
    ///
    /// Empty ranges mean the peer address is always used.
    pub fn new(trusted_proxies: IpRanges) -> Self {
        Self {
            trusted_proxies: Arc::new(trusted_proxies),
            attribute: Arc::from(DEFAULT_CLIENT_IP_ATTRIBUTE),
        }
    }

    /// Store the address under `name` instead of [`DEFAULT_CLIENT_IP_ATTRIBUTE`].
    pub fn with_attribute(self, name: impl Into<Arc<str>>) -> Self {
        Self {
            attribute: name.into(),
            ..self
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Client address of `req`, or `None` if it cannot be trusted.
    pub fn resolve<B>(&self, req: &Request<B>) -> Option<IpAddr> {
        let ConnectInfo(peer) = req.extensions().get::<ConnectInfo<SocketAddr>>()?;
        let peer = peer.ip().to_canonical();

        if !self.trusted_proxies.contains(peer) {
            return Some(peer);
        }

        let extracted = extract_ip_from_headers(req);
        let candidate = match extracted {
            ExtractedIp::FromXff(ip) | ExtractedIp::FromRealIp(ip) => ip,
            ExtractedIp::NotFound => {
                debug!(peer = %peer, "Trusted proxy sent no client IP header");
                return Some(peer);
            }
        };

        match parse_address(candidate) {
            Some(ip) => {
                debug!(peer = %peer, client_ip = %ip, header = extracted.header(), "Resolved client IP from proxy header");
                Some(ip)
            }
            None => {
                warn!(
                    peer = %peer,
                    header = extracted.header(),
                    value = candidate,
                    "Trusted proxy sent an unparseable client IP"
                );
                None
            }
        }
    }
}

impl<S> Layer<S> for ClientIpLayer {
    type Service = ClientIpService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ClientIpService {
            inner,
            resolver: self.clone(),
        }
    }
}

/// Client IP service wrapper.
#[derive(Debug, Clone)]
pub struct ClientIpService<S> {
    inner: S,
    resolver: ClientIpLayer,
}

impl<S> Service<Request<Body>> for ClientIpService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        if let Some(ip) = self.resolver.resolve(&req) {
            req.set_attribute(self.resolver.attribute(), ip.to_string());
        }

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move { inner.call(req).await })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn request(peer: Option<&str>, headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        if let Some(peer) = peer {
            req.extensions_mut()
                .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
        }
        req
    }

    fn trusting(entries: &[&str]) -> ClientIpLayer {
        ClientIpLayer::new(IpRanges::new(entries).unwrap())
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_extract_ip_from_xff() {
        let req = request(None, &[("x-forwarded-for", "192.168.1.1, 10.0.0.1")]);
        assert_eq!(extract_ip_from_headers(&req), ExtractedIp::FromXff("192.168.1.1"));
    }

    #[test]
    fn test_extract_ip_xff_priority_over_real_ip() {
        let req = request(
            None,
            &[("x-forwarded-for", "10.0.0.1"), ("x-real-ip", "192.168.1.1")],
        );
        assert_eq!(extract_ip_from_headers(&req), ExtractedIp::FromXff("10.0.0.1"));
    }

    #[test]
    fn test_extract_ip_from_real_ip() {
        let req = request(None, &[("x-real-ip", " ::1 ")]);
        assert_eq!(extract_ip_from_headers(&req), ExtractedIp::FromRealIp("::1"));
    }

    #[test]
    fn test_extract_ip_not_found() {
        assert_eq!(extract_ip_from_headers(&request(None, &[])), ExtractedIp::NotFound);
    }

    #[test]
    fn test_untrusted_peer_headers_ignored() {
        let layer = ClientIpLayer::default();
        let req = request(Some("8.8.8.8:4000"), &[("x-forwarded-for", "1.1.1.1")]);
        assert_eq!(layer.resolve(&req), Some(ip("8.8.8.8")));
    }

    #[test]
    fn test_trusted_proxy_forwarded_for() {
        let layer = trusting(&["10.0.0.0/8"]);
        let req = request(
            Some("10.0.0.5:4000"),
            &[("x-forwarded-for", "203.0.113.50, 10.0.0.7")],
        );
        assert_eq!(layer.resolve(&req), Some(ip("203.0.113.50")));
    }

    #[test]
    fn test_trusted_proxy_header_with_port() {
        let layer = trusting(&["localhost"]);
        let req = request(Some("127.0.0.1:4000"), &[("x-real-ip", "1.1.1.1:8080")]);
        assert_eq!(layer.resolve(&req), Some(ip("1.1.1.1")));
    }

    #[test]
    fn test_trusted_proxy_without_header_uses_peer() {
        let layer = trusting(&["localhost"]);
        let req = request(Some("127.0.0.1:4000"), &[]);
        assert_eq!(layer.resolve(&req), Some(ip("127.0.0.1")));
    }

    #[test]
    fn test_trusted_proxy_garbage_header() {
        let layer = trusting(&["localhost"]);
        let req = request(Some("127.0.0.1:4000"), &[("x-forwarded-for", "unknown")]);
        assert_eq!(layer.resolve(&req), None);
    }

    #[test]
    fn test_no_connect_info() {
        let layer = ClientIpLayer::default();
        assert_eq!(layer.resolve(&request(None, &[])), None);
    }

    #[test]
    fn test_custom_attribute_name() {
        let layer = ClientIpLayer::default().with_attribute("clientIpAttr");
        assert_eq!(layer.attribute(), "clientIpAttr");
        assert_eq!(ClientIpLayer::default().attribute(), DEFAULT_CLIENT_IP_ATTRIBUTE);
    }
}
