//! IP allow-list middleware.
//!
//! Requests whose client address fails the validator are answered with
//! `403 Forbidden` and never reach the inner service.
//!
//! # Where The Address Comes From
//!
//! - With an attribute name configured (see [`IpFilterLayer::with_attribute`]),
//!   the request attribute of that name. [`super::ClientIpLayer`] is the usual
//!   producer.
//! - Otherwise the peer address from axum's `ConnectInfo<SocketAddr>`, which is
//!   present when the app is served with
//!   `into_make_service_with_connect_info::<SocketAddr>()`.
//!
//! A request with no address is denied.
//!
//! ```rust,ignore
//! let filter = IpFilterLayer::from_ranges(&["!192.168.1.13", "192.168.1.0/24"])?
//!     .with_attribute("client_ip");
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::attributes::RequestAttributesExt;
use super::ip_ranges::IpRanges;
use crate::error::GuardResult;
use crate::metrics::{self, DenyReason};

/// Decides whether a client address may pass.
pub trait IpValidator: Send + Sync {
    fn matches(&self, address: &str) -> bool;
}

impl<F> IpValidator for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn matches(&self, address: &str) -> bool {
        self(address)
    }
}

impl IpValidator for IpRanges {
    fn matches(&self, address: &str) -> bool {
        self.contains_str(address)
    }
}

/// Builds the response sent to denied clients.
pub trait ResponseFactory: Send + Sync {
    fn create_response(&self, status: StatusCode) -> Response<Body>;
}

impl<F> ResponseFactory for F
where
    F: Fn(StatusCode) -> Response<Body> + Send + Sync,
{
    fn create_response(&self, status: StatusCode) -> Response<Body> {
        self(status)
    }
}

/// Responds with the status and its reason phrase as a plain-text body.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResponseFactory;

impl ResponseFactory for DefaultResponseFactory {
    fn create_response(&self, status: StatusCode) -> Response<Body> {
        (status, status.canonical_reason().unwrap_or_default()).into_response()
    }
}

/// IP filter layer for the Tower middleware stack.
#[derive(Clone)]
pub struct IpFilterLayer {
    validator: Arc<dyn IpValidator>,
    factory: Arc<dyn ResponseFactory>,
    attribute: Option<Arc<str>>,
}

impl IpFilterLayer {
    pub fn new(validator: Arc<dyn IpValidator>, factory: Arc<dyn ResponseFactory>) -> Self {
        Self {
            validator,
            factory,
            attribute: None,
        }
    }

    /// Filter on [`IpRanges`] built from `entries`, denying with
    /// [`DefaultResponseFactory`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::GuardError::InvalidIpRange`] for a malformed entry.
    pub fn from_ranges<S: AsRef<str>>(entries: &[S]) -> GuardResult<Self> {
        let ranges = IpRanges::new(entries)?;
        Ok(Self::new(Arc::new(ranges), Arc::new(DefaultResponseFactory)))
    }

    /// Read the client address from the named request attribute instead of
    /// the connection.
    pub fn with_attribute(self, name: impl Into<Arc<str>>) -> Self {
        Self {
            attribute: Some(name.into()),
            ..self
        }
    }

    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    /// Client address of `req`, as the filter sees it.
    fn client_address<B>(&self, req: &Request<B>) -> Option<String> {
        match &self.attribute {
            Some(name) => req.attribute(name).map(str::to_string),
            None => req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string()),
        }
    }

    /// `None` when `req` may pass; otherwise why it may not.
    fn check<B>(&self, req: &Request<B>) -> Option<DenyReason> {
        let Some(address) = self.client_address(req) else {
            warn!(
                attribute = self.attribute(),
                path = %req.uri().path(),
                "Denied request without a client address"
            );
            return Some(DenyReason::NoAddress);
        };

        if self.validator.matches(&address) {
            debug!(client_ip = %address, "Client address allowed");
            None
        } else {
            warn!(
                client_ip = %address,
                path = %req.uri().path(),
                "Denied request from disallowed address"
            );
            Some(DenyReason::NotAllowed)
        }
    }
}

impl<S> Layer<S> for IpFilterLayer {
    type Service = IpFilterService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IpFilterService {
            inner,
            filter: self.clone(),
        }
    }
}

/// IP filter service wrapper.
#[derive(Clone)]
pub struct IpFilterService<S> {
    inner: S,
    filter: IpFilterLayer,
}

impl<S> Service<Request<Body>> for IpFilterService<S>
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

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        if let Some(reason) = self.filter.check(&req) {
            metrics::record_ip_denied(reason);
            let response = self.filter.factory.create_response(StatusCode::FORBIDDEN);
            return Box::pin(async move { Ok(response) });
        }

        metrics::record_ip_allowed();

        // The readied service handles the request; a fresh clone takes its place.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move { inner.call(req).await })
    }
}
