//! IP filter and client IP resolution through the tower `Service` interface.
//!
//! Run with: `cargo test --test ip_filter_tests`
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use tower::{Layer, Service, ServiceExt};

use webguard::middleware::{
    ClientIpLayer, DefaultResponseFactory, IpFilterLayer, IpRanges, RequestAttributesExt,
    ResponseFactory,
};

const ALLOWED_IP: &str = "1.1.1.1";
const REMOTE_ADDR: &str = "8.8.8.8";

// =============================================================================
// Fixtures
// =============================================================================

/// Inner service counting how often it is reached.
#[derive(Clone, Default)]
struct CountingService {
    calls: Arc<AtomicUsize>,
}

impl CountingService {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Service<Request<Body>> for CountingService {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = std::future::Ready<Result<Response<Body>, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let seen = req
            .attribute(webguard::middleware::DEFAULT_CLIENT_IP_ATTRIBUTE)
            .unwrap_or("none")
            .to_string();
        std::future::ready(Ok(Response::new(Body::from(seen))))
    }
}

/// Response factory counting how often it is asked for a response.
#[derive(Clone, Default)]
struct CountingFactory {
    created: Arc<AtomicUsize>,
}

impl CountingFactory {
    fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl ResponseFactory for CountingFactory {
    fn create_response(&self, status: StatusCode) -> Response<Body> {
        self.created.fetch_add(1, Ordering::SeqCst);
        (status, "access denied").into_response()
    }
}

fn ip_filter(factory: &CountingFactory) -> IpFilterLayer {
    let ranges = IpRanges::new(&[ALLOWED_IP]).unwrap();
    IpFilterLayer::new(Arc::new(ranges), Arc::new(factory.clone()))
}

fn request_from(remote: Option<&str>) -> Request<Body> {
    let mut req = Request::builder().uri("/").body(Body::empty()).unwrap();
    if let Some(remote) = remote {
        let addr: SocketAddr = format!("{remote}:40000").parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
    }
    req
}

async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// =============================================================================
// Remote Address
// =============================================================================

#[tokio::test]
async fn test_access_denied_when_ip_not_allowed() {
    let factory = CountingFactory::default();
    let inner = CountingService::default();

    let response = ip_filter(&factory)
        .layer(inner.clone())
        .oneshot(request_from(Some(REMOTE_ADDR)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(factory.created(), 1);
    assert_eq!(inner.calls(), 0);
}

#[tokio::test]
async fn test_calls_inner_when_remote_address_allowed() {
    let factory = CountingFactory::default();
    let inner = CountingService::default();

    let response = ip_filter(&factory)
        .layer(inner.clone())
        .oneshot(request_from(Some(ALLOWED_IP)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(factory.created(), 0);
    assert_eq!(inner.calls(), 1);
}

#[tokio::test]
async fn test_denied_without_remote_address() {
    let factory = CountingFactory::default();
    let inner = CountingService::default();

    let response = ip_filter(&factory)
        .layer(inner.clone())
        .oneshot(request_from(None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(inner.calls(), 0);
}

// =============================================================================
// Attribute
// =============================================================================

#[tokio::test]
async fn test_wrong_attribute() {
    let factory = CountingFactory::default();
    let inner = CountingService::default();
    let filter = ip_filter(&factory).with_attribute("clientIpAttr");

    // The allowed remote address is irrelevant once an attribute is configured.
    let response = filter
        .layer(inner.clone())
        .oneshot(request_from(Some(ALLOWED_IP)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(factory.created(), 1);
    assert_eq!(inner.calls(), 0);
}

#[tokio::test]
async fn test_right_attribute() {
    let factory = CountingFactory::default();
    let inner = CountingService::default();
    let filter = ip_filter(&factory).with_attribute("clientIpAttr");

    let mut req = request_from(None);
    req.set_attribute("clientIpAttr", ALLOWED_IP);
    let response = filter.layer(inner.clone()).oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(inner.calls(), 1);
}

#[tokio::test]
async fn test_wrong_attribute_value() {
    let factory = CountingFactory::default();
    let inner = CountingService::default();
    let filter = ip_filter(&factory).with_attribute("clientIpAttr");

    let mut req = request_from(None);
    req.set_attribute("clientIpAttr", REMOTE_ADDR);
    let response = filter.layer(inner.clone()).oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(inner.calls(), 0);
}

// =============================================================================
// Validators And Factories
// =============================================================================

#[tokio::test]
async fn test_closure_validator_and_default_factory() {
    let inner = CountingService::default();
    let filter = IpFilterLayer::new(
        Arc::new(|address: &str| address.starts_with("10.")),
        Arc::new(DefaultResponseFactory),
    );

    let response = filter
        .layer(inner.clone())
        .oneshot(request_from(Some(REMOTE_ADDR)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_string(response).await, "Forbidden");

    let response = filter
        .layer(inner.clone())
        .oneshot(request_from(Some("10.1.2.3")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(inner.calls(), 1);
}

#[tokio::test]
async fn test_negated_range_in_filter() {
    let inner = CountingService::default();
    let filter = IpFilterLayer::from_ranges(&["!192.168.1.13", "192.168.1.0/24"]).unwrap();

    let denied = filter
        .layer(inner.clone())
        .oneshot(request_from(Some("192.168.1.13")))
        .await
        .unwrap();
    let allowed = filter
        .layer(inner.clone())
        .oneshot(request_from(Some("192.168.1.14")))
        .await
        .unwrap();

    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    assert_eq!(allowed.status(), StatusCode::OK);
    assert_eq!(inner.calls(), 1);
}

// =============================================================================
// Client IP Resolution In Front Of The Filter
// =============================================================================

fn with_forwarded_for(mut req: Request<Body>) -> Request<Body> {
    req.headers_mut()
        .insert("x-forwarded-for", "1.1.1.1, 10.0.0.2".parse().unwrap());
    req
}

#[tokio::test]
async fn test_forwarded_address_from_trusted_proxy() {
    let inner = CountingService::default();
    let client_ip = ClientIpLayer::new(IpRanges::new(&["localhost"]).unwrap());
    let filter = IpFilterLayer::from_ranges(&[ALLOWED_IP])
        .unwrap()
        .with_attribute(client_ip.attribute());

    let response = client_ip
        .layer(filter.layer(inner.clone()))
        .oneshot(with_forwarded_for(request_from(Some("127.0.0.1"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, ALLOWED_IP);
    assert_eq!(inner.calls(), 1);
}

#[tokio::test]
async fn test_forwarded_address_from_untrusted_peer_ignored() {
    let inner = CountingService::default();
    let client_ip = ClientIpLayer::new(IpRanges::new(&["localhost"]).unwrap());
    let filter = IpFilterLayer::from_ranges(&[ALLOWED_IP])
        .unwrap()
        .with_attribute(client_ip.attribute());

    let response = client_ip
        .layer(filter.layer(inner.clone()))
        .oneshot(with_forwarded_for(request_from(Some(REMOTE_ADDR))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(inner.calls(), 0);
}
