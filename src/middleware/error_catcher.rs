//! Middleware that turns downstream failures into error responses.
//!
//! # What Gets Caught
//!
//! - the inner service resolves to `Err`
//! - the inner service panics (sync or async part)
//! - a handler returns a [`Failure`] (it travels in the response extensions)
//!
//! Everything else passes through untouched.
//!
//! # Rendering
//!
//! ```text
//!   Failure ──► log ──► negotiate(Accept) ──► renderer? ──yes──► render ──ok──► response
//!                                                 │                  │
//!                                                 no               error
//!                                                 ▼                  ▼
//!                                            DefaultErrorHandler (never fails)
//! ```
//!
//! The default handler is tried once; the result never loops back into
//! negotiation. The service's error type is [`Infallible`]: callers always
//! get a well-formed response.
//!
//! # Configuration
//!
//! All `with_*` / `without_*` methods return a new layer and leave the
//! original untouched, so a configured layer can be shared and reused freely.
//!
//! ```rust,ignore
//! let catcher = ErrorCatcherLayer::with_defaults(false)
//!     .with_renderer("application/problem+json", "json")?;
//! let app = Router::new().route("/", get(handler)).layer(catcher);
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderValue, Request, Response, StatusCode};
use axum::response::IntoResponse;
use futures::FutureExt;
use tower::{BoxError, Layer, Service, ServiceExt};
use tracing::{debug, error, warn};

use crate::error::GuardResult;
use crate::error_handler::{DefaultErrorHandler, ErrorHandler, HandledError};
use crate::failure::Failure;
use crate::media_type::MediaTypePattern;
use crate::metrics::{self, DEFAULT_RENDERER_LABEL};
use crate::negotiation::AcceptList;
use crate::renderer::formats::GENERIC_MESSAGE;
use crate::renderer::{
    RenderedError, RendererBinding, RendererContainer, RendererRegistry, RendererSource,
    RequestContext, keys,
};

/// Patterns bound by [`ErrorCatcherLayer::with_defaults`], in registration order.
pub const DEFAULT_BINDINGS: [(&str, &str); 6] = [
    ("application/json", keys::JSON),
    ("application/xml", keys::XML),
    ("text/xml", keys::XML),
    ("text/plain", keys::PLAIN),
    ("text/html", keys::HTML),
    ("*/*", keys::HTML),
];

static NO_STORE: HeaderValue = HeaderValue::from_static("no-store");
static PLAIN_TEXT: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");

/// Error catcher layer for the Tower middleware stack.
#[derive(Clone)]
pub struct ErrorCatcherLayer {
    registry: Arc<RendererRegistry>,
    source: Arc<dyn RendererSource>,
    handler: Arc<dyn ErrorHandler>,
}

impl ErrorCatcherLayer {
    /// Create a layer with no renderer bindings.
    ///
    /// Until renderers are added, every failure goes to `handler`.
    pub fn new(source: Arc<dyn RendererSource>, handler: Arc<dyn ErrorHandler>) -> Self {
        Self {
            registry: Arc::new(RendererRegistry::new()),
            source,
            handler,
        }
    }

    /// Layer with the built-in renderers bound as in [`DEFAULT_BINDINGS`] and a
    /// plain-text default handler.
    pub fn with_defaults(verbose: bool) -> Self {
        let registry = DEFAULT_BINDINGS
            .iter()
            .fold(RendererRegistry::new(), |registry, (pattern, key)| {
                // Constant patterns are known to be valid.
                match MediaTypePattern::parse(pattern) {
                    Ok(pattern) => registry.register_pattern(pattern, *key),
                    Err(_) => registry,
                }
            });

        Self {
            registry: Arc::new(registry),
            source: Arc::new(RendererContainer::with_defaults(verbose)),
            handler: Arc::new(DefaultErrorHandler::plain_text(verbose)),
        }
    }

    /// Bind `pattern` to the renderer stored under `key`.
    ///
    /// # Errors
    ///
    /// - [`crate::GuardError::InvalidPattern`] if `pattern` is malformed
    /// - [`crate::GuardError::RendererNotFound`] if the source does not know `key`
    pub fn with_renderer(&self, pattern: &str, key: &str) -> GuardResult<Self> {
        let pattern = MediaTypePattern::parse(pattern)?;
        self.source.resolve(key)?;
        let registry = (*self.registry).clone().register_pattern(pattern, key);
        Ok(self.with_registry(registry))
    }

    /// Like [`with_renderer`](Self::with_renderer), but drops every other binding.
    pub fn with_only_renderer(&self, pattern: &str, key: &str) -> GuardResult<Self> {
        let pattern = MediaTypePattern::parse(pattern)?;
        self.source.resolve(key)?;
        let registry = RendererRegistry::new().register_pattern(pattern, key);
        Ok(self.with_registry(registry))
    }

    /// Drop every binding; all failures then go to the default handler.
    pub fn without_renderers(&self) -> Self {
        self.with_registry(RendererRegistry::new())
    }

    /// Drop the binding for `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::GuardError::InvalidPattern`] if `pattern` is malformed.
    pub fn without_renderer(&self, pattern: &str) -> GuardResult<Self> {
        let registry = (*self.registry).clone().clear_pattern(pattern)?;
        Ok(self.with_registry(registry))
    }

    /// Use a different default handler.
    pub fn with_error_handler(&self, handler: Arc<dyn ErrorHandler>) -> Self {
        Self {
            handler,
            ..self.clone()
        }
    }

    fn with_registry(&self, registry: RendererRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            ..self.clone()
        }
    }

    pub fn registry(&self) -> &RendererRegistry {
        &self.registry
    }

    /// Build the error response for `failure`.
    ///
    /// This is what the service does once it has caught something; it is
    /// public so that handlers outside a tower stack can reuse it.
    pub fn render_failure(&self, failure: &Failure, context: &RequestContext) -> Response<Body> {
        error!(
            origin = %failure.origin(),
            status = failure.status().as_u16(),
            method = %context.method(),
            uri = %context.uri(),
            error = %failure,
            "Uncaught failure while handling request"
        );

        let accept = AcceptList::from_headers(context.headers());
        let negotiated = self
            .registry
            .negotiate(&accept)
            .and_then(|binding| self.render_with(binding, failure, context));

        let (status, body, content_type, renderer) = match negotiated {
            Some((key, rendered, content_type)) => {
                (failure.status(), rendered.body, content_type, key)
            }
            None => {
                let (status, body, content_type) = self.handle_default(failure, context);
                (status, body, content_type, DEFAULT_RENDERER_LABEL)
            }
        };

        metrics::record_error_caught(failure.origin().as_str(), renderer);

        (
            status,
            [(CONTENT_TYPE, content_type), (CACHE_CONTROL, NO_STORE.clone())],
            body,
        )
            .into_response()
    }

    /// Run the default handler. A panicking handler yields a generic plain-text 500.
    fn handle_default(
        &self,
        failure: &Failure,
        context: &RequestContext,
    ) -> (StatusCode, Bytes, HeaderValue) {
        let outcome =
            std::panic::catch_unwind(AssertUnwindSafe(|| self.handler.handle(failure, context)));

        match outcome {
            Ok(HandledError {
                status,
                body,
                content_type,
            }) => {
                let content_type = HeaderValue::from_str(&content_type).unwrap_or_else(|_| {
                    warn!(content_type = %content_type, "Default handler returned an invalid content type");
                    PLAIN_TEXT.clone()
                });
                (status, body, content_type)
            }
            Err(_) => {
                error!("Default error handler panicked");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Bytes::from_static(GENERIC_MESSAGE.as_bytes()),
                    PLAIN_TEXT.clone(),
                )
            }
        }
    }

    /// Resolve and run the renderer bound by `binding`.
    ///
    /// `None` sends the failure to the default handler.
    fn render_with<'a>(
        &self,
        binding: &'a RendererBinding,
        failure: &Failure,
        context: &RequestContext,
    ) -> Option<(&'a str, RenderedError, HeaderValue)> {
        let key = binding.key();
        debug!(pattern = %binding.pattern(), renderer = key, "Negotiated error renderer");

        let renderer = match self.source.resolve(key) {
            Ok(renderer) => renderer,
            Err(e) => {
                warn!(renderer = key, error = %e, "Error renderer no longer resolves");
                return None;
            }
        };

        let outcome =
            std::panic::catch_unwind(AssertUnwindSafe(|| renderer.render(failure, context)));

        match outcome {
            Ok(Ok(rendered)) => match HeaderValue::from_str(&rendered.content_type) {
                Ok(content_type) => Some((key, rendered, content_type)),
                Err(_) => {
                    warn!(
                        renderer = key,
                        content_type = %rendered.content_type,
                        "Error renderer returned an invalid content type"
                    );
                    None
                }
            },
            Ok(Err(e)) => {
                warn!(renderer = key, error = %e, "Error renderer failed");
                None
            }
            Err(_) => {
                warn!(renderer = key, "Error renderer panicked");
                None
            }
        }
    }
}

impl<S> Layer<S> for ErrorCatcherLayer {
    type Service = ErrorCatcherService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ErrorCatcherService {
            inner,
            catcher: self.clone(),
        }
    }
}

/// Error catcher service wrapper.
#[derive(Clone)]
pub struct ErrorCatcherService<S> {
    inner: S,
    catcher: ErrorCatcherLayer,
}

impl<S> Service<Request<Body>> for ErrorCatcherService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness errors of the inner service are caught in `call`.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let context = RequestContext::from_request(&req);
        let catcher = self.catcher.clone();
        let inner = self.inner.clone();

        Box::pin(async move {
            let downstream = async move { inner.oneshot(req).await.map_err(Into::<BoxError>::into) };

            let failure = match AssertUnwindSafe(downstream).catch_unwind().await {
                Ok(Ok(mut response)) => match response.extensions_mut().remove::<Failure>() {
                    Some(failure) => failure,
                    None => return Ok(response),
                },
                Ok(Err(e)) => Failure::from_service_error(e),
                Err(panic) => Failure::from_panic(panic),
            };

            Ok(catcher.render_failure(&failure, &context))
        })
    }
}
