//! Error renderers and how they are looked up.
//!
//! # Architecture
//!
//! ```text
//!   Accept header ──► AcceptList ──► RendererRegistry::negotiate ──► key
//!                                                                    │
//!                                     RendererSource::resolve(key) ◄─┘
//!                                                │
//!                                                ▼
//!                          ErrorRenderer::render(failure, context)
//! ```
//!
//! The registry only stores keys. Turning a key into a renderer is the job of
//! a [`RendererSource`], which can be a plain map ([`RendererContainer`]) or
//! any other keyed lookup.

pub mod container;
pub mod formats;
pub mod registry;

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Request, Uri};
use thiserror::Error;

use crate::error::GuardResult;
use crate::failure::Failure;

pub use container::RendererContainer;
pub use formats::{HtmlRenderer, JsonRenderer, PlainTextRenderer, XmlRenderer};
pub use registry::{RendererBinding, RendererRegistry};

/// Keys under which [`RendererContainer::with_defaults`] registers the
/// built-in renderers.
pub mod keys {
    pub const HTML: &str = "html";
    pub const JSON: &str = "json";
    pub const XML: &str = "xml";
    pub const PLAIN: &str = "plain";
}

/// Snapshot of the request taken before it is handed downstream.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
}

impl RequestContext {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }

    /// Snapshot `req`.
    ///
    /// The error catcher takes this for every request, successful or not,
    /// since the request is moved downstream before the outcome is known. The
    /// cost is one clone of the method, URI and header map; later changes to
    /// `req` are not seen.
    pub fn from_request<B>(req: &Request<B>) -> Self {
        Self::new(req.method().clone(), req.uri().clone(), req.headers().clone())
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// Body and content type produced by a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedError {
    pub body: Bytes,
    pub content_type: String,
}

impl RenderedError {
    pub fn new(body: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: content_type.into(),
        }
    }
}

/// Why a renderer could not produce output.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Rendering failed: {0}")]
    Failed(String),
}

/// Turns a failure into a response body.
pub trait ErrorRenderer: Send + Sync {
    fn render(&self, failure: &Failure, context: &RequestContext)
    -> Result<RenderedError, RenderError>;
}

impl<F> ErrorRenderer for F
where
    F: Fn(&Failure, &RequestContext) -> Result<RenderedError, RenderError> + Send + Sync,
{
    fn render(
        &self,
        failure: &Failure,
        context: &RequestContext,
    ) -> Result<RenderedError, RenderError> {
        self(failure, context)
    }
}

/// Keyed lookup of renderers.
pub trait RendererSource: Send + Sync {
    /// # Errors
    ///
    /// Returns [`crate::GuardError::RendererNotFound`] for unknown keys.
    fn resolve(&self, key: &str) -> GuardResult<Arc<dyn ErrorRenderer>>;
}
