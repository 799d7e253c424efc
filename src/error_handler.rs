//! Fallback used when negotiation does not produce a renderer.
//!
//! The default handler has no fallback of its own, so it must always produce
//! a usable, non-empty body. If its renderer fails or returns nothing, a fixed
//! plain-text message is sent instead.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::StatusCode;
use tracing::warn;

use crate::failure::Failure;
use crate::renderer::formats::{GENERIC_MESSAGE, PLAIN_CONTENT_TYPE};
use crate::renderer::{ErrorRenderer, PlainTextRenderer, RequestContext};

/// Complete output of an [`ErrorHandler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandledError {
    pub status: StatusCode,
    pub body: Bytes,
    pub content_type: String,
}

/// Produces error content without negotiation. Must not fail.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, failure: &Failure, context: &RequestContext) -> HandledError;
}

/// [`ErrorHandler`] backed by a single renderer.
#[derive(Clone)]
pub struct DefaultErrorHandler {
    renderer: Arc<dyn ErrorRenderer>,
}

impl DefaultErrorHandler {
    pub fn new(renderer: Arc<dyn ErrorRenderer>) -> Self {
        Self { renderer }
    }

    /// Handler rendering plain text.
    pub fn plain_text(verbose: bool) -> Self {
        Self::new(Arc::new(PlainTextRenderer::new(verbose)))
    }
}

impl Default for DefaultErrorHandler {
    fn default() -> Self {
        Self::plain_text(false)
    }
}

impl ErrorHandler for DefaultErrorHandler {
    fn handle(&self, failure: &Failure, context: &RequestContext) -> HandledError {
        let rendered = match self.renderer.render(failure, context) {
            Ok(rendered) if !rendered.body.is_empty() => Some(rendered),
            Ok(_) => {
                warn!("Default error renderer produced an empty body");
                None
            }
            Err(e) => {
                warn!(error = %e, "Default error renderer failed");
                None
            }
        };

        match rendered {
            Some(rendered) => HandledError {
                status: failure.status(),
                body: rendered.body,
                content_type: rendered.content_type,
            },
            None => HandledError {
                status: failure.status(),
                body: Bytes::from_static(GENERIC_MESSAGE.as_bytes()),
                content_type: PLAIN_CONTENT_TYPE.to_string(),
            },
        }
    }
}
