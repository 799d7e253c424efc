//! The value the error catcher renders.
//!
//! A [`Failure`] is produced in three ways:
//!
//! - a handler returns it (it implements [`IntoResponse`] and converts from any
//!   `std::error::Error`, so `?` works in handlers returning `Result<_, Failure>`)
//! - the wrapped service resolves to `Err`
//! - the wrapped service panics
//!
//! The status is always a server error. Anything else passed to
//! [`Failure::with_status`] is replaced by `500 Internal Server Error`.

use std::any::Any;
use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tower::BoxError;

/// Where a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOrigin {
    /// Returned by a handler.
    Handler,
    /// The inner service resolved to `Err`.
    Service,
    /// The inner service panicked.
    Panic,
}

impl FailureOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureOrigin::Handler => "handler",
            FailureOrigin::Service => "service",
            FailureOrigin::Panic => "panic",
        }
    }
}

impl fmt::Display for FailureOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uncaught downstream failure.
#[derive(Debug, Clone)]
pub struct Failure {
    message: String,
    causes: Vec<String>,
    status: StatusCode,
    origin: FailureOrigin,
}

impl Failure {
    /// Create a handler failure with status 500.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            causes: Vec::new(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
            origin: FailureOrigin::Handler,
        }
    }

    /// Build from an error, keeping its `source()` chain as causes.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut failure = Self::new(err.to_string());
        let mut source = err.source();
        while let Some(cause) = source {
            failure.causes.push(cause.to_string());
            source = cause.source();
        }
        failure
    }

    /// Build from the error of a wrapped service.
    pub fn from_service_error(err: BoxError) -> Self {
        let mut failure = Self::from_error(err.as_ref());
        failure.origin = FailureOrigin::Service;
        failure
    }

    /// Build from a panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_string()
        };

        let mut failure = Self::new(message);
        failure.origin = FailureOrigin::Panic;
        failure
    }

    /// Use a different 5xx status.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = if status.is_server_error() {
            status
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        self
    }

    /// Append a cause below the existing ones.
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Underlying causes, outermost first.
    pub fn causes(&self) -> &[String] {
        &self.causes
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn origin(&self) -> FailureOrigin {
        self.origin
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        for cause in &self.causes {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

impl<E> From<E> for Failure
where
    E: std::error::Error + 'static,
{
    fn from(err: E) -> Self {
        Self::from_error(&err)
    }
}

/// The response carries the failure as an extension for the error catcher to
/// render. Without an error catcher in the stack the client gets a bare status.
impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let mut response = self.status.into_response();
        response.extensions_mut().insert(self);
        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] Inner);

    #[derive(Debug, thiserror::Error)]
    #[error("inner")]
    struct Inner;

    #[test]
    fn test_new_defaults_to_500() {
        let failure = Failure::new("boom");
        assert_eq!(failure.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failure.origin(), FailureOrigin::Handler);
    }

    #[test]
    fn test_with_status_keeps_server_errors_only() {
        let failure = Failure::new("x").with_status(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(failure.status(), StatusCode::SERVICE_UNAVAILABLE);

        let failure = Failure::new("x").with_status(StatusCode::NOT_FOUND);
        assert_eq!(failure.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_from_error_collects_sources() {
        let failure = Failure::from(Outer(Inner));
        assert_eq!(failure.message(), "outer");
        assert_eq!(failure.causes(), &["inner".to_string()]);
        assert_eq!(failure.to_string(), "outer: inner");
    }

    #[test]
    fn test_from_service_error_sets_origin() {
        let failure = Failure::from_service_error(Box::new(Inner));
        assert_eq!(failure.origin(), FailureOrigin::Service);
    }

    #[test]
    fn test_from_panic_payloads() {
        let failure = Failure::from_panic(Box::new("static str"));
        assert_eq!(failure.message(), "static str");
        assert_eq!(failure.origin(), FailureOrigin::Panic);

        let failure = Failure::from_panic(Box::new(String::from("owned")));
        assert_eq!(failure.message(), "owned");

        let failure = Failure::from_panic(Box::new(42_u8));
        assert_eq!(failure.message(), "handler panicked");
    }

    #[test]
    fn test_into_response_carries_extension() {
        let response = Failure::new("boom")
            .with_status(StatusCode::BAD_GATEWAY)
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let failure = response.extensions().get::<Failure>().unwrap();
        assert_eq!(failure.message(), "boom");
    }
}
