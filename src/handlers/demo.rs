//! Endpoints that fail on purpose, to show the error catcher at work.
//!
//! - `GET /fail` - returns a [`Failure`] built from a chained error
//! - `GET /panic` - panics inside the handler

use axum::http::StatusCode;
use thiserror::Error;
use tracing::instrument;

use crate::failure::Failure;

#[derive(Error, Debug)]
#[error("Inventory lookup failed for order {order}")]
struct LookupError {
    order: u32,
    #[source]
    source: std::io::Error,
}

/// Always fails with `503 Service Unavailable` and a two-level cause chain.
#[instrument]
pub async fn always_fail() -> Result<&'static str, Failure> {
    let err = LookupError {
        order: 42,
        source: std::io::Error::new(std::io::ErrorKind::TimedOut, "upstream timed out"),
    };
    Err(Failure::from(err).with_status(StatusCode::SERVICE_UNAVAILABLE))
}

/// Always panics.
#[instrument]
pub async fn always_panic() -> &'static str {
    panic!("Deliberate panic from /panic")
}
