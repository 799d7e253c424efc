//! Prometheus metrics for the middleware.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `webguard_errors_caught_total` - Failures turned into error responses
//!   (labels: origin, renderer)
//! - `webguard_ip_denied_total` - Requests rejected by the IP filter (label: reason)
//! - `webguard_ip_allowed_total` - Requests let through by the IP filter
//!
//! # Usage
//!
//! ```rust,ignore
//! use webguard::metrics::try_init_metrics;
//!
//! // Initialize metrics (call once at startup)
//! try_init_metrics("0.0.0.0:9090".parse()?);
//! ```
//!
//! Recording functions are safe to call without an installed exporter; the
//! values are simply dropped.

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const ERRORS_CAUGHT_TOTAL: &str = "webguard_errors_caught_total";
    pub const IP_DENIED_TOTAL: &str = "webguard_ip_denied_total";
    pub const IP_ALLOWED_TOTAL: &str = "webguard_ip_allowed_total";
}

/// Renderer label used when the default error handler produced the body.
pub const DEFAULT_RENDERER_LABEL: &str = "default";

/// Why the IP filter rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No client address could be determined.
    NoAddress,
    /// The address is outside the allowed ranges.
    NotAllowed,
}

impl DenyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::NoAddress => "no_address",
            DenyReason::NotAllowed => "not_allowed",
        }
    }
}

/// Initialize the Prometheus metrics exporter.
///
/// Starts the Prometheus HTTP listener on `metrics_addr` and registers metric
/// descriptions.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::ERRORS_CAUGHT_TOTAL,
        "Total number of downstream failures converted into error responses"
    );
    describe_counter!(
        names::IP_DENIED_TOTAL,
        "Total number of requests denied by the IP filter"
    );
    describe_counter!(
        names::IP_ALLOWED_TOTAL,
        "Total number of requests allowed by the IP filter"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Record a failure handled by the error catcher.
pub fn record_error_caught(origin: &str, renderer: &str) {
    counter!(names::ERRORS_CAUGHT_TOTAL, "origin" => origin.to_string(), "renderer" => renderer.to_string())
        .increment(1);
}

/// Record a request rejected by the IP filter.
pub fn record_ip_denied(reason: DenyReason) {
    counter!(names::IP_DENIED_TOTAL, "reason" => reason.as_str()).increment(1);
}

/// Record a request allowed by the IP filter.
pub fn record_ip_allowed() {
    counter!(names::IP_ALLOWED_TOTAL).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // These only check that recording without an exporter does not panic.

    #[test]
    fn test_record_error_caught() {
        record_error_caught("panic", DEFAULT_RENDERER_LABEL);
    }

    #[test]
    fn test_record_ip_decisions() {
        record_ip_denied(DenyReason::NoAddress);
        record_ip_denied(DenyReason::NotAllowed);
        record_ip_allowed();
    }
}
