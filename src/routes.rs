//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (applied in order)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  Error Catcher   │ ← Failures and panics below become negotiated 5xx
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │    Client IP     │ ← Sets the client IP attribute (if configured)
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │    IP Filter     │ ← 403 if not allowed (if configured)
//! └────────┬─────────┘
//!          │
//!          ▼
//!      Handler
//! ```
//!
//! # Routes
//!
//! - `/health` - Health check
//! - `/fail`, `/panic` - Deliberate failures

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::error::GuardResult;
use crate::handlers;
use crate::middleware::{ClientIpLayer, DefaultResponseFactory, ErrorCatcherLayer, IpFilterLayer};

/// Build the application router with all routes and middleware configured.
///
/// # Middleware Configuration
///
/// - **IP Filter**: Enabled if `ip_allowed_ranges` is non-empty
/// - **Client IP**: Enabled if an attribute or trusted proxies are configured
/// - **Error Catcher**: Always on, verbosity from `error_verbose`
///
/// # Errors
///
/// Returns `GuardError::Config` if an IP range in the configuration is invalid.
pub fn build_router(config: &Config) -> GuardResult<Router> {
    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/fail", get(handlers::always_fail))
        .route("/panic", get(handlers::always_panic));

    // =========================================================================
    // Apply Middleware Stack (order matters - applied bottom to top)
    // =========================================================================

    // 1. IP filter (innermost)
    if config.ip_filter_enabled() {
        let ranges = config.allowed_ranges()?;
        let rules = ranges.len();
        let mut filter = IpFilterLayer::new(Arc::new(ranges), Arc::new(DefaultResponseFactory));
        if let Some(name) = config.client_ip_attribute() {
            filter = filter.with_attribute(name);
        }
        info!(
            ranges = rules,
            attribute = filter.attribute(),
            "IP filter enabled"
        );
        router = router.layer(filter);
    } else {
        info!("IP filter disabled (IP_ALLOWED_RANGES empty)");
    }

    // 2. Client IP resolution
    if let Some(name) = config.client_ip_attribute() {
        let trusted = config.trusted_proxy_ranges()?;
        info!(
            attribute = name,
            trusted_proxies = trusted.len(),
            "Client IP resolution enabled"
        );
        router = router.layer(ClientIpLayer::new(trusted).with_attribute(name));
    }

    // 3. Error catcher
    info!(verbose = config.error_verbose, "Error catcher enabled");
    router = router.layer(ErrorCatcherLayer::with_defaults(config.error_verbose));

    // 4. Tracing (outermost)
    router = router.layer(TraceLayer::new_for_http());

    Ok(router)
}
