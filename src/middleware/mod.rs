//! HTTP middleware for error handling and client address filtering.
//!
//! - **Error Catcher**: Turns handler errors, service errors and panics into
//!   error responses whose format follows the request's `Accept` header
//! - **IP Filter**: Rejects requests from addresses outside an allow-list
//! - **Client IP**: Resolves the client address behind trusted proxies and
//!   stores it as a request attribute
//!
//! # Architecture
//!
//! ```text
//! Request → Error Catcher → Client IP → IP Filter → Handler → Response
//!                ↓              ↓            ↓
//!        5xx in negotiated  client_ip   403 Forbidden
//!             format        attribute
//! ```

pub mod attributes;
pub mod client_ip;
pub mod error_catcher;
pub mod ip_filter;
pub mod ip_ranges;

pub use attributes::{RequestAttributes, RequestAttributesExt};
pub use client_ip::{ClientIpLayer, ClientIpService, DEFAULT_CLIENT_IP_ATTRIBUTE};
pub use error_catcher::{DEFAULT_BINDINGS, ErrorCatcherLayer, ErrorCatcherService};
pub use ip_filter::{
    DefaultResponseFactory, IpFilterLayer, IpFilterService, IpValidator, ResponseFactory,
};
pub use ip_ranges::{CidrRange, IpRanges, parse_address};
