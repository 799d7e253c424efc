//! # webguard
//!
//! Tower middleware for axum applications:
//!
//! - **Error Catcher**: Handler errors, service errors and panics become a
//!   5xx response rendered as HTML, JSON, XML or plain text depending on the
//!   request's `Accept` header
//! - **IP Filter**: Allow-list of addresses, CIDR blocks and named ranges,
//!   answering everyone else with 403
//! - **Client IP**: Client address resolution behind trusted proxies
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ErrorCatcherLayer                                          │
//! │    AcceptList ──► RendererRegistry ──► RendererSource       │
//! │                        │ no match / failure                 │
//! │                        ▼                                    │
//! │                  ErrorHandler                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ClientIpLayer ──► request attribute                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  IpFilterLayer ──► IpValidator (IpRanges) / ResponseFactory │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers                                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//!
//! use axum::Router;
//! use axum::routing::get;
//! use webguard::middleware::{ErrorCatcherLayer, IpFilterLayer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catcher = ErrorCatcherLayer::with_defaults(false)
//!         .with_renderer("application/problem+json", "json")?;
//!     let filter = IpFilterLayer::from_ranges(&["!192.168.1.13", "192.168.1.0/24"])?;
//!
//!     let app = Router::new()
//!         .route("/", get(|| async { "hello" }))
//!         .layer(filter)
//!         .layer(catcher);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Demo Server Configuration
//!
//! ```bash
//! IP_ALLOWED_RANGES='!system,any' ERROR_VERBOSE=true cargo run
//! ```

pub mod config;
pub mod error;
pub mod error_handler;
pub mod failure;
pub mod handlers;
pub mod media_type;
pub mod metrics;
pub mod middleware;
pub mod negotiation;
pub mod renderer;
pub mod routes;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use error::{GuardError, GuardResult};
pub use error_handler::{DefaultErrorHandler, ErrorHandler, HandledError};
pub use failure::{Failure, FailureOrigin};
pub use media_type::MediaTypePattern;
pub use middleware::{ClientIpLayer, ErrorCatcherLayer, IpFilterLayer, IpRanges};
pub use negotiation::AcceptList;
pub use routes::build_router;
