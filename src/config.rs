//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with sensible defaults
//! for development. In production, configure via environment variables or a `.env` file.
//!
//! # Error Pages
//!
//! - `ERROR_VERBOSE`: Include failure messages and causes in error bodies (default: false)
//!
//! # Address Filtering
//!
//! - `IP_ALLOWED_RANGES`: Comma-separated allow-list (addresses, CIDR blocks,
//!   `!`-negated entries, aliases such as `private`). Empty disables the filter.
//! - `IP_FILTER_ATTRIBUTE`: Request attribute the filter reads the client
//!   address from, instead of the connection
//! - `TRUSTED_PROXIES`: Ranges whose `X-Forwarded-For` / `X-Real-IP` headers are honored

use std::env;
use std::net::SocketAddr;

use crate::error::{GuardError, GuardResult};
use crate::middleware::{DEFAULT_CLIENT_IP_ATTRIBUTE, IpRanges};

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    // =========================================================================
    // Error Catcher Configuration
    // =========================================================================
    /// Expose failure details in rendered error bodies (default: false)
    pub error_verbose: bool,

    // =========================================================================
    // IP Filter Configuration
    // =========================================================================
    /// Allowed client ranges. Empty disables the IP filter.
    pub ip_allowed_ranges: Vec<String>,

    /// Attribute holding the client address (default: none, use the connection)
    pub ip_filter_attribute: Option<String>,

    /// Trusted proxy ranges for client IP resolution.
    ///
    /// Format: Comma-separated CIDR notation (e.g., "10.0.0.0/8,172.16.0.0/12")
    /// Default: Empty (forwarding headers are never trusted)
    pub trusted_proxies: Vec<String>,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `GuardError::Config` if any configuration value is invalid
    /// (e.g., non-numeric PORT value, malformed IP range).
    pub fn from_env() -> GuardResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 3000)?,

            // Error catcher
            error_verbose: Self::parse_env("ERROR_VERBOSE", false)?,

            // IP filter
            ip_allowed_ranges: Self::parse_list("IP_ALLOWED_RANGES"),
            ip_filter_attribute: env::var("IP_FILTER_ATTRIBUTE")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            trusted_proxies: Self::parse_list("TRUSTED_PROXIES"),

            // Observability
            metrics_port: Self::parse_env("METRICS_PORT", 9090)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `GuardError::Config` naming the offending variable.
    pub fn validate(&self) -> GuardResult<()> {
        self.allowed_ranges()?;
        self.trusted_proxy_ranges()?;
        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if the IP filter is enabled.
    pub fn ip_filter_enabled(&self) -> bool {
        !self.ip_allowed_ranges.is_empty()
    }

    /// Check if client IPs are resolved from forwarding headers.
    pub fn proxy_resolution_enabled(&self) -> bool {
        !self.trusted_proxies.is_empty()
    }

    /// Attribute the resolved client address is stored under.
    ///
    /// `None` when neither an attribute nor trusted proxies are configured; the
    /// filter then reads the connection address directly.
    pub fn client_ip_attribute(&self) -> Option<&str> {
        match &self.ip_filter_attribute {
            Some(name) => Some(name.as_str()),
            None if self.proxy_resolution_enabled() => Some(DEFAULT_CLIENT_IP_ATTRIBUTE),
            None => None,
        }
    }

    /// Parsed `IP_ALLOWED_RANGES`.
    pub fn allowed_ranges(&self) -> GuardResult<IpRanges> {
        IpRanges::new(&self.ip_allowed_ranges)
            .map_err(|e| GuardError::Config(format!("IP_ALLOWED_RANGES: {e}")))
    }

    /// Parsed `TRUSTED_PROXIES`.
    pub fn trusted_proxy_ranges(&self) -> GuardResult<IpRanges> {
        IpRanges::new(&self.trusted_proxies)
            .map_err(|e| GuardError::Config(format!("TRUSTED_PROXIES: {e}")))
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_enabled()
            .then(|| SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> GuardResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .trim()
                .parse()
                .map_err(|e| GuardError::Config(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse a comma-separated environment variable, dropping empty entries.
    fn parse_list(name: &str) -> Vec<String> {
        env::var(name)
            .map(|s| split_list(&s))
            .unwrap_or_default()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            error_verbose: false,
            ip_allowed_ranges: vec![],
            ip_filter_attribute: None,
            trusted_proxies: vec![],
            metrics_port: 9090,
        }
    }
}
