//! IP range matching for the IP filter and trusted proxy checks.
//!
//! # Range Syntax
//!
//! Each entry is one of:
//!
//! - a single address: `1.1.1.1`, `::1`
//! - a CIDR block: `10.0.0.0/8`, `2001:db8::/32`
//! - a named alias (see below)
//! - any of the above prefixed with `!` to deny instead of allow
//!
//! Entries are checked in order and the first one containing the address
//! decides. An address no entry contains is denied.
//!
//! ```text
//! ["!192.168.1.13", "192.168.1.0/24"]   everyone on the /24 except .13
//! ["!system", "any"]                    everything except reserved ranges
//! ```
//!
//! # Aliases
//!
//! | Alias           | Expands to                                              |
//! |-----------------|---------------------------------------------------------|
//! | `*`, `any`      | `0.0.0.0/0`, `::/0`                                     |
//! | `private`       | `10.0.0.0/8`, `172.16.0.0/12`, `192.168.0.0/16`, `fd00::/8` |
//! | `multicast`     | `224.0.0.0/4`, `ff00::/8`                               |
//! | `linklocal`     | `169.254.0.0/16`, `fe80::/10`                           |
//! | `localhost`     | `127.0.0.0/8`, `::1`                                    |
//! | `documentation` | `192.0.2.0/24`, `198.51.100.0/24`, `203.0.113.0/24`, `2001:db8::/32` |
//! | `system`        | `multicast`, `linklocal`, `localhost`, `documentation`  |

use std::net::{IpAddr, SocketAddr};

use tracing::debug;

use crate::error::{GuardError, GuardResult};

/// Parsed CIDR network range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CidrRange {
    /// Network address
    network: IpAddr,
    /// Prefix length (e.g., 24 for /24)
    prefix_len: u8,
}

impl CidrRange {
    /// Parse a CIDR notation string (e.g., "10.0.0.0/8" or "::1/128").
    ///
    /// A bare address is an implicit /32 or /128. Returns `None` if the format
    /// is invalid.
    pub fn parse(cidr: &str) -> Option<Self> {
        let cidr = cidr.trim();

        let (ip, prefix_len) = match cidr.split_once('/') {
            Some((ip, prefix)) => {
                let ip: IpAddr = ip.parse().ok()?;
                let prefix_len: u8 = prefix.parse().ok()?;
                (ip, prefix_len)
            }
            None => {
                let ip: IpAddr = cidr.parse().ok()?;
                (ip, max_prefix(&ip))
            }
        };

        if prefix_len > max_prefix(&ip) {
            return None;
        }

        // Lookups see IPv4-mapped addresses as IPv4, so store mapped
        // networks that lie inside ::ffff:0:0/96 the same way.
        let (network, prefix_len) = match ip {
            IpAddr::V6(v6) if prefix_len >= 96 => match v6.to_ipv4_mapped() {
                Some(v4) => (IpAddr::V4(v4), prefix_len - 96),
                None => (ip, prefix_len),
            },
            _ => (ip, prefix_len),
        };

        Some(Self {
            network,
            prefix_len,
        })
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Check if an IP address is contained within this CIDR range.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (&self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let mask = if self.prefix_len == 0 {
                    0
                } else {
                    u32::MAX << (32 - self.prefix_len)
                };
                (u32::from(*net) & mask) == (u32::from(*addr) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let mask = if self.prefix_len == 0 {
                    0
                } else {
                    u128::MAX << (128 - self.prefix_len)
                };
                (u128::from(*net) & mask) == (u128::from(*addr) & mask)
            }
            // IPv4 and IPv6 don't match
            _ => false,
        }
    }
}

fn max_prefix(ip: &IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn alias(name: &str) -> Option<&'static [&'static str]> {
    let expansion: &'static [&'static str] = match name {
        "*" | "any" => &["0.0.0.0/0", "::/0"],
        "private" => &["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16", "fd00::/8"],
        "multicast" => &["224.0.0.0/4", "ff00::/8"],
        "linklocal" => &["169.254.0.0/16", "fe80::/10"],
        "localhost" => &["127.0.0.0/8", "::1"],
        "documentation" => &[
            "192.0.2.0/24",
            "198.51.100.0/24",
            "203.0.113.0/24",
            "2001:db8::/32",
        ],
        "system" => &["multicast", "linklocal", "localhost", "documentation"],
        _ => return None,
    };
    Some(expansion)
}

/// Expand aliases recursively into CIDR blocks.
fn expand(entry: &str, blocks: &mut Vec<CidrRange>) -> Option<()> {
    if let Some(members) = alias(entry) {
        for member in members {
            expand(member, blocks)?;
        }
        return Some(());
    }
    blocks.push(CidrRange::parse(entry)?);
    Some(())
}

#[derive(Debug, Clone)]
struct RangeRule {
    negated: bool,
    blocks: Vec<CidrRange>,
}

/// Ordered allow/deny rules over IP addresses.
#[derive(Debug, Clone, Default)]
pub struct IpRanges {
    rules: Vec<RangeRule>,
}

impl IpRanges {
    /// Parse range entries.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::InvalidIpRange`] for the first entry that is not
    /// an address, CIDR block or known alias.
    pub fn new<S: AsRef<str>>(entries: &[S]) -> GuardResult<Self> {
        let mut rules = Vec::with_capacity(entries.len());

        for entry in entries {
            let raw = entry.as_ref().trim();
            let (negated, body) = match raw.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, raw),
            };

            let mut blocks = Vec::new();
            expand(&body.to_ascii_lowercase(), &mut blocks)
                .ok_or_else(|| GuardError::InvalidIpRange(raw.to_string()))?;

            rules.push(RangeRule { negated, blocks });
        }

        if !rules.is_empty() {
            debug!(count = rules.len(), "IP ranges configured");
        }

        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether `ip` is allowed. The first rule containing it decides.
    pub fn contains(&self, ip: IpAddr) -> bool {
        let ip = ip.to_canonical();
        self.rules
            .iter()
            .find(|rule| rule.blocks.iter().any(|block| block.contains(&ip)))
            .is_some_and(|rule| !rule.negated)
    }

    /// String form of [`contains`](Self::contains); unparseable input is denied.
    pub fn contains_str(&self, address: &str) -> bool {
        parse_address(address).is_some_and(|ip| self.contains(ip))
    }
}

/// Parse an address as found in headers or attributes.
///
/// Accepts bare IPv4/IPv6 addresses and socket addresses (`1.2.3.4:80`,
/// `[::1]:80`). IPv4-mapped IPv6 addresses are returned as IPv4.
pub fn parse_address(address: &str) -> Option<IpAddr> {
    let address = address.trim();
    let ip = address
        .parse::<IpAddr>()
        .ok()
        .or_else(|| address.parse::<SocketAddr>().ok().map(|addr| addr.ip()))?;
    Some(ip.to_canonical())
}
