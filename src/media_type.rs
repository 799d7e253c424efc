//! Media type patterns used to bind error renderers.
//!
//! A pattern is `type/subtype` with optional `;name=value` parameters, where
//! `*/*` and `type/*` act as wildcards:
//!
//! ```text
//! text/html
//! text/html;version=2
//! application/*
//! */*
//! ```
//!
//! Registration uses [`MediaTypePattern::parse`], which is strict: anything
//! outside the grammar is rejected with [`GuardError::InvalidPattern`].
//! Accept headers go through [`MediaTypePattern::parse_media_range`], which is
//! lenient about parameters and also reads a bare `*` as `*/*`.
//!
//! Type, subtype and parameter names are case-insensitive and stored in
//! lowercase. Parameter values keep their case; quoted values are unquoted.

use std::fmt;

use crate::error::{GuardError, GuardResult};

/// Wildcard token for type or subtype.
pub const WILDCARD: &str = "*";

/// How narrowly a pattern selects media types.
///
/// Ordered from most general to most exact so that `Ord` can rank candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Specificity {
    /// `*/*`
    Any = 0,
    /// `type/*`
    AnySubtype = 1,
    /// `type/subtype`
    Exact = 2,
    /// `type/subtype;param=value`
    Parameterized = 3,
}

/// A validated, normalized media type pattern.
///
/// Equality ignores case in type, subtype and parameter names, and ignores
/// parameter order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaTypePattern {
    main_type: String,
    subtype: String,
    /// Sorted by name.
    params: Vec<(String, String)>,
}

impl MediaTypePattern {
    /// Parse a pattern for renderer registration.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::InvalidPattern`] when the input does not match the
    /// `type/subtype[;name=value]*` grammar, uses `*` anywhere other than as a
    /// whole type or subtype, pairs a wildcard type with a concrete subtype, or
    /// declares the reserved `q` parameter.
    pub fn parse(input: &str) -> GuardResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(GuardError::invalid_pattern(input, "pattern is empty"));
        }

        let mut segments = trimmed.split(';');
        let range = segments.next().unwrap_or_default();
        let (main_type, subtype) =
            parse_type_pair(range).map_err(|reason| GuardError::invalid_pattern(input, reason))?;

        let mut params = Vec::new();
        for segment in segments {
            let (name, value) = parse_param(segment)
                .map_err(|reason| GuardError::invalid_pattern(input, reason))?;
            if name == "q" {
                return Err(GuardError::invalid_pattern(
                    input,
                    "'q' is reserved for Accept weights",
                ));
            }
            if main_type == WILDCARD || subtype == WILDCARD {
                return Err(GuardError::invalid_pattern(
                    input,
                    "wildcard patterns cannot carry parameters",
                ));
            }
            params.push((name, value));
        }

        Ok(Self::from_parts(main_type, subtype, params))
    }

    /// Parse one media range from an `Accept` header.
    ///
    /// Returns the range together with its raw `q` value (if any). Malformed
    /// parameters are skipped rather than rejecting the whole range; a range
    /// whose type/subtype cannot be read yields `None`.
    pub fn parse_media_range(input: &str) -> Option<(Self, Option<String>)> {
        let mut segments = input.trim().split(';');
        let range = segments.next().unwrap_or_default().trim();

        let (main_type, subtype) = if range == WILDCARD {
            (WILDCARD.to_string(), WILDCARD.to_string())
        } else {
            parse_type_pair(range).ok()?
        };

        let mut params = Vec::new();
        let mut quality = None;
        for segment in segments {
            let Ok((name, value)) = parse_param(segment) else {
                continue;
            };
            if name == "q" {
                quality = Some(value);
            } else {
                params.push((name, value));
            }
        }

        Some((Self::from_parts(main_type, subtype, params), quality))
    }

    fn from_parts(main_type: String, subtype: String, mut params: Vec<(String, String)>) -> Self {
        params.sort_by(|a, b| a.0.cmp(&b.0));
        params.dedup_by(|later, earlier| later.0 == earlier.0);
        Self {
            main_type,
            subtype,
            params,
        }
    }

    /// The `*/*` pattern.
    pub fn any() -> Self {
        Self {
            main_type: WILDCARD.to_string(),
            subtype: WILDCARD.to_string(),
            params: Vec::new(),
        }
    }

    pub fn main_type(&self) -> &str {
        &self.main_type
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// Parameters, sorted by name.
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// `type/subtype` without parameters.
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main_type, self.subtype)
    }

    pub fn is_any(&self) -> bool {
        self.main_type == WILDCARD && self.subtype == WILDCARD
    }

    pub fn specificity(&self) -> Specificity {
        if self.main_type == WILDCARD {
            Specificity::Any
        } else if self.subtype == WILDCARD {
            Specificity::AnySubtype
        } else if self.params.is_empty() {
            Specificity::Exact
        } else {
            Specificity::Parameterized
        }
    }

    /// Whether type and subtype agree, treating `*` on either side as a match.
    pub fn essence_matches(&self, other: &Self) -> bool {
        let type_ok = self.main_type == WILDCARD
            || other.main_type == WILDCARD
            || self.main_type == other.main_type;
        let subtype_ok =
            self.subtype == WILDCARD || other.subtype == WILDCARD || self.subtype == other.subtype;
        type_ok && subtype_ok
    }
}

impl fmt::Display for MediaTypePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.subtype)?;
        for (name, value) in &self.params {
            if value.chars().all(is_tchar) {
                write!(f, ";{name}={value}")?;
            } else {
                write!(f, ";{name}=\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for MediaTypePattern {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// RFC 9110 `tchar`.
fn is_tchar(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_tchar)
}

/// Parse `type/subtype`, returning lowercase parts.
fn parse_type_pair(range: &str) -> Result<(String, String), &'static str> {
    let range = range.trim();
    let (main_type, subtype) = range.split_once('/').ok_or("missing '/' separator")?;

    for part in [main_type, subtype] {
        if part != WILDCARD && (!is_token(part) || part.contains('*')) {
            return Err("type and subtype must be tokens or '*'");
        }
    }
    if main_type == WILDCARD && subtype != WILDCARD {
        return Err("a wildcard type requires a wildcard subtype");
    }

    Ok((main_type.to_ascii_lowercase(), subtype.to_ascii_lowercase()))
}

/// Parse `name=value` with optional whitespace around the segment.
fn parse_param(segment: &str) -> Result<(String, String), &'static str> {
    let (name, value) = segment
        .trim()
        .split_once('=')
        .ok_or("parameters must be written as name=value")?;
    let name = name.trim();
    let value = value.trim();

    if !is_token(name) {
        return Err("parameter name must be a token");
    }

    let value = if let Some(quoted) = value.strip_prefix('"') {
        let inner = quoted
            .strip_suffix('"')
            .ok_or("unterminated quoted parameter value")?;
        unquote(inner)
    } else if is_token(value) {
        value.to_string()
    } else {
        return Err("parameter value must be a token or quoted string");
    };

    Ok((name.to_ascii_lowercase(), value))
}

fn unquote(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}
