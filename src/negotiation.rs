//! `Accept` header parsing and ranking.
//!
//! # Ranking
//!
//! Entries are ordered by:
//!
//! 1. quality weight, highest first
//! 2. specificity, most exact first (`text/html;v=2` > `text/html` > `text/*` > `*/*`)
//! 3. position in the header, earliest first
//!
//! # Leniency
//!
//! Clients send all kinds of Accept headers, so parsing never fails:
//!
//! - a missing, unparseable or out-of-range `q` counts as `1.0`
//! - entries whose media range cannot be read are skipped
//! - a header with no readable entries behaves like `*/*`
//! - `q=0` marks a range as not acceptable and drops it

use axum::http::HeaderMap;
use axum::http::header::ACCEPT;

use crate::media_type::{MediaTypePattern, Specificity};

/// Weight applied when an entry has no usable `q` parameter.
pub const DEFAULT_QUALITY: f32 = 1.0;

/// One parsed media range from an `Accept` header.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptEntry {
    /// Media range with the `q` parameter removed.
    pub range: MediaTypePattern,
    /// Quality weight in `(0.0, 1.0]`.
    pub quality: f32,
    /// Zero-based position across all Accept values.
    pub position: usize,
}

impl AcceptEntry {
    pub fn specificity(&self) -> Specificity {
        self.range.specificity()
    }
}

/// Ranked list of Accept entries for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptList {
    entries: Vec<AcceptEntry>,
}

impl AcceptList {
    /// Parse one or more Accept header values.
    ///
    /// Several values are treated as if they were joined with `,`.
    pub fn parse<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut entries = Vec::new();
        let mut readable = 0usize;

        let tokens = values
            .into_iter()
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|token| !token.is_empty());

        for token in tokens {
            let Some((range, raw_quality)) = MediaTypePattern::parse_media_range(token) else {
                continue;
            };
            let position = readable;
            readable += 1;

            let quality = parse_quality(raw_quality.as_deref());
            if quality == 0.0 {
                continue;
            }

            entries.push(AcceptEntry {
                range,
                quality,
                position,
            });
        }

        if readable == 0 {
            return Self::any();
        }

        // Stable sort keeps header order for equal quality and specificity.
        entries.sort_by(|a, b| {
            b.quality
                .total_cmp(&a.quality)
                .then_with(|| b.specificity().cmp(&a.specificity()))
        });

        Self { entries }
    }

    /// Parse every `Accept` value present in `headers`.
    ///
    /// Values that are not valid UTF-8 are ignored.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self::parse(
            headers
                .get_all(ACCEPT)
                .iter()
                .filter_map(|value| value.to_str().ok()),
        )
    }

    /// The list used when the client expressed no preference: `*/*` at 1.0.
    pub fn any() -> Self {
        Self {
            entries: vec![AcceptEntry {
                range: MediaTypePattern::any(),
                quality: DEFAULT_QUALITY,
                position: 0,
            }],
        }
    }

    /// Entries in ranked order.
    pub fn entries(&self) -> &[AcceptEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AcceptEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a AcceptList {
    type Item = &'a AcceptEntry;
    type IntoIter = std::slice::Iter<'a, AcceptEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn parse_quality(raw: Option<&str>) -> f32 {
    match raw.map(|q| q.trim().parse::<f32>()) {
        Some(Ok(q)) if q.is_finite() && (0.0..=1.0).contains(&q) => q,
        _ => DEFAULT_QUALITY,
    }
}
