//! Ordered mapping from media type patterns to renderer keys.
//!
//! # Negotiation
//!
//! [`RendererRegistry::negotiate`] walks the ranked Accept entries and returns
//! the first binding that matches one of them:
//!
//! - a parameterized binding (`text/html;version=2`) only matches an entry with
//!   the same type, subtype and parameters
//! - any other binding matches on type and subtype, with `*` on either side
//!   matching anything, and ignores the entry's parameters
//!
//! When several bindings match the same entry, an exact match wins, then the
//! more specific binding, then the one registered last.
//!
//! A `*/*` binding only takes part in this walk for an entry that is exactly
//! `*/*`. Otherwise it is used only when no entry matched anything else.

use crate::error::GuardResult;
use crate::media_type::MediaTypePattern;
use crate::negotiation::{AcceptEntry, AcceptList};

/// One pattern → renderer key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererBinding {
    pattern: MediaTypePattern,
    key: String,
}

impl RendererBinding {
    pub fn pattern(&self) -> &MediaTypePattern {
        &self.pattern
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Rank of this binding for `entry`, or `None` if it does not match.
    fn rank_for(&self, entry: &AcceptEntry) -> Option<(bool, crate::media_type::Specificity)> {
        let exact = self.pattern == entry.range;
        let matches = if self.pattern.is_any() {
            exact
        } else if self.pattern.params().is_empty() {
            self.pattern.essence_matches(&entry.range)
        } else {
            exact
        };
        matches.then(|| (exact, self.pattern.specificity()))
    }
}

/// Registration-ordered renderer bindings.
///
/// Mutating methods consume the registry and hand back the updated value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RendererRegistry {
    bindings: Vec<RendererBinding>,
}

impl RendererRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `pattern` to `key`.
    ///
    /// An existing binding for an equal pattern is replaced and the new one
    /// counts as the most recently registered.
    ///
    /// # Errors
    ///
    /// Returns [`crate::GuardError::InvalidPattern`] if `pattern` is malformed.
    pub fn register(self, pattern: &str, key: impl Into<String>) -> GuardResult<Self> {
        let pattern = MediaTypePattern::parse(pattern)?;
        Ok(self.register_pattern(pattern, key))
    }

    /// Bind an already parsed pattern.
    pub fn register_pattern(mut self, pattern: MediaTypePattern, key: impl Into<String>) -> Self {
        self.bindings.retain(|binding| binding.pattern != pattern);
        self.bindings.push(RendererBinding {
            pattern,
            key: key.into(),
        });
        self
    }

    /// Drop every binding, then bind `pattern` to `key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::GuardError::InvalidPattern`] if `pattern` is malformed.
    /// The registry is consumed either way.
    pub fn register_exclusive(self, pattern: &str, key: impl Into<String>) -> GuardResult<Self> {
        Self::new().register(pattern, key)
    }

    /// Drop every binding.
    pub fn clear(mut self) -> Self {
        self.bindings.clear();
        self
    }

    /// Drop the binding for `pattern`, if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`crate::GuardError::InvalidPattern`] if `pattern` is malformed.
    pub fn clear_pattern(mut self, pattern: &str) -> GuardResult<Self> {
        let pattern = MediaTypePattern::parse(pattern)?;
        self.bindings.retain(|binding| binding.pattern != pattern);
        Ok(self)
    }

    /// Bindings in registration order.
    pub fn bindings(&self) -> &[RendererBinding] {
        &self.bindings
    }

    /// Key bound to exactly `pattern`.
    pub fn key_for(&self, pattern: &MediaTypePattern) -> Option<&str> {
        self.bindings
            .iter()
            .find(|binding| &binding.pattern == pattern)
            .map(RendererBinding::key)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Pick the binding for a ranked Accept list; `None` means no match.
    pub fn negotiate(&self, accept: &AcceptList) -> Option<&RendererBinding> {
        for entry in accept {
            let best = self
                .bindings
                .iter()
                .enumerate()
                .filter_map(|(index, binding)| {
                    binding
                        .rank_for(entry)
                        .map(|(exact, specificity)| ((exact, specificity, index), binding))
                })
                .max_by_key(|(rank, _)| *rank)
                .map(|(_, binding)| binding);

            if best.is_some() {
                return best;
            }
        }

        if accept.is_empty() {
            return None;
        }

        self.bindings.iter().find(|binding| binding.pattern.is_any())
    }
}
