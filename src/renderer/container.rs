use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{
    ErrorRenderer, HtmlRenderer, JsonRenderer, PlainTextRenderer, RendererSource, XmlRenderer,
    keys,
};
use crate::error::{GuardError, GuardResult};

/// Map-backed [`RendererSource`].
#[derive(Clone, Default)]
pub struct RendererContainer {
    renderers: HashMap<String, Arc<dyn ErrorRenderer>>,
}

impl RendererContainer {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Container holding the built-in renderers under [`keys`].
    pub fn with_defaults(verbose: bool) -> Self {
        Self::new()
            .with(keys::HTML, Arc::new(HtmlRenderer::new(verbose)))
            .with(keys::JSON, Arc::new(JsonRenderer::new(verbose)))
            .with(keys::XML, Arc::new(XmlRenderer::new(verbose)))
            .with(keys::PLAIN, Arc::new(PlainTextRenderer::new(verbose)))
    }

    /// Add or replace the renderer stored under `key`.
    pub fn with(mut self, key: impl Into<String>, renderer: Arc<dyn ErrorRenderer>) -> Self {
        self.renderers.insert(key.into(), renderer);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.renderers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

impl RendererSource for RendererContainer {
    fn resolve(&self, key: &str) -> GuardResult<Arc<dyn ErrorRenderer>> {
        self.renderers
            .get(key)
            .cloned()
            .ok_or_else(|| GuardError::RendererNotFound(key.to_string()))
    }
}

impl fmt::Debug for RendererContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.renderers.keys().collect();
        keys.sort();
        f.debug_struct("RendererContainer")
            .field("keys", &keys)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_register_all_keys() {
        let container = RendererContainer::with_defaults(false);
        for key in [keys::HTML, keys::JSON, keys::XML, keys::PLAIN] {
            assert!(container.contains(key), "missing {key}");
            assert!(container.resolve(key).is_ok());
        }
        assert_eq!(container.len(), 4);
    }

    #[test]
    fn test_unknown_key() {
        let err = RendererContainer::new().resolve("InvalidRendererClass").err().unwrap();
        assert_eq!(err, GuardError::RendererNotFound("InvalidRendererClass".to_string()));
    }

    #[test]
    fn test_with_replaces() {
        let container = RendererContainer::new()
            .with("r", Arc::new(PlainTextRenderer::new(false)))
            .with("r", Arc::new(JsonRenderer::new(false)));
        assert_eq!(container.len(), 1);
    }
}
