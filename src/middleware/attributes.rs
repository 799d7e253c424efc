//! Named request attributes.
//!
//! Middleware earlier in the stack can attach string values to a request under
//! a name, and later middleware can read them back. They live in the request
//! extensions as a single [`RequestAttributes`] map.
//!
//! ```rust,ignore
//! req.set_attribute("client_ip", "203.0.113.50");
//! assert_eq!(req.attribute("client_ip"), Some("203.0.113.50"));
//! ```

use std::collections::HashMap;

use axum::http::Request;

/// Attribute map stored in request extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestAttributes(HashMap<String, String>);

impl RequestAttributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Extension trait to read and write request attributes.
pub trait RequestAttributesExt {
    /// Get the attribute called `name`.
    fn attribute(&self, name: &str) -> Option<&str>;

    /// Set the attribute called `name`, replacing any previous value.
    fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>);
}

impl<B> RequestAttributesExt for Request<B> {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.extensions()
            .get::<RequestAttributes>()
            .and_then(|attributes| attributes.get(name))
    }

    fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.extensions_mut()
            .get_or_insert_default::<RequestAttributes>()
            .insert(name, value);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_attribute_missing() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(req.attribute("clientIpAttr"), None);
    }

    #[test]
    fn test_set_and_get() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        req.set_attribute("clientIpAttr", "1.1.1.1");
        req.set_attribute("other", "x");
        assert_eq!(req.attribute("clientIpAttr"), Some("1.1.1.1"));
        assert_eq!(req.extensions().get::<RequestAttributes>().unwrap().len(), 2);
    }

    #[test]
    fn test_set_replaces() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        req.set_attribute("a", "1");
        req.set_attribute("a", "2");
        assert_eq!(req.attribute("a"), Some("2"));
    }
}
