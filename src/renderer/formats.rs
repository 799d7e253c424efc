//! Built-in renderers.
//!
//! Every renderer has two modes. The default mode shows a generic message so
//! nothing about the server leaks to clients. Verbose mode, meant for
//! development, adds the failure origin, the cause chain and the request line.

use serde::Serialize;

use super::{ErrorRenderer, RenderError, RenderedError, RequestContext};
use crate::failure::Failure;

/// Message shown to clients when details are hidden.
pub const GENERIC_MESSAGE: &str = "An internal server error occurred.";

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
pub const PLAIN_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

fn visible_message(failure: &Failure, verbose: bool) -> &str {
    if verbose {
        failure.message()
    } else {
        GENERIC_MESSAGE
    }
}

// =============================================================================
// Plain text
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextRenderer {
    verbose: bool,
}

impl PlainTextRenderer {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ErrorRenderer for PlainTextRenderer {
    fn render(
        &self,
        failure: &Failure,
        context: &RequestContext,
    ) -> Result<RenderedError, RenderError> {
        let mut body = visible_message(failure, self.verbose).to_string();

        if self.verbose {
            body = format!("{} failure: {body}", failure.origin());
            for cause in failure.causes() {
                body.push_str("\nCaused by: ");
                body.push_str(cause);
            }
            body.push_str(&format!("\nRequest: {} {}", context.method(), context.uri()));
        }

        Ok(RenderedError::new(body, PLAIN_CONTENT_TYPE))
    }
}

// =============================================================================
// JSON
// =============================================================================

#[derive(Serialize)]
struct JsonBody<'a> {
    message: &'a str,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    origin: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    causes: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request: Option<JsonRequest>,
}

#[derive(Serialize)]
struct JsonRequest {
    method: String,
    uri: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer {
    verbose: bool,
}

impl JsonRenderer {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ErrorRenderer for JsonRenderer {
    fn render(
        &self,
        failure: &Failure,
        context: &RequestContext,
    ) -> Result<RenderedError, RenderError> {
        let body = JsonBody {
            message: visible_message(failure, self.verbose),
            status: failure.status().as_u16(),
            origin: self.verbose.then(|| failure.origin().as_str()),
            causes: self.verbose.then(|| failure.causes()),
            request: self.verbose.then(|| JsonRequest {
                method: context.method().to_string(),
                uri: context.uri().to_string(),
            }),
        };

        Ok(RenderedError::new(
            serde_json::to_vec(&body)?,
            JSON_CONTENT_TYPE,
        ))
    }
}

// =============================================================================
// HTML
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer {
    verbose: bool,
}

impl HtmlRenderer {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ErrorRenderer for HtmlRenderer {
    fn render(
        &self,
        failure: &Failure,
        context: &RequestContext,
    ) -> Result<RenderedError, RenderError> {
        let status = failure.status();
        let title = format!(
            "{} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Error")
        );

        let mut html = String::from("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
        html.push_str("<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<title>{}</title>\n", escape_markup(&title)));
        html.push_str("</head>\n<body>\n");
        html.push_str(&format!("<h1>{}</h1>\n", escape_markup(&title)));
        html.push_str(&format!(
            "<p class=\"message\">{}</p>\n",
            escape_markup(visible_message(failure, self.verbose))
        ));

        if self.verbose {
            html.push_str(&format!(
                "<p class=\"origin\">Origin: {}</p>\n",
                failure.origin()
            ));
            if !failure.causes().is_empty() {
                html.push_str("<h2>Caused by</h2>\n<ol class=\"causes\">\n");
                for cause in failure.causes() {
                    html.push_str(&format!("<li>{}</li>\n", escape_markup(cause)));
                }
                html.push_str("</ol>\n");
            }
            html.push_str(&format!(
                "<p class=\"request\"><code>{} {}</code></p>\n",
                escape_markup(context.method().as_str()),
                escape_markup(&context.uri().to_string())
            ));
        }

        html.push_str("</body>\n</html>\n");
        Ok(RenderedError::new(html, HTML_CONTENT_TYPE))
    }
}

// =============================================================================
// XML
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct XmlRenderer {
    verbose: bool,
}

impl XmlRenderer {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ErrorRenderer for XmlRenderer {
    fn render(
        &self,
        failure: &Failure,
        context: &RequestContext,
    ) -> Result<RenderedError, RenderError> {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<error>\n");
        xml.push_str(&format!(
            "  <message>{}</message>\n",
            escape_markup(visible_message(failure, self.verbose))
        ));
        xml.push_str(&format!("  <status>{}</status>\n", failure.status().as_u16()));

        if self.verbose {
            xml.push_str(&format!("  <origin>{}</origin>\n", failure.origin()));
            for cause in failure.causes() {
                xml.push_str(&format!("  <cause>{}</cause>\n", escape_markup(cause)));
            }
            xml.push_str(&format!(
                "  <request method=\"{}\">{}</request>\n",
                escape_markup(context.method().as_str()),
                escape_markup(&context.uri().to_string())
            ));
        }

        xml.push_str("</error>\n");
        Ok(RenderedError::new(xml, XML_CONTENT_TYPE))
    }
}

/// Escape text for HTML and XML bodies and attribute values.
fn escape_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, Method};

    fn context() -> RequestContext {
        RequestContext::new(Method::GET, "/orders?id=7".parse().unwrap(), HeaderMap::new())
    }

    fn failure() -> Failure {
        Failure::new("database <offline>").with_cause("connection refused")
    }

    fn body(rendered: &RenderedError) -> String {
        String::from_utf8(rendered.body.to_vec()).unwrap()
    }

    #[test]
    fn test_plain_hides_details_by_default() {
        let out = PlainTextRenderer::new(false)
            .render(&failure(), &context())
            .unwrap();
        assert_eq!(body(&out), GENERIC_MESSAGE);
        assert_eq!(out.content_type, PLAIN_CONTENT_TYPE);
    }

    #[test]
    fn test_plain_verbose_lists_causes() {
        let out = PlainTextRenderer::new(true)
            .render(&failure(), &context())
            .unwrap();
        let text = body(&out);
        assert!(text.starts_with("handler failure: database <offline>"));
        assert!(text.contains("Caused by: connection refused"));
        assert!(text.contains("Request: GET /orders?id=7"));
    }

    #[test]
    fn test_json_shape() {
        let out = JsonRenderer::new(false).render(&failure(), &context()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out.body).unwrap();
        assert_eq!(value["message"], GENERIC_MESSAGE);
        assert_eq!(value["status"], 500);
        assert!(value.get("causes").is_none());
        assert_eq!(out.content_type, JSON_CONTENT_TYPE);
    }

    #[test]
    fn test_json_verbose_shape() {
        let out = JsonRenderer::new(true).render(&failure(), &context()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out.body).unwrap();
        assert_eq!(value["message"], "database <offline>");
        assert_eq!(value["origin"], "handler");
        assert_eq!(value["causes"][0], "connection refused");
        assert_eq!(value["request"]["uri"], "/orders?id=7");
    }

    #[test]
    fn test_html_escapes_message() {
        let out = HtmlRenderer::new(true).render(&failure(), &context()).unwrap();
        let html = body(&out);
        assert!(html.contains("database &lt;offline&gt;"));
        assert!(!html.contains("<offline>"));
        assert!(html.contains("<title>500 Internal Server Error</title>"));
    }

    #[test]
    fn test_xml_document() {
        let out = XmlRenderer::new(false).render(&failure(), &context()).unwrap();
        let xml = body(&out);
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<status>500</status>"));
        assert!(!xml.contains("<cause>"));
    }

    #[test]
    fn test_escape_markup() {
        assert_eq!(escape_markup("a<b>&\"'"), "a&lt;b&gt;&amp;&quot;&#39;");
    }
}
