use std::sync::Arc;

use http::StatusCode;
use minijinja::HtmlEscape;
use smallvec::SmallVec;

use crate::error::{DispatchError, ResponseSignal};

/// Body of the generic 500 response.
pub const INTERNAL_ERROR_BODY: &str = "Internal Server Error";

/// Maximum inline headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage.
///
/// Header names use `Arc<str>` so repeated names clone in O(1).
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Concrete HTTP response produced by dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code (200, 302, 404, ...)
    pub status: u16,
    /// Response headers (stack-allocated for ≤16 headers)
    pub headers: HeaderVec,
    /// Response body
    pub body: String,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new(200)
    }
}

impl HttpResponse {
    /// Create an empty response with the given status
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderVec::new(),
            body: String::new(),
        }
    }

    /// 200 response with an HTML body
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        let mut res = Self::new(200);
        res.set_header("content-type", "text/html; charset=utf-8".to_string());
        res.body = body.into();
        res
    }

    /// JSON response
    #[must_use]
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        let mut res = Self::new(status);
        res.set_header("content-type", "application/json".to_string());
        res.body = body.to_string();
        res
    }

    /// Plain-text error response
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        let mut res = Self::new(status);
        res.set_header("content-type", "text/plain; charset=utf-8".to_string());
        res.body = message.to_string();
        res
    }

    /// Generic 500 answered for faults and panics
    #[must_use]
    pub fn internal_error() -> Self {
        Self::error(500, INTERNAL_ERROR_BODY)
    }

    /// Redirect response pointing at `destination`.
    ///
    /// Bytes outside visible ASCII are percent-encoded in the `location`
    /// header; the HTML body escapes the destination.
    #[must_use]
    pub fn redirect(destination: impl Into<String>, status: u16) -> Self {
        let location = header_safe_location(&destination.into());
        let mut res = Self::new(status);
        res.set_header("content-type", "text/html; charset=utf-8".to_string());
        let escaped = HtmlEscape(&location);
        res.body = format!(
            "<p>Redirecting to <a href=\"{escaped}\" title=\"Click this link if your browser does not redirect you\">{escaped}</a></p>"
        );
        res.set_header("location", location);
        res
    }

    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header (case-insensitive)
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }

    #[must_use]
    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 304 | 305 | 307 | 308)
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// A finished response short-circuits the rest of a controller's lifecycle.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.is_redirect() || self.is_error()
    }

    #[must_use]
    pub fn reason(&self) -> &'static str {
        StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("")
    }

    /// Raise this response as a non-local exit.
    #[must_use]
    pub fn into_signal(self) -> DispatchError {
        DispatchError::Signal(ResponseSignal::new(self))
    }
}

/// Percent-encode control characters, whitespace and non-ASCII so the
/// value cannot split or corrupt a header line.
fn header_safe_location(destination: &str) -> String {
    let mut out = String::with_capacity(destination.len());
    for c in destination.chars() {
        if c.is_ascii_graphic() {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_sets_location_and_finishes() {
        let res = HttpResponse::redirect("/login", 302);
        assert_eq!(res.location(), Some("/login"));
        assert!(res.is_redirect());
        assert!(res.is_finished());
    }

    #[test]
    fn redirect_body_escapes_markup() {
        let res = HttpResponse::redirect("/search/\"><script>alert(1)</script>", 302);
        assert!(!res.body.contains("<script>"));
        assert!(res.body.contains("&lt;script&gt;"));
        assert!(res.body.contains("&quot;"));
    }

    #[test]
    fn redirect_location_cannot_split_headers() {
        let res = HttpResponse::redirect("/next\r\nSet-Cookie: a=b", 302);
        assert_eq!(res.location(), Some("/next%0D%0ASet-Cookie:%20a=b"));

        let res = HttpResponse::redirect("/caf\u{e9}", 302);
        assert_eq!(res.location(), Some("/caf%C3%A9"));
    }

    #[test]
    fn headers_are_case_insensitive_and_replaced() {
        let mut res = HttpResponse::new(200);
        res.set_header("Content-Type", "text/plain".to_string());
        res.set_header("content-type", "application/json".to_string());
        assert_eq!(res.headers.len(), 1);
        assert_eq!(res.header("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn ok_response_is_not_finished() {
        let res = HttpResponse::ok("hello");
        assert!(!res.is_finished());
        assert_eq!(res.reason(), "OK");
    }
}
