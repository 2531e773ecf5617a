use std::collections::VecDeque;
use std::sync::Arc;

use http::Method;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ids::RequestId;
use crate::response::HeaderVec;
use crate::router::Bindings;
use crate::session::{MemorySession, Session};

/// Trailing `.ext` on the last segment; the extension must start with a letter.
static EXTENSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*)\.([A-Za-z][A-Za-z0-9]*)$").expect("static extension regex")
});

static METHOD_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]+ +(.*)$").expect("static method regex"));

/// An incoming request as seen by the routing core.
///
/// Holds the HTTP surface (method, headers, query/post vars, body) plus the
/// mutable routing state: the remaining path segments, the bindings of the
/// latest match and the cumulative bindings of the whole dispatch.
#[derive(Debug)]
pub struct HttpRequest {
    request_id: RequestId,
    method: Method,
    url: String,
    extension: Option<String>,
    dir_parts: VecDeque<String>,
    get_vars: Vec<(String, String)>,
    post_vars: Vec<(String, String)>,
    headers: HeaderVec,
    body: Option<String>,
    latest_params: Bindings,
    all_params: Bindings,
    route_params: Bindings,
    unshifted_but_parsed: usize,
    session: Option<Box<dyn Session>>,
}

impl HttpRequest {
    /// Build a request from a method and a raw URL (`path?query`).
    ///
    /// The path is normalised: repeated slashes collapse, leading and trailing
    /// slashes are dropped, a trailing `.ext` is split off into the extension and
    /// every segment is percent-decoded.
    #[must_use]
    pub fn new(method: Method, raw_url: &str) -> Self {
        let (path, query) = match raw_url.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (raw_url, None),
        };

        let get_vars = query
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let collapsed = path
            .split('/')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("/");

        let (url, extension) = match EXTENSION_RE.captures(&collapsed) {
            Some(caps) => (caps[1].to_string(), Some(caps[2].to_string())),
            None => (collapsed, None),
        };

        let dir_parts = url
            .split('/')
            .filter(|s| !s.is_empty())
            .map(decode_segment)
            .collect();

        Self {
            request_id: RequestId::new(),
            method,
            url,
            extension,
            dir_parts,
            get_vars,
            post_vars: Vec::new(),
            headers: HeaderVec::new(),
            body: None,
            latest_params: Bindings::new(),
            all_params: Bindings::new(),
            route_params: Bindings::new(),
            unshifted_but_parsed: 0,
            session: None,
        }
    }

    #[must_use]
    pub fn get(url: &str) -> Self {
        Self::new(Method::GET, url)
    }

    #[must_use]
    pub fn post(url: &str) -> Self {
        Self::new(Method::POST, url)
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn with_post_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.post_vars.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    #[must_use]
    pub fn with_session(mut self, session: Box<dyn Session>) -> Self {
        self.session = Some(session);
        self
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Normalised URL without extension or query string
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Query-string variable, last occurrence wins
    #[must_use]
    pub fn get_var(&self, name: &str) -> Option<&str> {
        self.get_vars
            .iter()
            .rfind(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn has_get_var(&self, name: &str) -> bool {
        self.get_vars.iter().any(|(k, _)| k == name)
    }

    /// Form body variable, last occurrence wins
    #[must_use]
    pub fn post_var(&self, name: &str) -> Option<&str> {
        self.post_vars
            .iter()
            .rfind(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Post variable if present, otherwise query variable
    #[must_use]
    pub fn request_var(&self, name: &str) -> Option<&str> {
        self.post_var(name).or_else(|| self.get_var(name))
    }

    // --- path consumption ---

    /// Segments not yet shifted
    #[must_use]
    pub fn dir_parts(&self) -> Vec<&str> {
        self.dir_parts.iter().map(String::as_str).collect()
    }

    #[must_use]
    pub fn dir_part(&self, index: usize) -> Option<&str> {
        self.dir_parts.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn dir_parts_len(&self) -> usize {
        self.dir_parts.len()
    }

    /// Remaining path joined with `/` (no extension)
    #[must_use]
    pub fn remaining(&self) -> String {
        self.dir_parts
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Consume up to `count` leading segments.
    ///
    /// Shifting more segments than remain exhausts the path without error.
    pub fn shift(&mut self, count: usize) -> Vec<String> {
        let take = count.min(self.dir_parts.len());
        self.dir_parts.drain(..take).collect()
    }

    /// Shift the cumulative bindings one position along and return the value
    /// that fell off the front, e.g. after a handler consumed `$Action` the old
    /// `$ID` becomes `$Action`. The first parsed-but-unshifted segment fills the
    /// last slot.
    pub fn shift_all_params(&mut self) -> Option<String> {
        let names: Vec<Arc<str>> = self.all_params.iter().map(|(k, _)| Arc::from(k)).collect();
        let mut values: VecDeque<Option<String>> = self
            .all_params
            .iter()
            .map(|(_, v)| v.map(str::to_string))
            .collect();
        let first = values.pop_front().flatten();
        if let Some(next) = self.dir_parts.get(self.unshifted_but_parsed) {
            values.push_back(Some(next.clone()));
        }
        let mut shifted = Bindings::new();
        for (i, name) in names.into_iter().enumerate() {
            shifted.set(name, values.get(i).cloned().flatten());
        }
        self.all_params = shifted;
        first
    }

    /// Whether every remaining segment has been looked at by the last match.
    #[must_use]
    pub fn all_parsed(&self) -> bool {
        self.dir_parts.len() <= self.unshifted_but_parsed
    }

    /// Whether `pattern` has no tokens once the method prefix and slashes
    /// are stripped.
    #[must_use]
    pub fn is_empty_pattern(pattern: &str) -> bool {
        let path = METHOD_PREFIX_RE
            .captures(pattern.trim())
            .map_or(pattern, |caps| caps.get(1).map_or("", |m| m.as_str()));
        path.split('/').all(str::is_empty)
    }

    #[must_use]
    pub fn unshifted_but_parsed(&self) -> usize {
        self.unshifted_but_parsed
    }

    pub(crate) fn set_unshifted_but_parsed(&mut self, count: usize) {
        self.unshifted_but_parsed = count;
    }

    // --- bindings ---

    /// Binding from the latest match
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.latest_params.get(name)
    }

    #[must_use]
    pub fn latest_params(&self) -> &Bindings {
        &self.latest_params
    }

    /// Bindings accumulated over the whole dispatch
    #[must_use]
    pub fn all_params(&self) -> &Bindings {
        &self.all_params
    }

    /// Static defaults attached by the route table
    #[must_use]
    pub fn route_params(&self) -> &Bindings {
        &self.route_params
    }

    pub(crate) fn record_match(&mut self, bindings: &Bindings) {
        self.latest_params = bindings.clone();
        self.all_params.merge(bindings);
    }

    pub(crate) fn set_route_params(&mut self, params: Bindings) {
        self.route_params = params;
    }

    // --- session ---

    #[must_use]
    pub fn session(&self) -> Option<&dyn Session> {
        self.session.as_deref()
    }

    pub fn session_mut(&mut self) -> Option<&mut (dyn Session + 'static)> {
        self.session.as_deref_mut()
    }

    pub fn set_session(&mut self, session: Box<dyn Session>) {
        self.session = Some(session);
    }

    /// Attach an in-memory session if none has been attached yet.
    pub fn ensure_session(&mut self) -> &mut (dyn Session + 'static) {
        let session = self
            .session
            .get_or_insert_with(|| Box::new(MemorySession::default()) as Box<dyn Session>);
        &mut **session
    }
}

fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_normalised() {
        let req = HttpRequest::get("//admin///help/");
        assert_eq!(req.url(), "admin/help");
        assert_eq!(req.dir_parts(), vec!["admin", "help"]);
        assert_eq!(req.extension(), None);
    }

    #[test]
    fn extension_is_split_from_last_segment() {
        let req = HttpRequest::get("/api/pets/42.json?limit=10&limit=20");
        assert_eq!(req.url(), "api/pets/42");
        assert_eq!(req.extension(), Some("json"));
        assert_eq!(req.get_var("limit"), Some("20"));
    }

    #[test]
    fn numeric_suffix_is_not_an_extension() {
        let req = HttpRequest::get("docs/v1.2");
        assert_eq!(req.extension(), None);
        assert_eq!(req.dir_parts(), vec!["docs", "v1.2"]);
    }

    #[test]
    fn segments_are_percent_decoded() {
        let req = HttpRequest::get("search/hello%20world");
        assert_eq!(req.dir_part(1), Some("hello world"));
    }

    #[test]
    fn shift_past_the_end_exhausts_without_error() {
        let mut req = HttpRequest::get("a/b");
        assert_eq!(req.shift(5), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(req.remaining(), "");
        assert!(req.shift(1).is_empty());
    }

    #[test]
    fn request_var_prefers_post() {
        let req = HttpRequest::post("form?name=query").with_post_var("name", "body");
        assert_eq!(req.request_var("name"), Some("body"));
        assert_eq!(req.get_var("name"), Some("query"));
    }

    #[test]
    fn headers_are_case_insensitive() {
        let req = HttpRequest::get("/").with_header("X-Requested-With", "XMLHttpRequest");
        assert_eq!(req.header("x-requested-with"), Some("XMLHttpRequest"));
    }

    #[test]
    fn empty_patterns_ignore_method_and_slashes() {
        assert!(HttpRequest::is_empty_pattern(""));
        assert!(HttpRequest::is_empty_pattern("//"));
        assert!(HttpRequest::is_empty_pattern("POST /"));
        assert!(!HttpRequest::is_empty_pattern("GET admin"));
        assert!(!HttpRequest::is_empty_pattern("$Action"));
    }

    #[test]
    fn shift_all_params_moves_values_left() {
        let mut req = HttpRequest::get("/");
        let bound: Bindings = [("Action", "edit"), ("ID", "7"), ("OtherID", "9")]
            .into_iter()
            .collect();
        req.record_match(&bound);
        assert_eq!(req.shift_all_params(), Some("edit".to_string()));
        assert_eq!(req.all_params().get("Action"), Some("7"));
        assert_eq!(req.all_params().get("ID"), Some("9"));
        assert_eq!(req.all_params().get("OtherID"), None);
    }
}
