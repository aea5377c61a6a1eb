//! Inbound HTTP request as seen by the request context.

use bytes::Bytes;
use http::header::{self, HeaderName};
use http::{HeaderMap, Method, Uri};

use super::Context;
use crate::form::{parse_multipart, parse_urlencoded, FormValues};

/// Lazily initialized custom header names.
pub(crate) static X_REQUEST_ID: std::sync::LazyLock<HeaderName> =
    std::sync::LazyLock::new(|| HeaderName::from_static("x-request-id"));

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Inbound request.
///
/// The body can be taken exactly once, either by JSON decoding or by form
/// parsing; afterwards it reads as empty.
///
/// Not `Clone`: the body is single-use.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    version: http::Version,
    body: Option<Bytes>,
    form: Option<FormValues>,
    context: Context,
}

impl Request {
    /// Create a new request with a fresh root context.
    #[inline]
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            version: http::Version::HTTP_11,
            body: Some(body),
            form: None,
            context: Context::new(),
        }
    }

    /// Replace the request's context.
    #[inline]
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Get the HTTP method.
    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the request path.
    #[inline]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Get the query string.
    #[inline]
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Get the full URI.
    #[inline]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Get the headers.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the HTTP version.
    #[inline]
    pub fn version(&self) -> http::Version {
        self.version
    }

    /// Set the HTTP version.
    #[inline]
    pub fn set_version(&mut self, version: http::Version) {
        self.version = version;
    }

    /// Cancellation and deadline handle for this request.
    #[inline]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Get a header value by string name (case-insensitive).
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get Content-Type header.
    #[inline]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Get X-Request-ID header.
    #[inline]
    pub fn request_id(&self) -> Option<&str> {
        self.headers
            .get(&*X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
    }

    /// Take the body. Returns an empty buffer once it has been consumed.
    #[inline]
    pub fn take_body(&mut self) -> Bytes {
        self.body.take().unwrap_or_default()
    }

    /// Whether the body has already been taken.
    #[inline]
    pub fn body_consumed(&self) -> bool {
        self.body.is_none()
    }

    /// First value for `key` from the request body or the query string.
    ///
    /// The form is parsed on first use and reading body values consumes the
    /// body. URL-encoded body values are read for POST, PUT and PATCH and come
    /// before the query. Multipart text fields are read for any method and
    /// come after the query; a malformed multipart body contributes nothing.
    pub fn form_value(&mut self, key: &str) -> Option<&str> {
        self.form().get(key)
    }

    /// Parsed form values in lookup order.
    pub fn form(&mut self) -> &FormValues {
        if self.form.is_none() {
            let mut values = FormValues::default();
            if self.has_form_body() {
                let body = self.take_body();
                values.extend(parse_urlencoded(&String::from_utf8_lossy(&body)));
            }
            if let Some(query) = self.uri.query() {
                values.extend(parse_urlencoded(query));
            }
            if let Some(content_type) = self.multipart_content_type() {
                let body = self.take_body();
                match parse_multipart(&content_type, body) {
                    Ok(fields) => values.extend(fields),
                    Err(e) => tracing::debug!(error = %e, "ignoring malformed multipart body"),
                }
            }
            self.form = Some(values);
        }
        self.form.get_or_insert_with(FormValues::default)
    }

    fn has_form_body(&self) -> bool {
        let method_allows = matches!(self.method, Method::POST | Method::PUT | Method::PATCH);
        let is_urlencoded = self
            .content_type()
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_URLENCODED));
        method_allows && is_urlencoded && !self.body_consumed()
    }

    fn multipart_content_type(&self) -> Option<String> {
        if self.body_consumed() {
            return None;
        }
        self.content_type()
            .filter(|ct| {
                ct.split(';')
                    .next()
                    .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(MULTIPART_FORM_DATA))
            })
            .map(str::to_string)
    }
}

impl<B> From<http::Request<B>> for Request
where
    B: Into<Bytes>,
{
    fn from(req: http::Request<B>) -> Self {
        let (mut parts, body) = req.into_parts();
        let context = parts
            .extensions
            .remove::<Context>()
            .unwrap_or_default();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            version: parts.version,
            body: Some(body.into()),
            form: None,
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_form(uri: &str, body: &'static str) -> Request {
        let http_req = http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded; charset=utf-8")
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap();
        Request::from(http_req)
    }

    #[test]
    fn test_request_from_http() {
        let http_req = http::Request::builder()
            .method("GET")
            .uri("/test?foo=bar")
            .header("x-request-id", "abc123")
            .body(Bytes::new())
            .unwrap();

        let req = Request::from(http_req);

        assert_eq!(req.method(), Method::GET);
        assert_eq!(req.path(), "/test");
        assert_eq!(req.query(), Some("foo=bar"));
        assert_eq!(req.request_id(), Some("abc123"));
        assert_eq!(req.header("X-Request-Id"), Some("abc123"));
    }

    #[test]
    fn test_context_from_extensions() {
        let ctx = Context::builder().request_id("from-ext").build();
        let mut http_req = http::Request::new(Bytes::new());
        http_req.extensions_mut().insert(ctx);

        let req = Request::from(http_req);
        assert_eq!(req.context().request_id, "from-ext");
    }

    #[test]
    fn test_body_taken_once() {
        let mut req = post_form("/", "a=1");
        assert_eq!(req.take_body(), Bytes::from_static(b"a=1"));
        assert!(req.body_consumed());
        assert!(req.take_body().is_empty());
    }

    #[test]
    fn test_form_body_precedes_query() {
        let mut req = post_form("/submit?name=query&page=2", "name=body&tags=a%2Cb");

        assert_eq!(req.form_value("name"), Some("body"));
        assert_eq!(req.form_value("page"), Some("2"));
        assert_eq!(req.form_value("tags"), Some("a,b"));
        assert_eq!(req.form_value("missing"), None);
        assert!(req.body_consumed());
        assert_eq!(req.form().get_all("name"), vec!["body", "query"]);
    }

    #[test]
    fn test_form_ignores_body_for_get() {
        let http_req = http::Request::builder()
            .method("GET")
            .uri("/?q=rust")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Bytes::from_static(b"q=body"))
            .unwrap();
        let mut req = Request::from(http_req);

        assert_eq!(req.form_value("q"), Some("rust"));
        assert!(!req.body_consumed());
    }

    #[test]
    fn test_multipart_fields_follow_query() {
        let body = "--XX\r\n\
            Content-Disposition: form-data; name=\"limit\"\r\n\r\n\
            7\r\n\
            --XX\r\n\
            Content-Disposition: form-data; name=\"page\"\r\n\r\n\
            body\r\n\
            --XX--\r\n";
        let http_req = http::Request::builder()
            .method("POST")
            .uri("/upload?page=query")
            .header("content-type", "multipart/form-data; boundary=XX")
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap();
        let mut req = Request::from(http_req);

        assert_eq!(req.form_value("limit"), Some("7"));
        assert_eq!(req.form_value("page"), Some("query"));
        assert_eq!(req.form().get_all("page"), vec!["query", "body"]);
        assert!(req.body_consumed());
    }

    #[test]
    fn test_malformed_multipart_keeps_query() {
        let http_req = http::Request::builder()
            .method("POST")
            .uri("/upload?limit=3")
            .header("content-type", "multipart/form-data")
            .body(Bytes::from_static(b"not multipart"))
            .unwrap();
        let mut req = Request::from(http_req);

        assert_eq!(req.form_value("limit"), Some("3"));
    }

    #[test]
    fn test_form_ignores_json_body() {
        let http_req = http::Request::builder()
            .method("POST")
            .uri("/?id=7")
            .header("content-type", "application/json")
            .body(Bytes::from_static(b"{\"id\":1}"))
            .unwrap();
        let mut req = Request::from(http_req);

        assert_eq!(req.form_value("id"), Some("7"));
        assert!(!req.body_consumed());
    }
}
