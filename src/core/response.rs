//! Outbound response writer.

use bytes::{Bytes, BytesMut};
use http::header::{self, HeaderName};
use http::{HeaderMap, HeaderValue, StatusCode};
use http_body_util::Full;

/// Pre-allocated static header values for common content types.
pub(crate) mod content_types {
    use super::*;
    pub static TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
    pub static APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");
    pub static NOSNIFF: HeaderValue = HeaderValue::from_static("nosniff");
}

/// Sink for a single HTTP response.
///
/// Mirrors the usual writer discipline: headers are editable until the status
/// is written, the status is written at most once, and the first body write
/// implies `200 OK` if no status was written yet.
pub trait ResponseWriter {
    /// Headers that will be sent with the status line.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Write the status line. Only the first call has an effect.
    fn write_header(&mut self, status: StatusCode);

    /// Append body bytes, writing `200 OK` first if needed.
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize>;

    /// Status written so far, if any.
    fn status(&self) -> Option<StatusCode>;
}

/// Write `msg` as a plain-text error response with the given status.
///
/// Drops any `Content-Length` set earlier and terminates the body with a
/// newline.
pub fn write_plain_error(w: &mut dyn ResponseWriter, msg: &str, status: StatusCode) {
    let headers = w.headers_mut();
    headers.remove(header::CONTENT_LENGTH);
    headers.insert(header::CONTENT_TYPE, content_types::TEXT_PLAIN.clone());
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, content_types::NOSNIFF.clone());
    w.write_header(status);

    let mut body = String::with_capacity(msg.len() + 1);
    body.push_str(msg);
    body.push('\n');
    if let Err(e) = w.write(body.as_bytes()) {
        tracing::warn!(error = %e, "failed to write error response");
    }
}

/// In-memory response writer.
///
/// Header edits made after the status was written are kept in the live map
/// but do not reach the final response.
#[derive(Debug, Default)]
pub struct BufferedResponse {
    headers: HeaderMap,
    sent_headers: Option<HeaderMap>,
    status: Option<StatusCode>,
    body: BytesMut,
}

impl BufferedResponse {
    /// Create an empty writer.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the status line has been written.
    #[inline]
    pub fn is_written(&self) -> bool {
        self.status.is_some()
    }

    /// Body written so far.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body length in bytes.
    #[inline]
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Headers as they will be sent.
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        self.sent_headers.as_ref().unwrap_or(&self.headers)
    }

    /// Get a header value by name from the headers as they will be sent.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers().get(name).and_then(|v| v.to_str().ok())
    }

    /// Add a header if the status has not been written yet.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        match self.sent_headers.as_mut() {
            Some(sent) => {
                sent.insert(name, value);
            }
            None => {
                self.headers.insert(name, value);
            }
        }
    }

    /// Finish the response. An untouched writer yields `200 OK` with no body.
    pub fn into_response(self) -> http::Response<Bytes> {
        let status = self.status.unwrap_or(StatusCode::OK);
        let headers = self.sent_headers.unwrap_or(self.headers);

        let mut res = http::Response::new(self.body.freeze());
        *res.status_mut() = status;
        *res.headers_mut() = headers;
        res
    }

    /// Finish the response with a hyper-compatible body.
    pub fn into_full(self) -> http::Response<Full<Bytes>> {
        self.into_response().map(Full::new)
    }
}

impl ResponseWriter for BufferedResponse {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        if let Some(existing) = self.status {
            tracing::warn!(
                status = status.as_u16(),
                existing = existing.as_u16(),
                "superfluous write_header call"
            );
            return;
        }
        self.status = Some(status);
        self.sent_headers = Some(self.headers.clone());
    }

    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.status.is_none() {
            self.write_header(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn status(&self) -> Option<StatusCode> {
        self.status
    }
}

impl From<BufferedResponse> for http::Response<Bytes> {
    fn from(res: BufferedResponse) -> Self {
        res.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untouched_response() {
        let res = BufferedResponse::new().into_response();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.body().is_empty());
    }

    #[test]
    fn test_write_implies_ok() {
        let mut w = BufferedResponse::new();
        w.write(b"hello").unwrap();
        assert_eq!(w.status(), Some(StatusCode::OK));
        assert_eq!(w.body(), b"hello");
    }

    #[test]
    fn test_first_status_wins() {
        let mut w = BufferedResponse::new();
        w.write_header(StatusCode::NOT_FOUND);
        w.write_header(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(w.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_headers_frozen_after_write_header() {
        let mut w = BufferedResponse::new();
        w.headers_mut()
            .insert("x-before", HeaderValue::from_static("1"));
        w.write_header(StatusCode::ACCEPTED);
        w.headers_mut()
            .insert("x-after", HeaderValue::from_static("1"));

        assert_eq!(w.header("x-before"), Some("1"));
        assert_eq!(w.header("x-after"), None);

        let res = w.into_response();
        assert_eq!(res.status(), StatusCode::ACCEPTED);
        assert!(res.headers().contains_key("x-before"));
        assert!(!res.headers().contains_key("x-after"));
    }

    #[test]
    fn test_plain_error() {
        let mut w = BufferedResponse::new();
        w.headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from_static("99"));
        write_plain_error(&mut w, "not here", StatusCode::NOT_FOUND);

        assert_eq!(w.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(w.body(), b"not here\n");
        assert_eq!(w.header("content-type"), Some("text/plain; charset=utf-8"));
        assert_eq!(w.header("x-content-type-options"), Some("nosniff"));
        assert_eq!(w.header("content-length"), None);
    }

    #[test]
    fn test_set_header_after_write() {
        let mut w = BufferedResponse::new();
        w.write(b"ok").unwrap();
        w.set_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("abc"),
        );
        assert_eq!(w.into_response().headers()["x-request-id"], "abc");
    }
}
