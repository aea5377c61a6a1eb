//! Per-request helper bundling the request, the response writer and the
//! inherited cancellation context.
//!
//! # Example
//!
//! ```rust,ignore
//! use httputil::{Error, RequestContext};
//! use http::StatusCode;
//!
//! fn create_user(ctx: &mut RequestContext<'_>) -> Result<(), Error> {
//!     let input: CreateUser = ctx.decode()?;
//!
//!     let mut dry_run = false;
//!     ctx.decode_form("dry_run", &mut dry_run)?;
//!
//!     let user = ctx.check("inserting user", db::insert(ctx.context(), input))?;
//!     ctx.encode(&user);
//!     Ok(())
//! }
//! ```

pub mod encode;

use std::fmt::Display;

use http::header;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};

use crate::core::{
    content_types, write_plain_error, BoxError, Context, DecodeError, Error, Request,
    ResponseWriter, Result,
};
use crate::form::FormTarget;

/// Request handler run once per inbound request.
pub trait Handler: Send + Sync + 'static {
    /// Handle the request, writing the reply through `ctx`.
    fn serve(&self, ctx: &mut RequestContext<'_>);
}

impl<F> Handler for F
where
    F: Fn(&mut RequestContext<'_>) + Send + Sync + 'static,
{
    fn serve(&self, ctx: &mut RequestContext<'_>) {
        self(ctx)
    }
}

/// Per-request view over the inbound request and outbound writer.
///
/// Borrows both for the duration of the handler; owns neither. At most one
/// success or error payload should be written per request: callers must not
/// call both [`encode`](Self::encode) and [`error`](Self::error).
pub struct RequestContext<'a> {
    context: Context,
    request: &'a mut Request,
    response: &'a mut dyn ResponseWriter,
}

impl<'a> RequestContext<'a> {
    /// Wrap a request and its paired writer.
    ///
    /// The request's context is captured for downstream propagation.
    pub fn new(request: &'a mut Request, response: &'a mut dyn ResponseWriter) -> Self {
        Self {
            context: request.context().clone(),
            request,
            response,
        }
    }

    /// Cancellation and deadline handle inherited from the request.
    #[inline]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Inbound request.
    #[inline]
    pub fn request(&self) -> &Request {
        &*self.request
    }

    /// Outbound writer, for replies the helpers do not cover.
    #[inline]
    pub fn response(&mut self) -> &mut dyn ResponseWriter {
        &mut *self.response
    }

    /// Write `value` as JSON.
    ///
    /// Empty top-level sequences are written as `[]` and empty mappings as
    /// `{}`; anything else is tab-indented. The body always ends with a
    /// newline. Serialization failures are logged, not returned; the
    /// `Content-Type` header is already set at that point.
    pub fn encode<T: Serialize + ?Sized>(&mut self, value: &T) {
        self.response
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_types::APPLICATION_JSON.clone());

        let body = match encode::to_body(value) {
            Ok(body) => body,
            Err(e) => {
                error!(
                    request_id = %self.context.request_id,
                    type_name = std::any::type_name::<T>(),
                    error = %e,
                    "failed to encode response"
                );
                return;
            }
        };

        if let Err(e) = self.response.write(&body) {
            error!(
                request_id = %self.context.request_id,
                error = %e,
                "failed to write response"
            );
        }
    }

    /// Write `value` as JSON with a status other than `200 OK`.
    ///
    /// The JSON content type is set before the status line, so it reaches the
    /// response. Body rules are the same as [`encode`](Self::encode).
    pub fn encode_with_status<T: Serialize + ?Sized>(&mut self, status: StatusCode, value: &T) {
        self.response
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_types::APPLICATION_JSON.clone());
        self.response.write_header(status);
        self.encode(value);
    }

    /// Decode the body as a single JSON document.
    ///
    /// On failure a 400 response naming the target type is written and the
    /// same error is returned. The body is consumed either way.
    pub fn decode<T: DeserializeOwned>(&mut self) -> Result<T> {
        let body = self.request.take_body();
        match decode_json::<T>(&body) {
            Ok(value) => Ok(value),
            Err(source) => {
                let err = Error::Decode {
                    type_name: std::any::type_name::<T>(),
                    source,
                };
                Err(self.error(err, StatusCode::BAD_REQUEST))
            }
        }
    }

    /// Decode the body into an existing value.
    pub fn decode_into<T: DeserializeOwned>(&mut self, target: &mut T) -> Result<()> {
        *target = self.decode()?;
        Ok(())
    }

    /// Write `err` as a plain-text response with `status`, and hand it back.
    ///
    /// Lets a handler end with `return Err(ctx.error(e, StatusCode::NOT_FOUND))`.
    pub fn error<E: Display>(&mut self, err: E, status: StatusCode) -> E {
        let msg = err.to_string();
        debug!(
            request_id = %self.context.request_id,
            status = status.as_u16(),
            error = %msg,
            "request failed"
        );
        write_plain_error(&mut *self.response, &msg, status);
        err
    }

    /// Pass `Ok` through untouched; report `Err` as a 500.
    ///
    /// The error is wrapped as `"<message>: <error>"` before being written and
    /// returned.
    pub fn check<T, E>(&mut self, message: &str, result: std::result::Result<T, E>) -> Result<T>
    where
        E: Into<BoxError>,
    {
        result.map_err(|e| {
            let err = Error::Internal {
                message: message.to_string(),
                source: e.into(),
            };
            self.error(err, StatusCode::INTERNAL_SERVER_ERROR)
        })
    }

    /// Convert the form field `key` into `target`.
    ///
    /// An absent or empty field leaves `target` untouched. A malformed value
    /// writes a 400 response and returns the error.
    ///
    /// # Panics
    ///
    /// Panics if `target` is a [`FormTarget::Dynamic`] holding an unsupported
    /// type. This is never turned into a response.
    pub fn decode_form<'t>(
        &mut self,
        key: &str,
        target: impl Into<FormTarget<'t>>,
    ) -> Result<()> {
        let value = match self.request.form_value(key) {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => return Ok(()),
        };

        match target.into().assign(&value) {
            Ok(()) => Ok(()),
            Err(source) => {
                let err = Error::Form {
                    key: key.to_string(),
                    source,
                };
                Err(self.error(err, StatusCode::BAD_REQUEST))
            }
        }
    }
}

/// Parse the first JSON document in `body`; trailing bytes are ignored.
fn decode_json<T: DeserializeOwned>(body: &[u8]) -> std::result::Result<T, DecodeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(DecodeError::Eof);
    }
    let mut de = serde_json::Deserializer::from_slice(body);
    Ok(serde::Deserialize::deserialize(&mut de)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BufferedResponse;
    use bytes::Bytes;
    use http::Method;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Login {
        user: String,
    }

    fn request(method: Method, uri: &str, body: &'static str) -> Request {
        Request::new(
            method,
            uri.parse().unwrap(),
            Default::default(),
            Bytes::from_static(body.as_bytes()),
        )
    }

    #[test]
    fn test_decode_ignores_trailing_documents() {
        let mut req = request(Method::POST, "/", "{\"user\":\"ann\"} {\"user\":\"bob\"}");
        let mut res = BufferedResponse::new();
        let mut ctx = RequestContext::new(&mut req, &mut res);

        let login: Login = ctx.decode().unwrap();
        assert_eq!(login.user, "ann");
        assert!(!res.is_written());
    }

    #[test]
    fn test_decode_empty_body_is_eof() {
        let mut req = request(Method::POST, "/", " \n");
        let mut res = BufferedResponse::new();
        let mut ctx = RequestContext::new(&mut req, &mut res);

        let err = ctx.decode::<Login>().unwrap_err();
        assert!(err.to_string().ends_with("): EOF"));
        assert_eq!(res.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_decode_into_overwrites() {
        let mut req = request(Method::POST, "/", "{\"user\":\"cy\"}");
        let mut res = BufferedResponse::new();
        let mut ctx = RequestContext::new(&mut req, &mut res);

        let mut login = Login {
            user: "old".to_string(),
        };
        ctx.decode_into(&mut login).unwrap();
        assert_eq!(login.user, "cy");
    }

    #[test]
    fn test_closure_handler() {
        let handler = |ctx: &mut RequestContext<'_>| ctx.encode(&["ok"]);
        let mut req = request(Method::GET, "/", "");
        let mut res = BufferedResponse::new();
        handler.serve(&mut RequestContext::new(&mut req, &mut res));

        assert_eq!(res.body(), b"[\n\t\"ok\"\n]\n");
        assert_eq!(res.header("content-type"), Some("application/json"));
    }

    #[test]
    fn test_encode_with_status_keeps_content_type() {
        let mut req = request(Method::POST, "/", "");
        let mut res = BufferedResponse::new();
        RequestContext::new(&mut req, &mut res).encode_with_status(StatusCode::CREATED, &vec![1]);

        assert_eq!(res.status(), Some(StatusCode::CREATED));
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.body(), b"[\n\t1\n]\n");
    }

    #[test]
    fn test_status_before_encode_drops_content_type() {
        let mut req = request(Method::POST, "/", "");
        let mut res = BufferedResponse::new();
        let mut ctx = RequestContext::new(&mut req, &mut res);
        ctx.response().write_header(StatusCode::CREATED);
        ctx.encode(&vec![1]);

        assert_eq!(res.status(), Some(StatusCode::CREATED));
        assert_eq!(res.header("content-type"), None);
    }

    #[test]
    fn test_context_accessor() {
        let ctx = Context::builder().request_id("abc").build();
        let mut req = request(Method::GET, "/", "").with_context(ctx);
        let mut res = BufferedResponse::new();
        let rc = RequestContext::new(&mut req, &mut res);

        assert_eq!(rc.context().request_id, "abc");
        assert_eq!(rc.request().path(), "/");
    }
}
