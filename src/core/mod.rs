//! Core types for request-scoped handling.
//!
//! - [`Request`] - inbound request with a single-use body and lazy form parsing
//! - [`ResponseWriter`] - outbound sink with write-once status
//! - [`BufferedResponse`] - in-memory writer convertible into `http::Response`
//! - [`Context`] - cancellation and deadline handle inherited by the request
//! - [`Error`] - errors reported by the request context
//!
//! # Example
//!
//! ```rust,ignore
//! use httputil::core::{BufferedResponse, Request, ResponseWriter};
//!
//! let mut req = Request::from(http_request);
//! let mut res = BufferedResponse::new();
//! res.write(b"hello")?;
//! let response = res.into_response();
//! ```

mod context;
mod error;
mod request;
mod response;

pub use context::{generate_span_id, generate_trace_id, Context, ContextBuilder};
pub use error::{BoxError, DecodeError, Error, Result};
pub use request::Request;
pub(crate) use request::X_REQUEST_ID;
pub use response::{write_plain_error, BufferedResponse, ResponseWriter};

pub(crate) use response::content_types;
