//! httputil - Request/response helpers for JSON HTTP handlers.
//!
//! Bundles an inbound request, its response writer and the request's
//! cancellation context into a single [`RequestContext`] with the handful of
//! operations every JSON handler repeats.
//!
//! # Features
//!
//! - **JSON encoding**: Tab-indented bodies, empty collections written as `[]` / `{}`
//! - **JSON decoding**: First document only, 400 replies naming the target type
//! - **Form values**: Typed conversion of query and urlencoded body fields
//! - **Error replies**: Plain-text bodies with `nosniff`, 500 wrapping for internal failures
//! - **Context propagation**: Cancellation, deadlines and request IDs for downstream calls
//! - **Hyper adapter**: [`HandlerService`] runs any [`Handler`] as a hyper service
//!
//! # Example
//!
//! ```rust,ignore
//! use httputil::{HandlerService, RequestContext};
//! use httputil::config::ServiceConfig;
//!
//! fn hello(ctx: &mut RequestContext<'_>) {
//!     let mut name = String::from("world");
//!     if ctx.decode_form("name", &mut name).is_err() {
//!         return;
//!     }
//!     ctx.encode(&format!("hello, {}", name));
//! }
//!
//! let service = HandlerService::new(hello, ServiceConfig::default());
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod config;
pub mod core;
pub mod form;
pub mod handler;
pub mod logging;
pub mod service;

// Re-exports for convenience
pub use config::Config;
pub use crate::core::{Context, Error, Request, ResponseWriter};
pub use form::{FormTarget, UnmarshalText};
pub use handler::{Handler, RequestContext};
pub use service::HandlerService;
