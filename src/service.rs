//! Adapter running a [`Handler`] inside a hyper service.
//!
//! The host server owns listeners and connections; this only turns an accepted
//! request into a [`RequestContext`] and the written reply back into an
//! `http::Response`.
//!
//! # Example
//!
//! ```rust,ignore
//! use httputil::service::HandlerService;
//! use httputil::config::ServiceConfig;
//!
//! let service = HandlerService::new(list_users, ServiceConfig::default());
//! http1::Builder::new().serve_connection(TokioIo::new(stream), service).await?;
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::StatusCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ServiceConfig;
use crate::core::{
    write_plain_error, BoxError, BufferedResponse, Context, Error, Request, ResponseWriter,
    X_REQUEST_ID,
};
use crate::handler::{Handler, RequestContext};

/// Longest inbound request ID that is propagated as-is.
const MAX_REQUEST_ID_LEN: usize = 128;

/// HTTP response produced by the adapter.
pub type ServiceResponse = http::Response<Full<Bytes>>;

/// Hyper service wrapping a request handler.
///
/// Cheap to clone; every connection can hold its own copy.
pub struct HandlerService<H> {
    handler: Arc<H>,
    config: Arc<ServiceConfig>,
    shutdown: CancellationToken,
}

impl<H> Clone for HandlerService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            config: Arc::clone(&self.config),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<H: Handler> HandlerService<H> {
    /// Wrap `handler` with the given limits.
    pub fn new(handler: H, config: ServiceConfig) -> Self {
        Self {
            handler: Arc::new(handler),
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }

    /// Use `token` as the parent of every request context.
    ///
    /// Cancelling it cancels all in-flight request contexts.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Parent token of every request context.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Limits applied to each request.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Read the body, run the handler and build the response.
    pub async fn handle<B>(&self, req: http::Request<B>) -> ServiceResponse
    where
        B: Body,
        B::Error: Into<BoxError>,
    {
        let context = self.request_context(req.headers());
        let (parts, body) = req.into_parts();
        let limit = self.config.max_body_size;

        let declared_len = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if declared_len.is_some_and(|len| len > limit as u64) {
            return self.reject(&context, Error::BodyTooLarge { limit });
        }

        let body = match Limited::new(body, limit).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                return self.reject(&context, Error::BodyTooLarge { limit });
            }
            Err(e) => return self.reject(&context, Error::Body(e.to_string())),
        };

        let mut request = Request::from(http::Request::from_parts(parts, body))
            .with_context(context.clone());
        let mut writer = BufferedResponse::new();

        {
            let mut ctx = RequestContext::new(&mut request, &mut writer);
            self.handler.serve(&mut ctx);
        }

        self.finish(&context, &request, writer)
    }

    fn request_context(&self, headers: &http::HeaderMap) -> Context {
        let mut builder = Context::builder().parent(&self.shutdown);
        if let Some(timeout) = self.config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let inbound_id = headers
            .get(&*X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN);
        if let Some(id) = inbound_id {
            builder = builder.request_id(id);
        }
        builder.build()
    }

    fn reject(&self, context: &Context, err: Error) -> ServiceResponse {
        let status = match err {
            Error::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        debug!(request_id = %context.request_id, error = %err, "rejected request body");
        let mut writer = BufferedResponse::new();
        write_plain_error(&mut writer, &err.to_string(), status);
        with_request_id(context, writer).into_full()
    }

    fn finish(
        &self,
        context: &Context,
        request: &Request,
        writer: BufferedResponse,
    ) -> ServiceResponse {
        let status = writer.status().unwrap_or(StatusCode::OK);

        if self.config.access_log {
            info!(
                target: "access",
                request_id = %context.request_id,
                method = %request.method(),
                path = request.path(),
                status = status.as_u16(),
                bytes = writer.body_len() as u64,
                duration_ms = context.elapsed_ms(),
            );
        }

        with_request_id(context, writer).into_full()
    }
}

fn with_request_id(context: &Context, mut writer: BufferedResponse) -> BufferedResponse {
    if let Ok(value) = HeaderValue::from_str(&context.request_id) {
        writer.set_header(X_REQUEST_ID.clone(), value);
    }
    writer
}

impl<H, B> hyper::service::Service<http::Request<B>> for HandlerService<H>
where
    H: Handler,
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Response = ServiceResponse;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<ServiceResponse, Infallible>> + Send>>;

    fn call(&self, req: http::Request<B>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(req).await) })
    }
}
