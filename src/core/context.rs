//! Cancellation and deadline handle inherited by each request.

use std::any::Any;
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

type Values = Arc<RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>>;

/// Request-scoped handle for cancellation, deadline and shared values.
///
/// Cloning is cheap: clones share the same token and value store, so a clone
/// handed to a downstream call observes the same cancellation as the handler.
/// The request context never checks cancellation itself; it is carried for the
/// handler to pass into database queries, outbound calls and the like.
#[derive(Clone)]
pub struct Context {
    /// Short request ID for logging.
    pub request_id: String,

    /// W3C Trace ID (32 hex chars).
    pub trace_id: String,

    /// Request start time.
    pub started_at: Instant,

    token: CancellationToken,
    deadline: Option<Instant>,
    values: Values,
}

impl Context {
    /// Create a new root context with generated IDs and no deadline.
    #[inline]
    pub fn new() -> Self {
        ContextBuilder::new().build()
    }

    /// Create a context builder for more control.
    #[inline]
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    /// Signal cancellation to this context and every child.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether cancellation has been signalled.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Future that resolves once the context is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Underlying token, for APIs that accept one directly.
    #[inline]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Deadline, if any.
    #[inline]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Whether the context is done, either cancelled or past its deadline.
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }

    /// Resolve once the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline.into()) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Derive a child context.
    ///
    /// Cancelling the parent cancels the child; cancelling the child leaves the
    /// parent untouched. IDs, deadline and values are shared.
    pub fn child(&self) -> Self {
        Self {
            request_id: self.request_id.clone(),
            trace_id: self.trace_id.clone(),
            started_at: self.started_at,
            token: self.token.child_token(),
            deadline: self.deadline,
            values: Arc::clone(&self.values),
        }
    }

    /// Derive a child context whose deadline is at most `timeout` from now.
    ///
    /// An earlier parent deadline is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut child = self.child();
        let candidate = Instant::now() + timeout;
        child.deadline = Some(match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        });
        child
    }

    /// Set a custom value.
    pub fn set<T: Send + Sync + 'static>(&self, key: &str, value: T) {
        if let Ok(mut values) = self.values.write() {
            values.insert(key.to_string(), Arc::new(value));
        }
    }

    /// Get a custom value.
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        let values = self.values.read().ok()?;
        values
            .get(key)
            .cloned()
            .and_then(|v| v.downcast::<T>().ok())
    }

    /// Remove a custom value.
    pub fn remove(&self, key: &str) -> bool {
        self.values
            .write()
            .map(|mut values| values.remove(key).is_some())
            .unwrap_or(false)
    }

    /// Get elapsed time since request started.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Get elapsed time in milliseconds.
    #[inline]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("request_id", &self.request_id)
            .field("trace_id", &self.trace_id)
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

/// Build request ID from trace_id and span_id.
#[inline]
fn make_request_id(trace_id: &str, span_id: &str) -> String {
    let trace_part = &trace_id[..12.min(trace_id.len())];
    let span_part = &span_id[..4.min(span_id.len())];

    let mut id = String::with_capacity(trace_part.len() + 1 + span_part.len());
    id.push_str(trace_part);
    id.push('-');
    id.push_str(span_part);
    id
}

/// Builder for creating Context with more control.
#[derive(Default)]
pub struct ContextBuilder {
    trace_id: Option<String>,
    request_id: Option<String>,
    parent: Option<CancellationToken>,
    timeout: Option<Duration>,
}

impl ContextBuilder {
    /// Create a new context builder.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the trace ID.
    #[inline]
    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Use an externally supplied request ID (e.g. from `X-Request-ID`).
    #[inline]
    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Inherit cancellation from a parent token (e.g. server shutdown).
    #[inline]
    pub fn parent(mut self, token: &CancellationToken) -> Self {
        self.parent = Some(token.child_token());
        self
    }

    /// Set a deadline relative to build time.
    #[inline]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the context.
    pub fn build(self) -> Context {
        let trace_id = self.trace_id.unwrap_or_else(generate_trace_id);
        let request_id = self
            .request_id
            .unwrap_or_else(|| make_request_id(&trace_id, &generate_span_id()));
        let started_at = Instant::now();

        Context {
            request_id,
            trace_id,
            started_at,
            token: self.parent.unwrap_or_default(),
            deadline: self.timeout.map(|t| started_at + t),
            values: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

// ============================================================================
// Fast random ID generation with thread-local state
// ============================================================================

thread_local! {
    static RNG_STATE: Cell<u64> = Cell::new(init_rng_seed());
}

/// Initialize RNG seed from system entropy.
fn init_rng_seed() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    use std::time::{SystemTime, UNIX_EPOCH};

    let state = RandomState::new();
    let mut hasher = state.build_hasher();
    hasher.write_u64(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64,
    );
    // xorshift never leaves zero
    hasher.finish() | 1
}

#[inline]
fn rand_u64() -> u64 {
    RNG_STATE.with(|state| {
        let mut x = state.get();
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        state.set(x);
        x
    })
}

/// Generate a random trace ID (32 hex chars).
pub fn generate_trace_id() -> String {
    use std::fmt::Write;
    use std::time::{SystemTime, UNIX_EPOCH};

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;

    let mut id = String::with_capacity(32);
    let _ = write!(id, "{:016x}{:016x}", timestamp, rand_u64());
    id
}

/// Generate a random span ID (16 hex chars).
#[inline]
pub fn generate_span_id() -> String {
    use std::fmt::Write;

    let mut id = String::with_capacity(16);
    let _ = write!(id, "{:016x}", rand_u64());
    id
}
