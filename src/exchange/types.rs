use crate::utils::error::ExchangeError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Outgoing request as seen by the pooling layer.
///
/// Only the routing triple and the abort flag matter here; method and path are
/// carried for logging. Identity (not equality) is what queues and aborts key on,
/// so requests are always handled through `Arc<Request>`.
#[derive(Debug)]
pub struct Request {
    id: Uuid,
    scheme: String,
    host: String,
    port: Option<u16>,
    method: String,
    path: String,
    aborted: AtomicBool,
}

impl Request {
    /// Create a `GET /` request for the given scheme and host, with no explicit port.
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            scheme: scheme.into(),
            host: host.into(),
            port: None,
            method: "GET".to_string(),
            path: "/".to_string(),
            aborted: AtomicBool::new(false),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Explicit port, `None` when the request leaves it to the scheme default.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Mark the request as aborted.
    ///
    /// A queued request that is marked aborted is failed instead of being sent
    /// when a connection picks it up.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    pub fn aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(
                f,
                "Request[{} {}://{}:{}{}]@{}",
                self.method, self.scheme, self.host, port, self.path, self.id
            ),
            None => write!(
                f,
                "Request[{} {}://{}{}]@{}",
                self.method, self.scheme, self.host, self.path, self.id
            ),
        }
    }
}

/// Response-side state handed to listeners alongside a failure.
#[derive(Debug, Clone)]
pub struct ResponseContext {
    request: Arc<Request>,
}

impl ResponseContext {
    pub fn new(request: Arc<Request>) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }
}

/// Final outcome of an exchange, passed to `ResponseListener::on_complete`.
#[derive(Debug, Clone)]
pub struct ExchangeResult {
    pub request: Arc<Request>,
    pub request_failure: Option<ExchangeError>,
    pub response: Option<ResponseContext>,
    pub response_failure: Option<ExchangeError>,
}

impl ExchangeResult {
    pub fn succeeded(request: Arc<Request>, response: ResponseContext) -> Self {
        Self {
            request,
            request_failure: None,
            response: Some(response),
            response_failure: None,
        }
    }

    pub fn failed(
        request: Arc<Request>,
        request_failure: ExchangeError,
        response: Option<ResponseContext>,
        response_failure: ExchangeError,
    ) -> Self {
        Self {
            request,
            request_failure: Some(request_failure),
            response,
            response_failure: Some(response_failure),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.request_failure.is_some() || self.response_failure.is_some()
    }

    /// First failure of the exchange, request side taking precedence.
    pub fn failure(&self) -> Option<&ExchangeError> {
        self.request_failure
            .as_ref()
            .or(self.response_failure.as_ref())
    }
}

/// Per-exchange observer supplied by the caller of `send`.
pub trait ResponseListener: Send + Sync {
    fn on_failure(&self, _response: &ResponseContext, _failure: &ExchangeError) {}

    fn on_complete(&self, _result: &ExchangeResult) {}
}

/// Client-wide observer of request lifecycle events.
pub trait RequestListener: Send + Sync {
    fn on_queued(&self, _request: &Request) {}

    fn on_failure(&self, _request: &Request, _failure: &ExchangeError) {}
}

/// A queued request bound to its listener.
#[derive(Clone)]
pub struct RequestPair {
    pub request: Arc<Request>,
    pub listener: Arc<dyn ResponseListener>,
}

impl RequestPair {
    pub fn new(request: Arc<Request>, listener: Arc<dyn ResponseListener>) -> Self {
        Self { request, listener }
    }

    /// True when this pair carries exactly `request` (pointer identity).
    pub fn is_for(&self, request: &Arc<Request>) -> bool {
        Arc::ptr_eq(&self.request, request)
    }
}

impl PartialEq for RequestPair {
    fn eq(&self, other: &Self) -> bool {
        self.is_for(&other.request)
    }
}

impl Eq for RequestPair {}

impl fmt::Debug for RequestPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestPair")
            .field("request", &self.request.id())
            .finish()
    }
}
