use super::types::{ExchangeResult, Request, RequestListener, ResponseContext, ResponseListener};
use crate::utils::error::ExchangeError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// Run a listener callback, swallowing and logging a panic.
fn guarded<F: FnOnce()>(what: &str, callback: F) {
    if catch_unwind(AssertUnwindSafe(callback)).is_err() {
        warn!("Listener panicked while handling {}", what);
    }
}

/// Fans request lifecycle events out to the client-wide request listeners.
#[derive(Clone, Default)]
pub struct RequestNotifier {
    listeners: Vec<Arc<dyn RequestListener>>,
}

impl RequestNotifier {
    pub fn new(listeners: Vec<Arc<dyn RequestListener>>) -> Self {
        Self { listeners }
    }

    pub fn notify_queued(&self, request: &Request) {
        for listener in &self.listeners {
            guarded("queued", || listener.on_queued(request));
        }
    }

    pub fn notify_failure(&self, request: &Request, failure: &ExchangeError) {
        for listener in &self.listeners {
            guarded("request failure", || listener.on_failure(request, failure));
        }
    }
}

/// Delivers response lifecycle events to the listener of one exchange.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseNotifier;

impl ResponseNotifier {
    pub fn new() -> Self {
        Self
    }

    pub fn notify_failure(
        &self,
        listener: &dyn ResponseListener,
        response: &ResponseContext,
        failure: &ExchangeError,
    ) {
        guarded("response failure", || listener.on_failure(response, failure));
    }

    pub fn notify_complete(&self, listener: &dyn ResponseListener, result: &ExchangeResult) {
        guarded("completion", || listener.on_complete(result));
    }
}
