use super::connection::{same_connection, ConnectionRef};
use super::counter::ConnectionCounter;
use super::metrics::DestinationMetrics;
use super::queue::BoundedQueue;
use super::stats::{DestinationStats, PooledConnectionState};
use crate::client::ClientContext;
use crate::exchange::{
    ExchangeResult, Request, RequestNotifier, RequestPair, ResponseContext, ResponseListener,
    ResponseNotifier,
};
use crate::utils::error::{DestPoolError, ExchangeError, Result};
use std::fmt;
use std::fmt::Write as _;
use std::future::Future;
use std::io;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Connection pool and request queue for one (scheme, host, port).
///
/// Requests wait in a bounded FIFO until a connection is free. Connections are
/// created lazily up to the client's per-address limit and move between the
/// idle and active pools as exchanges start and finish. No operation blocks:
/// full queues are reported to the caller and connection creation completes
/// through a callback.
pub struct Destination {
    client: Arc<dyn ClientContext>,
    scheme: String,
    host: String,
    port: u16,
    connection_count: ConnectionCounter,
    requests: BoundedQueue<RequestPair>,
    idle_connections: BoundedQueue<ConnectionRef>,
    active_connections: BoundedQueue<ConnectionRef>,
    request_notifier: RequestNotifier,
    response_notifier: ResponseNotifier,
}

impl Destination {
    pub fn new(
        client: Arc<dyn ClientContext>,
        scheme: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        let max_connections = client.max_connections_per_address();
        let max_queue = client.max_queue_size_per_address();
        let request_notifier = RequestNotifier::new(client.request_listeners());

        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
            connection_count: ConnectionCounter::new(max_connections),
            requests: BoundedQueue::new(max_queue),
            idle_connections: BoundedQueue::new(max_connections),
            active_connections: BoundedQueue::new(max_connections),
            request_notifier,
            response_notifier: ResponseNotifier::new(),
            client,
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Queue `request` and try to put it on a connection.
    ///
    /// # Errors
    /// - `InvalidScheme`/`InvalidHost`/`InvalidPort` if the request targets another destination
    /// - `Stopped`/`Stopping` if the client is not (or no longer) running
    /// - `QueueFull` if the per-address queue is at capacity
    pub fn send(
        self: &Arc<Self>,
        request: Arc<Request>,
        listener: Arc<dyn ResponseListener>,
    ) -> Result<()> {
        self.validate(&request)?;

        if !self.client.is_running() {
            DestinationMetrics::record_rejected();
            return Err(DestPoolError::Stopped {
                client: self.client.to_string(),
            });
        }

        let pair = RequestPair::new(Arc::clone(&request), listener);
        if self.requests.offer(pair).is_err() {
            DestinationMetrics::record_rejected();
            return Err(DestPoolError::QueueFull {
                capacity: self.requests.capacity(),
            });
        }

        // The client may have stopped after the check above; close() could have
        // drained the queue already, in which case the request was failed there.
        if !self.client.is_running()
            && self.requests.remove_first(|p| p.is_for(&request)).is_some()
        {
            DestinationMetrics::record_rejected();
            return Err(DestPoolError::Stopping {
                client: self.client.to_string(),
            });
        }

        debug!("Queued {} on {}", request, self);
        DestinationMetrics::record_queued();
        self.request_notifier.notify_queued(&request);

        if let Some(connection) = self.acquire() {
            self.process(connection, false);
        }
        Ok(())
    }

    fn validate(&self, request: &Request) -> Result<()> {
        if request.scheme() != self.scheme {
            return Err(DestPoolError::InvalidScheme {
                scheme: request.scheme().to_string(),
                destination: self.to_string(),
            });
        }
        if request.host() != self.host {
            return Err(DestPoolError::InvalidHost {
                host: request.host().to_string(),
                destination: self.to_string(),
            });
        }
        if let Some(port) = request.port() {
            if port != self.port {
                return Err(DestPoolError::InvalidPort {
                    port,
                    destination: self.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Create a raw connection to this destination.
    ///
    /// The connection is not pooled and does not count against the
    /// per-address limit.
    pub fn new_connection(
        self: &Arc<Self>,
    ) -> impl Future<Output = Result<ConnectionRef>> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        self.client.new_connection(
            self,
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );

        async move {
            match rx.await {
                Ok(Ok(connection)) => Ok(connection),
                Ok(Err(e)) => Err(DestPoolError::Io(e)),
                Err(_) => Err(DestPoolError::ConnectionFailed(
                    "connector dropped the completion callback".to_string(),
                )),
            }
        }
    }

    /// Get a connection to run a queued request on.
    ///
    /// Prefers an idle connection. Otherwise reserves a slot and starts creating
    /// a connection, which is dispatched from its completion callback; the
    /// return value is then whatever became idle in the meantime, usually `None`.
    pub(crate) fn acquire(self: &Arc<Self>) -> Option<ConnectionRef> {
        if let Some(connection) = self.idle_connections.poll() {
            return Some(connection);
        }

        let max_connections = self.connection_count.max();
        match self.connection_count.try_reserve() {
            Err(current) => {
                debug!(
                    "Max connections {}/{} reached for {}",
                    current, max_connections, self
                );
                // One may have been released since the first poll.
                self.idle_connections.poll()
            }
            Ok(next) => {
                debug!(
                    "Creating connection {}/{} for {}",
                    next, max_connections, self
                );
                let destination = Arc::clone(self);
                self.client.new_connection(
                    self,
                    Box::new(move |outcome| destination.connection_created(outcome, next)),
                );
                self.idle_connections.poll()
            }
        }
    }

    fn connection_created(self: &Arc<Self>, outcome: io::Result<ConnectionRef>, slot: usize) {
        match outcome {
            Ok(connection) => {
                debug!(
                    "Created connection {}/{} {:?} for {}",
                    slot,
                    self.connection_count.max(),
                    connection,
                    self
                );
                DestinationMetrics::record_connection_created();
                self.process(connection, true);
            }
            Err(e) => {
                debug!("Connection failed {} for {}", e, self);
                DestinationMetrics::record_connection_failed();
                self.connection_count.release();

                let failure = ExchangeError::from(e);
                let destination = Arc::clone(self);
                self.client.executor().execute(Box::new(move || {
                    destination.fail_next_queued(failure);
                }));
            }
        }
    }

    /// Fail the head of the queue after a connection attempt failed.
    ///
    /// Only one request is failed; the rest wait for the next attempt.
    fn fail_next_queued(&self, failure: ExchangeError) {
        if let Some(pair) = self.requests.poll() {
            debug!("Failing {} after connection failure", pair.request);
            self.request_notifier.notify_failure(&pair.request, &failure);
            self.fail_exchange(&pair, failure.clone(), failure);
        }
    }

    /// Put a free connection to work or park it idle.
    ///
    /// Aborted requests at the head of the queue are failed and skipped. With
    /// `dispatch` the send runs on the client's executor instead of this thread.
    fn process(self: &Arc<Self>, connection: ConnectionRef, dispatch: bool) {
        loop {
            let Some(pair) = self.requests.poll() else {
                self.park(connection);
                return;
            };

            if pair.request.aborted() {
                self.fail_aborted(&pair, "Aborted");
                debug!("Aborted {} before processing", pair.request);
                continue;
            }

            debug!("{:?} active", connection);
            if let Err(overflow) = self.active_connections.offer(Arc::clone(&connection)) {
                warn!("{:?} active overflow on {}", overflow, self);
            }

            let RequestPair { request, listener } = pair;
            if dispatch {
                self.client
                    .executor()
                    .execute(Box::new(move || connection.send(request, listener)));
            } else {
                connection.send(request, listener);
            }
            return;
        }
    }

    fn park(self: &Arc<Self>, connection: ConnectionRef) {
        debug!("{:?} idle", connection);
        if let Err(overflow) = self.idle_connections.offer(Arc::clone(&connection)) {
            // The surplus connection never held a slot of its own.
            debug!("{:?} idle overflow on {}", overflow, self);
            connection.close();
            return;
        }

        if !self.client.is_running() {
            debug!("{} is stopping", self.client);
            self.remove(&connection);
            connection.close();
        }
    }

    /// Return a connection that finished its exchange.
    pub fn release(self: &Arc<Self>, connection: &ConnectionRef) {
        debug!("{:?} released", connection);
        if self.client.is_running() {
            let removed = self
                .active_connections
                .remove_first(|c| same_connection(c, connection))
                .is_some();
            if removed {
                self.process(Arc::clone(connection), false);
            } else {
                debug!("{:?} explicit", connection);
            }
        } else {
            debug!("{} is stopped", self.client);
            self.remove(connection);
            connection.close();
        }
    }

    /// Forget a connection that is going away, e.g. after a transport error.
    ///
    /// If requests are still queued another connection is requested so they do
    /// not wait forever; it may turn out to be unneeded.
    pub fn remove(self: &Arc<Self>, connection: &ConnectionRef) {
        debug!("{:?} removed", connection);
        DestinationMetrics::record_connection_removed();
        self.connection_count.release();
        self.active_connections
            .remove_first(|c| same_connection(c, connection));
        self.idle_connections
            .remove_first(|c| same_connection(c, connection));

        if !self.requests.is_empty() {
            if let Some(next) = self.acquire() {
                self.process(next, false);
            }
        }
    }

    /// Close every pooled connection and fail every queued request.
    ///
    /// Active connections are closed mid-exchange.
    pub fn close(&self) {
        for connection in self.idle_connections.drain() {
            connection.close();
        }
        for connection in self.active_connections.drain() {
            connection.close();
        }

        self.connection_count.reset();

        let failure = ExchangeError::AsynchronousClose;
        for pair in self.requests.drain() {
            self.request_notifier.notify_failure(&pair.request, &failure);
            self.fail_exchange(&pair, failure.clone(), failure.clone());
        }

        debug!("Closed {}", self);
    }

    /// Abort `request` if it is still queued.
    ///
    /// Returns `false` if the request is not in the queue, for instance because
    /// a connection already took it.
    pub fn abort(&self, request: &Arc<Request>, reason: &str) -> bool {
        match self.requests.remove_first(|p| p.is_for(request)) {
            Some(pair) => {
                self.fail_aborted(&pair, reason);
                debug!("Aborted {} while queued", request);
                true
            }
            None => false,
        }
    }

    fn fail_aborted(&self, pair: &RequestPair, reason: &str) {
        DestinationMetrics::record_aborted();
        self.fail_exchange(
            pair,
            ExchangeError::RequestAborted {
                reason: reason.to_string(),
            },
            ExchangeError::ResponseAborted {
                reason: reason.to_string(),
            },
        );
    }

    fn fail_exchange(
        &self,
        pair: &RequestPair,
        request_failure: ExchangeError,
        response_failure: ExchangeError,
    ) {
        let listener = pair.listener.as_ref();
        let response = ResponseContext::new(Arc::clone(&pair.request));
        self.response_notifier
            .notify_failure(listener, &response, &response_failure);
        let result = ExchangeResult::failed(
            Arc::clone(&pair.request),
            request_failure,
            Some(response),
            response_failure,
        );
        self.response_notifier.notify_complete(listener, &result);
    }

    pub fn queued_requests(&self) -> usize {
        self.requests.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connection_count.get()
    }

    /// Pooled connections with the pool each was in, idle ones first.
    pub fn connections(&self) -> Vec<(ConnectionRef, PooledConnectionState)> {
        let idle = self
            .idle_connections
            .snapshot()
            .into_iter()
            .map(|c| (c, PooledConnectionState::Idle));
        let active = self
            .active_connections
            .snapshot()
            .into_iter()
            .map(|c| (c, PooledConnectionState::Active));
        idle.chain(active).collect()
    }

    pub fn stats(&self) -> DestinationStats {
        DestinationStats {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            port: self.port,
            queued_requests: self.requests.len(),
            idle_connections: self.idle_connections.len(),
            active_connections: self.active_connections.len(),
            connection_count: self.connection_count.get(),
            max_connections: self.connection_count.max(),
            max_queue_size: self.requests.capacity(),
        }
    }

    /// Human-readable listing of the queue size and every pooled connection.
    pub fn dump(&self) -> String {
        let mut out = format!("{} - requests queued: {}\n", self, self.requests.len());
        for (connection, state) in self.connections() {
            let _ = writeln!(out, " +- {:?} - {}", connection, state);
        }
        out
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Destination({}://{}:{})", self.scheme, self.host, self.port)
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("connection_count", &self.connection_count.get())
            .field("queued_requests", &self.requests.len())
            .finish()
    }
}
