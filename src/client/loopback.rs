use super::context::{ConnectCallback, Connector};
use crate::config::LoopbackConfig;
use crate::destination::{Connection, ConnectionRef, Destination};
use crate::exchange::{ExchangeResult, Request, ResponseContext, ResponseListener};
use crate::utils::error::ExchangeError;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::trace;

/// In-memory transport: connections "connect" and "exchange" after fixed
/// latencies and answer every request successfully.
pub struct LoopbackConnector {
    config: LoopbackConfig,
    handle: Handle,
    next_id: AtomicU64,
}

impl LoopbackConnector {
    pub fn new(config: LoopbackConfig, handle: Handle) -> Self {
        Self {
            config,
            handle,
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of connections created so far.
    pub fn created(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed) - 1
    }
}

impl Connector for LoopbackConnector {
    fn connect(&self, destination: &Arc<Destination>, callback: ConnectCallback) {
        let connect_latency = Duration::from_millis(self.config.connect_latency_ms);
        let exchange_latency = Duration::from_millis(self.config.exchange_latency_ms);
        let fail = self.config.fail_connect;
        let target = destination.to_string();
        let destination = Arc::downgrade(destination);
        let handle = self.handle.clone();
        let id = if fail {
            0
        } else {
            self.next_id.fetch_add(1, Ordering::Relaxed)
        };

        self.handle.spawn(async move {
            tokio::time::sleep(connect_latency).await;
            if fail {
                callback(Err(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    format!("loopback connect to {} refused", target),
                )));
                return;
            }

            let connection: ConnectionRef =
                LoopbackConnection::new(id, destination, exchange_latency, handle);
            callback(Ok(connection));
        });
    }
}

pub struct LoopbackConnection {
    id: u64,
    destination: Weak<Destination>,
    exchange_latency: Duration,
    handle: Handle,
    closed: AtomicBool,
    exchanges: AtomicU64,
    me: Weak<LoopbackConnection>,
}

impl LoopbackConnection {
    pub fn new(
        id: u64,
        destination: Weak<Destination>,
        exchange_latency: Duration,
        handle: Handle,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            id,
            destination,
            exchange_latency,
            handle,
            closed: AtomicBool::new(false),
            exchanges: AtomicU64::new(0),
            me: me.clone(),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Exchanges completed on this connection.
    pub fn exchanges(&self) -> u64 {
        self.exchanges.load(Ordering::Relaxed)
    }
}

impl Connection for LoopbackConnection {
    fn send(&self, request: Arc<Request>, listener: Arc<dyn ResponseListener>) {
        let Some(me) = self.me.upgrade() else {
            return;
        };
        let latency = self.exchange_latency;

        self.handle.spawn(async move {
            tokio::time::sleep(latency).await;
            let response = ResponseContext::new(Arc::clone(&request));

            if me.is_closed() {
                let failure = ExchangeError::AsynchronousClose;
                listener.on_failure(&response, &failure);
                listener.on_complete(&ExchangeResult::failed(
                    request,
                    failure.clone(),
                    Some(response),
                    failure,
                ));
                return;
            }

            me.exchanges.fetch_add(1, Ordering::Relaxed);
            trace!("{:?} completed {}", me, request);
            listener.on_complete(&ExchangeResult::succeeded(request, response));

            if let Some(destination) = me.destination.upgrade() {
                let connection: ConnectionRef = me;
                destination.release(&connection);
            }
        });
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl fmt::Debug for LoopbackConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoopbackConnection#{}", self.id)
    }
}
