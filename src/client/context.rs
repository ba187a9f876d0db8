use crate::destination::{ConnectionRef, Destination};
use crate::exchange::RequestListener;
use std::fmt;
use std::io;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Unit of work handed to a `TaskRunner`.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Completion handler for connection creation.
pub type ConnectCallback = Box<dyn FnOnce(io::Result<ConnectionRef>) + Send + 'static>;

/// Executor used to move work off the calling thread.
pub trait TaskRunner: Send + Sync {
    fn execute(&self, task: Task);
}

/// Establishes transport connections (resolution, handshake, TLS).
///
/// `connect` must not block; the outcome is reported through `callback`,
/// possibly from another thread.
pub trait Connector: Send + Sync {
    fn connect(&self, destination: &Arc<Destination>, callback: ConnectCallback);
}

/// What a destination needs from the client that owns it.
pub trait ClientContext: Send + Sync + fmt::Display {
    fn is_running(&self) -> bool;

    fn executor(&self) -> Arc<dyn TaskRunner>;

    fn max_connections_per_address(&self) -> usize;

    fn max_queue_size_per_address(&self) -> usize;

    fn new_connection(&self, destination: &Arc<Destination>, callback: ConnectCallback);

    /// Client-wide request listeners, captured when a destination is created.
    fn request_listeners(&self) -> Vec<Arc<dyn RequestListener>> {
        Vec::new()
    }
}

/// `TaskRunner` backed by a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Executor for the runtime the caller is running on.
    pub fn current() -> crate::Result<Self> {
        let handle = Handle::try_current().map_err(|e| {
            crate::DestPoolError::Config(format!("No tokio runtime available: {}", e))
        })?;
        Ok(Self::new(handle))
    }
}

impl TaskRunner for TokioExecutor {
    fn execute(&self, task: Task) {
        self.handle.spawn(async move { task() });
    }
}
