// destpool - per-destination connection pooling and request dispatch

pub mod client;
pub mod config;
pub mod destination;
pub mod exchange;
pub mod utils;

// Re-export commonly used types
pub use client::{ClientContext, ConnectCallback, Connector, HttpClient, Task, TaskRunner};
pub use destination::{Connection, ConnectionRef, Destination, DestinationStats};
pub use exchange::{ExchangeResult, Request, RequestListener, ResponseContext, ResponseListener};
pub use utils::error::{DestPoolError, ExchangeError, Result};
