mod connection;
mod counter;
mod metrics;
mod pool;
mod queue;
mod stats;

pub use connection::{same_connection, Connection, ConnectionRef};
pub use counter::ConnectionCounter;
pub use metrics::DestinationMetrics;
pub use pool::Destination;
pub use queue::BoundedQueue;
pub use stats::{DestinationStats, PooledConnectionState};
