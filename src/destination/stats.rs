use serde::Serialize;
use std::fmt;

/// Pool a connection was found in when the snapshot was taken.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PooledConnectionState {
    Idle,
    Active,
}

impl fmt::Display for PooledConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PooledConnectionState::Idle => write!(f, "IDLE"),
            PooledConnectionState::Active => write!(f, "ACTIVE"),
        }
    }
}

/// Point-in-time view of a destination.
///
/// Fields are read one after another without a common lock, so under load they
/// may not add up exactly.
#[derive(Debug, Clone, Serialize)]
pub struct DestinationStats {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub queued_requests: usize,
    pub idle_connections: usize,
    pub active_connections: usize,
    /// Connections that exist or are being created
    pub connection_count: usize,
    pub max_connections: usize,
    pub max_queue_size: usize,
}
