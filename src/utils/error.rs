use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Errors signalled synchronously to the caller of a destination or client operation.
#[derive(Debug, Error)]
pub enum DestPoolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request scheme {scheme} for destination {destination}")]
    InvalidScheme { scheme: String, destination: String },

    #[error("Invalid request host {host} for destination {destination}")]
    InvalidHost { host: String, destination: String },

    #[error("Invalid request port {port} for destination {destination}")]
    InvalidPort { port: u16, destination: String },

    #[error("No default port for scheme {0}")]
    UnsupportedScheme(String),

    #[error("Max requests per address {capacity} exceeded")]
    QueueFull { capacity: usize },

    #[error("{client} is stopped")]
    Stopped { client: String },

    #[error("{client} is stopping")]
    Stopping { client: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}

impl DestPoolError {
    /// Admission decisions (backpressure or shutdown) as opposed to caller bugs.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            DestPoolError::QueueFull { .. }
                | DestPoolError::Stopped { .. }
                | DestPoolError::Stopping { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DestPoolError>;

/// Failure delivered asynchronously to the observers of a single exchange.
///
/// Cloned once per notification, so the underlying IO error is shared.
#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    #[error("{reason}")]
    RequestAborted { reason: String },

    #[error("{reason}")]
    ResponseAborted { reason: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(Arc<io::Error>),

    #[error("Asynchronous close")]
    AsynchronousClose,
}

impl ExchangeError {
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            ExchangeError::RequestAborted { .. } | ExchangeError::ResponseAborted { .. }
        )
    }

    /// Reason text for abort failures, `None` for every other kind.
    pub fn abort_reason(&self) -> Option<&str> {
        match self {
            ExchangeError::RequestAborted { reason } | ExchangeError::ResponseAborted { reason } => {
                Some(reason)
            }
            _ => None,
        }
    }
}

impl From<io::Error> for ExchangeError {
    fn from(err: io::Error) -> Self {
        ExchangeError::ConnectionFailed(Arc::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_full_message_names_capacity() {
        let err = DestPoolError::QueueFull { capacity: 2 };
        assert_eq!(err.to_string(), "Max requests per address 2 exceeded");
        assert!(err.is_rejection());
    }

    #[test]
    fn invalid_scheme_is_not_a_rejection() {
        let err = DestPoolError::InvalidScheme {
            scheme: "https".into(),
            destination: "Destination(http://example.com:80)".into(),
        };
        assert!(!err.is_rejection());
        assert!(err.to_string().contains("https"));
    }

    #[test]
    fn abort_reason_is_exposed() {
        let err = ExchangeError::ResponseAborted {
            reason: "Aborted".into(),
        };
        assert!(err.is_abort());
        assert_eq!(err.abort_reason(), Some("Aborted"));
        assert_eq!(err.to_string(), "Aborted");

        let io_err: ExchangeError =
            io::Error::new(io::ErrorKind::ConnectionRefused, "refused").into();
        assert!(!io_err.is_abort());
        assert_eq!(io_err.abort_reason(), None);
    }
}
