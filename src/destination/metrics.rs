#[cfg(feature = "metrics")]
use lazy_static::lazy_static;
#[cfg(feature = "metrics")]
use prometheus::{register_int_counter, IntCounter};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref REQUESTS_QUEUED: IntCounter = register_int_counter!(
        "destpool_requests_queued_total",
        "Total number of requests accepted into a destination queue"
    )
    .expect("register destpool_requests_queued_total counter");
    pub static ref REQUESTS_REJECTED: IntCounter = register_int_counter!(
        "destpool_requests_rejected_total",
        "Total number of requests rejected (queue full or client stopped)"
    )
    .expect("register destpool_requests_rejected_total counter");
    pub static ref REQUESTS_ABORTED: IntCounter = register_int_counter!(
        "destpool_requests_aborted_total",
        "Total number of queued requests failed because they were aborted"
    )
    .expect("register destpool_requests_aborted_total counter");
    pub static ref CONNECTIONS_CREATED: IntCounter = register_int_counter!(
        "destpool_connections_created_total",
        "Total number of connections successfully created for destinations"
    )
    .expect("register destpool_connections_created_total counter");
    pub static ref CONNECTION_FAILURES: IntCounter = register_int_counter!(
        "destpool_connection_failures_total",
        "Total number of failed connection attempts"
    )
    .expect("register destpool_connection_failures_total counter");
    pub static ref CONNECTIONS_REMOVED: IntCounter = register_int_counter!(
        "destpool_connections_removed_total",
        "Total number of connections removed from destination pools"
    )
    .expect("register destpool_connections_removed_total counter");
}

#[derive(Debug, Clone, Copy)]
pub struct DestinationMetrics;

#[cfg(feature = "metrics")]
impl DestinationMetrics {
    #[inline]
    pub fn record_queued() {
        REQUESTS_QUEUED.inc();
    }

    #[inline]
    pub fn record_rejected() {
        REQUESTS_REJECTED.inc();
    }

    #[inline]
    pub fn record_aborted() {
        REQUESTS_ABORTED.inc();
    }

    #[inline]
    pub fn record_connection_created() {
        CONNECTIONS_CREATED.inc();
    }

    #[inline]
    pub fn record_connection_failed() {
        CONNECTION_FAILURES.inc();
    }

    #[inline]
    pub fn record_connection_removed() {
        CONNECTIONS_REMOVED.inc();
    }
}

#[cfg(not(feature = "metrics"))]
impl DestinationMetrics {
    #[inline]
    pub fn record_queued() {}

    #[inline]
    pub fn record_rejected() {}

    #[inline]
    pub fn record_aborted() {}

    #[inline]
    pub fn record_connection_created() {}

    #[inline]
    pub fn record_connection_failed() {}

    #[inline]
    pub fn record_connection_removed() {}
}
