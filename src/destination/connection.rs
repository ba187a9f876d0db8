use crate::exchange::{Request, ResponseListener};
use std::fmt;
use std::sync::Arc;

/// Transport connection to a destination.
///
/// Framing, TLS and socket IO live behind this trait. A connection reports back
/// through `Destination::release` when an exchange finishes and through
/// `Destination::remove` when it breaks.
pub trait Connection: Send + Sync + fmt::Debug {
    /// Start sending `request`; the outcome is reported to `listener`.
    fn send(&self, request: Arc<Request>, listener: Arc<dyn ResponseListener>);

    fn close(&self);
}

pub type ConnectionRef = Arc<dyn Connection>;

/// Pointer identity of two connection handles.
pub fn same_connection(a: &ConnectionRef, b: &ConnectionRef) -> bool {
    // Compare data pointers only; vtable pointers for the same type may differ.
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
