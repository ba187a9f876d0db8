use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

/// Lock-free count of connections that exist or are being created.
///
/// Slots are reserved before a connection exists, so the count may run ahead of
/// the pools but never past `max`.
#[derive(Debug)]
pub struct ConnectionCounter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionCounter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    pub fn get(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Reserve one slot.
    ///
    /// # Returns
    /// - `Ok(next)` with the new count when the slot was reserved
    /// - `Err(current)` when the limit is already reached
    pub fn try_reserve(&self) -> Result<usize, usize> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            let next = current + 1;

            if next > self.max {
                return Err(current);
            }

            match self
                .current
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Ok(next),
                Err(actual) => {
                    trace!("Connection count changed {} -> {}, retrying", current, actual);
                    continue;
                }
            }
        }
    }

    /// Release one slot. Saturates at zero and returns the new count.
    pub fn release(&self) -> usize {
        match self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            }) {
            Ok(previous) => previous - 1,
            Err(_) => {
                trace!("Connection count already at zero");
                0
            }
        }
    }

    pub fn reset(&self) {
        self.current.store(0, Ordering::Release);
    }
}
