use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

/// Bounded FIFO shared between threads.
///
/// Every operation is a single short critical section and none of them waits
/// for capacity: `offer` hands the item back when the queue is full. The lock
/// is never held while user code runs.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    // Every mutation leaves the deque consistent, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Append at the tail, or return the item if the queue is full.
    pub fn offer(&self, item: T) -> Result<(), T> {
        let mut items = self.lock();
        if items.len() >= self.capacity {
            return Err(item);
        }
        items.push_back(item);
        Ok(())
    }

    /// Take the head, if any.
    pub fn poll(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Remove the first item matching `predicate`.
    pub fn remove_first<F>(&self, predicate: F) -> Option<T>
    where
        F: Fn(&T) -> bool,
    {
        let mut items = self.lock();
        let index = items.iter().position(predicate)?;
        items.remove(index)
    }

    /// Take every item, leaving the queue empty.
    pub fn drain(&self) -> Vec<T> {
        self.lock().drain(..).collect()
    }

}

impl<T: Clone> BoundedQueue<T> {
    /// Copy of the current contents, head first.
    pub fn snapshot(&self) -> Vec<T> {
        self.lock().iter().cloned().collect()
    }
}
