//! Single-slot latest-wins handoff between the tick thread and a background task

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Holds at most one value. Storing replaces whatever has not been taken yet.
///
/// The lock is held only for the swap itself; waiting happens on a [`Notify`]
/// outside the lock, so a slow consumer never stalls the producer.
#[derive(Debug)]
pub struct LatestSlot<T> {
    value: Mutex<Option<T>>,
    ready: Notify,
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self { value: Mutex::new(None), ready: Notify::new() }
    }

    /// Store a value, returning the unconsumed value it replaced
    pub fn put(&self, value: T) -> Option<T> {
        let previous = self.value.lock().replace(value);
        self.ready.notify_one();
        previous
    }

    /// Take the value if one is ready
    pub fn take(&self) -> Option<T> {
        self.value.lock().take()
    }

    pub fn is_ready(&self) -> bool {
        self.value.lock().is_some()
    }

    /// Wait until a value is stored, then take it.
    ///
    /// Cancel safe: dropping the future never loses a value.
    pub async fn wait(&self) -> T {
        loop {
            if let Some(value) = self.take() {
                return value;
            }
            self.ready.notified().await;
        }
    }
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
