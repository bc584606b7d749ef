//! [`HandoffChannel`] – bounded-wait, thread-safe FIFO.
//!
//! Two access modes:
//!
//! | Producer | Consumer | Use |
//! |---|---|---|
//! | [`push`][HandoffChannel::push] | [`try_pop`][HandoffChannel::try_pop] | Callers that must never stall (tree tick). |
//! | [`push_notify`][HandoffChannel::push_notify] | [`pop_wait`][HandoffChannel::pop_wait] | The executor-facing thread, waiting up to a bound for an acknowledgement. |
//!
//! A `pop_wait` timeout is not an error: it means "nothing arrived in time"
//! and the caller decides the consequence.  The queue is unbounded; the
//! command arbiter's one-outstanding-request discipline is the backpressure.
//! Single-producer/single-consumer per instance is the supported usage.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::trace;

/// Default bound for [`HandoffChannel::pop_wait`].
pub const DEFAULT_POP_TIMEOUT: Duration = Duration::from_secs(2);

/// A thread-safe FIFO passing discrete events between the tick thread and the
/// executor-facing thread.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use taskbridge_sync::HandoffChannel;
///
/// let channel = HandoffChannel::new();
/// channel.push_notify(42);
/// assert_eq!(channel.pop_wait(Duration::from_millis(10)), Some(42));
/// assert_eq!(channel.try_pop(), None);
/// ```
#[derive(Debug)]
pub struct HandoffChannel<T> {
    queue: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> HandoffChannel<T> {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Enqueue without waking any waiter.  Never blocks beyond the lock.
    pub fn push(&self, value: T) {
        self.lock().push_back(value);
    }

    /// Dequeue the oldest value, or `None` when the queue is empty.
    /// Never blocks beyond the lock.
    pub fn try_pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Enqueue and wake a waiting [`pop_wait`][HandoffChannel::pop_wait], if
    /// any.
    pub fn push_notify(&self, value: T) {
        self.lock().push_back(value);
        self.available.notify_one();
    }

    /// Block up to `timeout` for a value, waking immediately if one arrives
    /// earlier.  Returns `None` on timeout.
    pub fn pop_wait(&self, timeout: Duration) -> Option<T> {
        let guard = self.lock();
        let (mut guard, result) = self
            .available
            .wait_timeout_while(guard, timeout, |queue| queue.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() && guard.is_empty() {
            trace!(?timeout, "hand-off channel: pop_wait timed out");
            None
        } else {
            guard.pop_front()
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A poisoned lock only means another thread panicked mid-push/pop; the
    // queue itself is still structurally sound, so keep going.
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for HandoffChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn try_pop_on_empty_returns_none() {
        let channel: HandoffChannel<u32> = HandoffChannel::new();
        assert_eq!(channel.try_pop(), None);
    }

    #[test]
    fn fifo_order_is_preserved() {
        let channel = HandoffChannel::new();
        channel.push(1);
        channel.push(2);
        channel.push(3);
        assert_eq!(channel.try_pop(), Some(1));
        assert_eq!(channel.try_pop(), Some(2));
        assert_eq!(channel.try_pop(), Some(3));
        assert_eq!(channel.try_pop(), None);
    }

    #[test]
    fn pop_wait_returns_queued_value_immediately() {
        let channel = HandoffChannel::new();
        channel.push_notify("ack");
        let start = Instant::now();
        assert_eq!(channel.pop_wait(Duration::from_secs(2)), Some("ack"));
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn pop_wait_times_out_after_the_bound() {
        let channel: HandoffChannel<u32> = HandoffChannel::new();
        let start = Instant::now();
        assert_eq!(channel.pop_wait(Duration::from_millis(50)), None);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(50), "returned too early: {elapsed:?}");
        assert!(elapsed < Duration::from_secs(1), "blocked far past the bound");
    }

    #[test]
    fn pop_wait_wakes_on_push_notify_from_another_thread() {
        let channel = Arc::new(HandoffChannel::new());
        let producer = Arc::clone(&channel);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            producer.push_notify(99);
        });
        let start = Instant::now();
        assert_eq!(channel.pop_wait(Duration::from_secs(2)), Some(99));
        // Woke on notify, well before the 2 s bound.
        assert!(start.elapsed() < Duration::from_millis(500));
        handle.join().unwrap();
    }

    #[test]
    fn plain_push_is_still_visible_to_pop_wait() {
        // push (no notify) before the wait begins: the predicate check on
        // entry must find the value without needing a wakeup.
        let channel = HandoffChannel::new();
        channel.push(7);
        assert_eq!(channel.pop_wait(Duration::from_millis(10)), Some(7));
    }

    #[test]
    fn len_and_is_empty_track_contents() {
        let channel = HandoffChannel::new();
        assert!(channel.is_empty());
        channel.push(1);
        channel.push(2);
        assert_eq!(channel.len(), 2);
        channel.try_pop();
        assert_eq!(channel.len(), 1);
    }
}
