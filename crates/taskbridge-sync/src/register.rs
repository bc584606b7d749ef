//! [`LatestValue`] – mutex-guarded single-slot store.
//!
//! Last-write-wins, no history, no blocking, no notification.  Used for
//! continuously updated state (perception snapshots, the phase mirror) where
//! staleness is acceptable and only the freshest value is meaningful.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// A single-slot cell: [`write`][LatestValue::write] overwrites,
/// [`read`][LatestValue::read] copies out the current value.
///
/// The lock guarantees each read/write is atomic as a whole; concurrent
/// writers are last-write-wins in arrival order.
///
/// # Example
///
/// ```
/// use taskbridge_sync::LatestValue;
///
/// let register = LatestValue::new(0u32);
/// register.write(5);
/// register.write(9);
/// assert_eq!(register.read(), 9);
/// ```
#[derive(Debug)]
pub struct LatestValue<T> {
    slot: Mutex<T>,
}

impl<T: Clone> LatestValue<T> {
    pub fn new(initial: T) -> Self {
        Self {
            slot: Mutex::new(initial),
        }
    }

    /// Overwrite the slot.  Never blocks beyond the lock.
    pub fn write(&self, value: T) {
        *self.lock() = value;
    }

    /// Copy out the current value.  Never blocks beyond the lock.
    pub fn read(&self) -> T {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + Default> Default for LatestValue<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
