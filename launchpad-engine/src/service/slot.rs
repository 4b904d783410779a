//! Single-flight task tracking.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

/// A slot that holds at most one in-flight task.
///
/// Work offered while the slot is occupied is dropped rather than queued.
/// Clones share the same slot.
#[derive(Clone, Debug, Default)]
pub struct Slot {
    /// Whether a task is in flight.
    busy: Arc<AtomicBool>,
}

/// Occupies a [`Slot`] until dropped.
#[derive(Debug)]
pub struct Guard {
    /// The flag of the occupied slot.
    busy: Arc<AtomicBool>,
}

impl Drop for Guard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

impl Slot {
    /// Whether a task is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Occupies the slot if it is free.
    pub fn try_acquire(&self) -> Option<Guard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Guard {
                busy: self.busy.clone(),
            })
    }

    /// Runs a future in the slot.
    ///
    /// Returns `None` without polling the future if another task is in
    /// flight. The slot is freed when the future completes or is dropped.
    pub async fn run<F>(&self, future: F) -> Option<F::Output>
    where
        F: Future,
    {
        let _guard = self.try_acquire()?;
        Some(future.await)
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt as _;

    use super::*;

    #[tokio::test]
    async fn overlapping_work_is_dropped() {
        let slot = Slot::default();
        let guard = slot.try_acquire().unwrap();

        assert!(slot.is_busy());
        assert_eq!(slot.clone().run(async { 1 }).await, None);

        drop(guard);
        assert_eq!(slot.run(async { 2 }).await, Some(2));
        assert!(!slot.is_busy());
    }

    #[test]
    fn dropping_the_future_frees_the_slot() {
        let slot = Slot::default();
        let mut future = Box::pin(slot.run(std::future::pending::<()>()));

        assert!((&mut future).now_or_never().is_none());
        assert!(slot.is_busy());

        drop(future);
        assert!(!slot.is_busy());
    }
}
