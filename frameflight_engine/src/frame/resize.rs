/// Resize notifications shared between the event thread and the render thread
///
/// The event loop calls `notify_resized` whenever the window changes size. The
/// render thread reads the latest extent and, while the window is minimized,
/// sleeps on the condition variable until a new size arrives.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::graphics_device::Extent2D;

#[derive(Debug, Default)]
struct ResizeState {
    latest: Option<Extent2D>,
    pending: bool,
    generation: u64,
}

#[derive(Debug, Default)]
struct ResizeShared {
    state: Mutex<ResizeState>,
    changed: Condvar,
}

/// Cloneable, thread-safe handle for reporting drawable size changes
#[derive(Debug, Clone, Default)]
pub struct ResizeHandle {
    shared: Arc<ResizeShared>,
}

impl ResizeHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ResizeState> {
        self.shared.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a new drawable size and wake a render thread waiting for one
    pub fn notify_resized(&self, extent: Extent2D) {
        let mut state = self.state();
        state.latest = Some(extent);
        state.pending = true;
        state.generation += 1;
        self.shared.changed.notify_all();
    }

    /// Last size reported by the host, if any
    pub fn latest(&self) -> Option<Extent2D> {
        self.state().latest
    }

    /// A resize arrived since the last `take_pending`
    pub fn is_pending(&self) -> bool {
        self.state().pending
    }

    /// Clear the pending flag and return the latest size, under one lock
    ///
    /// A notification arriving afterwards sets the flag again.
    pub fn take_pending(&self) -> Option<Extent2D> {
        let mut state = self.state();
        state.pending = false;
        state.latest
    }

    /// Number of notifications received so far
    pub fn generation(&self) -> u64 {
        self.state().generation
    }

    /// Sleep until a notification newer than `generation` arrives or `timeout` elapses
    ///
    /// Returns the current generation.
    pub fn wait_for_notification(&self, generation: u64, timeout: Duration) -> u64 {
        let state = self.state();
        let (state, _) = self
            .shared
            .changed
            .wait_timeout_while(state, timeout, |state| state.generation == generation)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.generation
    }
}

#[cfg(test)]
mod tests {
    use super::ResizeHandle;
    use crate::graphics_device::Extent2D;
    use std::time::Duration;

    #[test]
    fn test_notify_sets_pending_and_latest() {
        let handle = ResizeHandle::new();
        assert_eq!(handle.latest(), None);
        assert!(!handle.is_pending());

        handle.clone().notify_resized(Extent2D::new(640, 480));
        assert_eq!(handle.latest(), Some(Extent2D::new(640, 480)));
        assert!(handle.is_pending());
        assert_eq!(handle.generation(), 1);

        assert_eq!(handle.take_pending(), Some(Extent2D::new(640, 480)));
        assert!(!handle.is_pending());
        assert_eq!(handle.latest(), Some(Extent2D::new(640, 480)));
    }

    #[test]
    fn test_notification_after_take_stays_pending() {
        let handle = ResizeHandle::new();
        handle.notify_resized(Extent2D::new(640, 480));
        assert_eq!(handle.take_pending(), Some(Extent2D::new(640, 480)));

        handle.notify_resized(Extent2D::new(1280, 720));
        assert!(handle.is_pending());
        assert_eq!(handle.take_pending(), Some(Extent2D::new(1280, 720)));
        assert!(!handle.is_pending());
    }

    #[test]
    fn test_wait_times_out_without_notification() {
        let handle = ResizeHandle::new();
        let generation = handle.wait_for_notification(0, Duration::from_millis(5));
        assert_eq!(generation, 0);
    }

    #[test]
    fn test_wait_wakes_on_notification_from_other_thread() {
        let handle = ResizeHandle::new();
        let notifier = handle.clone();

        let thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            notifier.notify_resized(Extent2D::new(1024, 768));
        });

        let generation = handle.wait_for_notification(0, Duration::from_secs(10));
        thread.join().unwrap();

        assert_eq!(generation, 1);
        assert_eq!(handle.latest(), Some(Extent2D::new(1024, 768)));
    }
}
