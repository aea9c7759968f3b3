//! Frame scheduling capability.
//!
//! The render loop never drives itself. After each frame it asks the host for one
//! more tick through a [`FrameScheduler`]; the host answers by delivering the next
//! redraw. Teardown cancels whatever request is still outstanding.

use std::cell::Cell;
use std::rc::Rc;

/// Host primitive for "call me again on the next display refresh".
pub trait FrameScheduler {
    /// Ask for one more frame tick.
    fn request_frame(&mut self);

    /// Drop any outstanding request. No tick is delivered afterwards unless
    /// `request_frame` is called again.
    fn cancel_frames(&mut self);
}

#[derive(Debug, Default)]
struct ManualState {
    pending: Cell<bool>,
    requests: Cell<u64>,
    cancellations: Cell<u64>,
}

/// Scheduler stepped by hand. Clones share state, so a test can keep one handle
/// while the render loop owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualFrameScheduler {
    state: Rc<ManualState>,
}

impl ManualFrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a frame has been requested and not yet consumed.
    pub fn is_pending(&self) -> bool {
        self.state.pending.get()
    }

    /// Consume the pending request. Returns `true` if the caller should deliver a
    /// frame tick now.
    pub fn take_pending(&self) -> bool {
        self.state.pending.replace(false)
    }

    /// Total number of `request_frame` calls seen.
    pub fn request_count(&self) -> u64 {
        self.state.requests.get()
    }

    /// Total number of `cancel_frames` calls seen.
    pub fn cancel_count(&self) -> u64 {
        self.state.cancellations.get()
    }
}

impl FrameScheduler for ManualFrameScheduler {
    fn request_frame(&mut self) {
        self.state.pending.set(true);
        self.state.requests.set(self.state.requests.get() + 1);
    }

    fn cancel_frames(&mut self) {
        self.state.pending.set(false);
        self.state.cancellations.set(self.state.cancellations.get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_scheduler_shares_state_between_clones() {
        let probe = ManualFrameScheduler::new();
        let mut owned = probe.clone();
        owned.request_frame();
        assert!(probe.is_pending());
        assert!(probe.take_pending());
        assert!(!probe.is_pending());
        assert_eq!(probe.request_count(), 1);
    }

    #[test]
    fn cancel_clears_pending_request() {
        let mut s = ManualFrameScheduler::new();
        s.request_frame();
        s.cancel_frames();
        assert!(!s.take_pending());
        assert_eq!(s.cancel_count(), 1);
    }
}
