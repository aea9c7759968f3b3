//! Viewport resize notifications.
//!
//! The host owns a [`ResizeSignal`] and emits on every window size change.
//! Subscribers get a [`ListenerId`] back and must unsubscribe on teardown,
//! otherwise their callback keeps firing (and keeps its captures alive).

use std::cell::RefCell;
use std::rc::Rc;

/// Size of the drawable area in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height, guarding against a zero height (minimised window).
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// A zero-sized viewport cannot back a surface.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Handle returned by [`ResizeSignal::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(Viewport)>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, Listener)>,
    /// Ids of the listeners taken out by an emit in progress.
    in_flight: Vec<ListenerId>,
    /// In-flight listeners unsubscribed during that emit.
    removed: Vec<ListenerId>,
}

/// Single-threaded listener registry. Clones refer to the same registry.
#[derive(Clone, Default)]
pub struct ResizeSignal {
    inner: Rc<RefCell<Listeners>>,
}

impl ResizeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for future resizes.
    pub fn subscribe(&self, listener: impl FnMut(Viewport) + 'static) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.entries.push((id, Box::new(listener)));
        id
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.entries.len();
        inner.entries.retain(|(entry_id, _)| *entry_id != id);
        if inner.entries.len() != before {
            return true;
        }
        if inner.in_flight.contains(&id) && !inner.removed.contains(&id) {
            inner.removed.push(id);
            return true;
        }
        false
    }

    /// Deliver a resize to every listener. Returns how many were called.
    pub fn emit(&self, viewport: Viewport) -> usize {
        // Listeners run without the registry borrowed so they may (un)subscribe.
        let mut taken = {
            let mut inner = self.inner.borrow_mut();
            let taken = std::mem::take(&mut inner.entries);
            inner.in_flight = taken.iter().map(|(id, _)| *id).collect();
            taken
        };

        let mut called = 0;
        for (id, listener) in taken.iter_mut() {
            // An earlier listener may have removed this one.
            if self.inner.borrow().removed.contains(id) {
                continue;
            }
            listener(viewport);
            called += 1;
        }

        let mut inner = self.inner.borrow_mut();
        let removed = std::mem::take(&mut inner.removed);
        inner.in_flight.clear();
        taken.retain(|(id, _)| !removed.contains(id));
        let added = std::mem::take(&mut inner.entries);
        inner.entries = taken;
        inner.entries.extend(added);
        called
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().entries.len()
    }
}

impl std::fmt::Debug for ResizeSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResizeSignal")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
