//! Listener handles and the per-node listener registry.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tracing::error;

use crate::changes::Changes;

/// A change callback.
///
/// Registration identity is handle identity: clones of one `Listener` are
/// the same registration target, two handles built from equal closures are
/// not.
#[derive(Clone)]
pub struct Listener {
    callback: Rc<dyn Fn(&Changes)>,
}

impl Listener {
    pub fn new(callback: impl Fn(&Changes) + 'static) -> Self {
        Self {
            callback: Rc::new(callback),
        }
    }

    pub fn ptr_eq(&self, other: &Listener) -> bool {
        Rc::ptr_eq(&self.callback, &other.callback)
    }

    /// Invoke the callback, containing a panic to this one call.
    ///
    /// Returns `false` when the callback panicked.
    pub(crate) fn notify(&self, changes: &Changes) -> bool {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.callback)(changes))) {
            Ok(()) => true,
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                error!(panic = %msg, "listener panicked during flush");
                false
            }
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener")
            .field(&Rc::as_ptr(&self.callback).cast::<()>())
            .finish()
    }
}

/// Ordered listener list; insertion order is notification order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Listeners {
    entries: Vec<Listener>,
}

impl Listeners {
    pub fn add(&mut self, listener: Listener) {
        self.entries.push(listener);
    }

    /// Remove the first registration of `listener`. Returns whether one was
    /// found.
    pub fn remove(&mut self, listener: &Listener) -> bool {
        match self.entries.iter().position(|l| l.ptr_eq(listener)) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries = Vec::new();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Copy of the current registrations, so callbacks can (un)register
    /// while a flush iterates.
    pub fn snapshot(&self) -> Vec<Listener> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn clones_share_identity() {
        let a = Listener::new(|_| {});
        let b = a.clone();
        let c = Listener::new(|_| {});
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn remove_drops_one_registration_and_keeps_order() {
        let a = Listener::new(|_| {});
        let b = Listener::new(|_| {});
        let mut reg = Listeners::default();
        reg.add(a.clone());
        reg.add(b.clone());
        reg.add(a.clone());
        assert!(reg.remove(&a));
        let left = reg.snapshot();
        assert_eq!(left.len(), 2);
        assert!(left[0].ptr_eq(&b));
        assert!(left[1].ptr_eq(&a));
        assert!(!reg.remove(&Listener::new(|_| {})));
    }

    #[test]
    fn notify_contains_panics() {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let ok = Listener::new(move |_| h.set(h.get() + 1));
        let bad = Listener::new(|_| panic!("listener failure"));
        let changes = Changes::new();
        assert!(!bad.notify(&changes));
        assert!(ok.notify(&changes));
        assert_eq!(hits.get(), 1);
    }
}
