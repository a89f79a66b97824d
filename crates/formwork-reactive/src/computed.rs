#![forbid(unsafe_code)]

//! Lazily evaluated, memoized values derived from observables.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::observable::{Observable, Subscription};

struct Inner<T> {
    compute: Box<dyn Fn() -> T>,
    cached: RefCell<Option<T>>,
    dirty: Cell<bool>,
    recomputes: Cell<u64>,
    sources: RefCell<Vec<Subscription>>,
}

/// A derived value that recomputes on demand.
///
/// Every tracked source marks the value dirty when it notifies; the compute
/// function only runs on the next [`Computed::get`] after that. Between
/// changes the cached value is returned as-is.
pub struct Computed<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("dirty", &self.inner.dirty.get())
            .field("recomputes", &self.inner.recomputes.get())
            .field("sources", &self.inner.sources.borrow().len())
            .finish()
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Create a derived value. It starts dirty and has no tracked sources.
    #[must_use]
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        Self {
            inner: Rc::new(Inner {
                compute: Box::new(compute),
                cached: RefCell::new(None),
                dirty: Cell::new(true),
                recomputes: Cell::new(0),
                sources: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Invalidate this value whenever `source` changes.
    pub fn track<U: Clone + 'static>(&self, source: &Observable<U>) -> &Self {
        let weak: Weak<Inner<T>> = Rc::downgrade(&self.inner);
        let sub = source.subscribe(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.dirty.set(true);
            }
        });
        self.inner.sources.borrow_mut().push(sub);
        self
    }

    /// Current value, recomputed first if any source changed.
    pub fn get(&self) -> T {
        if !self.inner.dirty.get()
            && let Some(value) = self.inner.cached.borrow().as_ref()
        {
            return value.clone();
        }
        // Clear the flag before computing so a source notifying mid-compute
        // leaves the value dirty for the next read.
        self.inner.dirty.set(false);
        let value = (self.inner.compute)();
        self.inner.recomputes.set(self.inner.recomputes.get() + 1);
        *self.inner.cached.borrow_mut() = Some(value.clone());
        value
    }

    /// Force the next `get` to recompute.
    pub fn invalidate(&self) {
        self.inner.dirty.set(true);
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// How many times the compute function has run.
    #[must_use]
    pub fn recompute_count(&self) -> u64 {
        self.inner.recomputes.get()
    }
}
