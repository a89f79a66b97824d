#![forbid(unsafe_code)]

//! Single-threaded deferred task queue ("next tick" delivery).
//!
//! Work that must not run inside the current synchronous section is pushed
//! onto the queue and executed by the owner on its next scheduling round.
//! A round only runs the tasks that were queued when it started; anything a
//! task defers while running waits for the following round. This gives every
//! deferred action one full round in which same-tick changes can settle.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::observable::{Observable, Subscription};

type Task = Box<dyn FnOnce()>;

/// Upper bound on rounds executed by [`DeferredQueue::drain`].
pub const MAX_DRAIN_ROUNDS: usize = 1024;

#[derive(Default)]
struct Inner {
    tasks: VecDeque<Task>,
    rounds: u64,
    executed: u64,
}

/// Cloneable handle to a FIFO of deferred tasks.
#[derive(Clone, Default)]
pub struct DeferredQueue {
    inner: Rc<RefCell<Inner>>,
}

impl fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("DeferredQueue")
            .field("pending", &inner.tasks.len())
            .field("rounds", &inner.rounds)
            .field("executed", &inner.executed)
            .finish()
    }
}

impl DeferredQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` for the next round.
    pub fn defer(&self, task: impl FnOnce() + 'static) {
        self.inner.borrow_mut().tasks.push_back(Box::new(task));
    }

    /// Run one round. Returns the number of tasks executed.
    pub fn run_round(&self) -> usize {
        let count = {
            let mut inner = self.inner.borrow_mut();
            if inner.tasks.is_empty() {
                return 0;
            }
            inner.rounds += 1;
            inner.tasks.len()
        };
        for _ in 0..count {
            let task = self.inner.borrow_mut().tasks.pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
        self.inner.borrow_mut().executed += count as u64;
        tracing::trace!(tasks = count, "deferred round");
        count
    }

    /// Run rounds until the queue is empty. Returns the total task count.
    pub fn drain(&self) -> usize {
        let mut total = 0;
        for _ in 0..MAX_DRAIN_ROUNDS {
            let ran = self.run_round();
            if ran == 0 {
                return total;
            }
            total += ran;
        }
        tracing::warn!(
            pending = self.len(),
            rounds = MAX_DRAIN_ROUNDS,
            "deferred queue did not settle"
        );
        total
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().tasks.is_empty()
    }

    /// Rounds executed so far (empty rounds are not counted).
    #[must_use]
    pub fn rounds(&self) -> u64 {
        self.inner.borrow().rounds
    }

    /// Subscribe to `source` with deferred delivery: each change queues a
    /// call to `callback` with the value as it was at notification time.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn watch<T: Clone + 'static>(
        &self,
        source: &Observable<T>,
        callback: impl Fn(&T) + 'static,
    ) -> Subscription {
        let queue = self.clone();
        let callback = Rc::new(callback);
        source.subscribe(move |value| {
            let callback = Rc::clone(&callback);
            let value = value.clone();
            queue.defer(move || callback(&value));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn tasks_run_in_fifo_order() {
        let queue = DeferredQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = Rc::clone(&log);
            queue.defer(move || log.borrow_mut().push(i));
        }
        assert_eq!(queue.run_round(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn tasks_deferred_during_round_wait_for_next_round() {
        let queue = DeferredQueue::new();
        let hits = Rc::new(Cell::new(0));

        let q = queue.clone();
        let h = Rc::clone(&hits);
        queue.defer(move || {
            h.set(h.get() + 1);
            let h2 = Rc::clone(&h);
            q.defer(move || h2.set(h2.get() + 10));
        });

        assert_eq!(queue.run_round(), 1);
        assert_eq!(hits.get(), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.run_round(), 1);
        assert_eq!(hits.get(), 11);
        assert_eq!(queue.rounds(), 2);
    }

    #[test]
    fn drain_runs_until_empty() {
        let queue = DeferredQueue::new();
        let hits = Rc::new(Cell::new(0));
        let q = queue.clone();
        let h = Rc::clone(&hits);
        queue.defer(move || {
            h.set(h.get() + 1);
            let h2 = Rc::clone(&h);
            q.defer(move || h2.set(h2.get() + 1));
        });
        assert_eq!(queue.drain(), 2);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn watch_delivers_on_next_round() {
        let queue = DeferredQueue::new();
        let source = Observable::new(0);
        let seen = Rc::new(Cell::new(-1));
        let seen_c = Rc::clone(&seen);
        let _sub = queue.watch(&source, move |v| seen_c.set(*v));

        source.set(7);
        assert_eq!(seen.get(), -1);
        queue.run_round();
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn empty_round_is_not_counted() {
        let queue = DeferredQueue::new();
        assert_eq!(queue.run_round(), 0);
        assert_eq!(queue.rounds(), 0);
    }
}
