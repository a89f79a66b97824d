#![forbid(unsafe_code)]

//! Reactive building blocks for formwork.
//!
//! - [`Observable`]: a shared, version-tracked value with synchronous change
//!   notification to subscriber callbacks.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`Computed`]: a lazily evaluated, memoized value derived from one or more
//!   observables.
//! - [`DeferredQueue`]: a FIFO of tasks executed on the owner's next
//!   scheduling round, plus deferred ("next tick") subscriptions.
//!
//! # Architecture
//!
//! Everything here is single-threaded: cells are `Rc<RefCell<..>>`,
//! subscribers are held as `Weak` callbacks and cleaned up lazily during
//! notification.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the value.
//! 2. Subscribers are notified in registration order.
//! 3. Setting a value equal to the current value is a no-op.
//! 4. Dropping a [`Subscription`] removes the callback before the next
//!    notification.
//! 5. `Computed::get()` never returns a value older than its tracked sources.
//! 6. A deferred task never runs in the round that was executing when it was
//!    queued.

pub mod computed;
pub mod deferred;
pub mod observable;

pub use computed::Computed;
pub use deferred::DeferredQueue;
pub use observable::{Observable, Subscription};
