#![forbid(unsafe_code)]

//! Reactive state for pinmap.
//!
//! This module provides the change-notification primitive the stores are
//! built on:
//!
//! - [`Observable`]: a shared, version-tracked value slot that notifies
//!   subscriber callbacks on every `set`.
//! - [`Subscription`]: RAII guard that unsubscribes on drop or `cancel`.
//! - [`cascade`]: per-thread notification depth used to bound chains of
//!   `set` calls made from inside subscribers.
//!
//! # Architecture
//!
//! `Observable<T>` uses `Rc<RefCell<..>>` for single-threaded shared
//! ownership. Subscribers registered with `subscribe` are stored as `Weak`
//! function pointers and cleaned up lazily during notification; subscribers
//! registered with `observe` are held strongly.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per stored value.
//! 2. Subscribers are notified in registration order.
//! 3. Every `set` notifies, including one that stores an equal value
//!    (use `set_if_changed` to suppress those).
//! 4. Dropping a [`Subscription`] removes the callback before the next
//!    notification round.
//! 5. No `set` succeeds at a notification depth at or beyond the
//!    observable's `max_cascade_depth`.

pub mod cascade;
pub mod observable;

pub use observable::{Observable, ObservableConfig, Reentrancy, Subscription};
