#![forbid(unsafe_code)]

//! Observable value slot with change notification and version tracking.
//!
//! # Design
//!
//! [`Observable<T>`] holds an optional value of type `T` in shared,
//! reference-counted storage (`Rc<RefCell<..>>`). Every [`set`] stores the
//! value and then calls each live subscriber with it, in registration order.
//! Subscribers receive `&T`: a callback is only ever invoked with the value
//! that was just stored, so it never sees an absent slot.
//!
//! [`set`]: Observable::set
//!
//! # Performance
//!
//! | Operation     | Complexity                 |
//! |---------------|----------------------------|
//! | `get()`       | O(1) + clone               |
//! | `set()`       | O(S) where S = subscribers |
//! | `subscribe()` | O(1) amortized             |
//!
//! # Failure Modes
//!
//! - **Read before first set**: [`Observable::try_get`] returns
//!   [`ReactiveError::AbsentValue`].
//! - **Re-entrant set**: a subscriber calling `set` on the observable that is
//!   notifying it gets [`ReactiveError::ReentrantNotification`] under
//!   [`Reentrancy::Reject`], or has its value queued under
//!   [`Reentrancy::Queue`].
//! - **Runaway cascade**: a `set` issued while the thread is already
//!   `max_cascade_depth` notification rounds deep fails with
//!   [`ReactiveError::CascadeTooDeep`] and leaves the value untouched.
//! - **Set inside `with`**: calling `set` from the closure passed to
//!   [`Observable::with`] on the same observable panics (RefCell borrow
//!   rules).
//! - **Subscriber leak**: callbacks registered with [`Observable::observe`]
//!   live as long as the observable. Use [`Observable::subscribe`] when the
//!   subscriber has a shorter lifetime.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{trace, warn};

use super::cascade::{self, CascadeGuard};
use crate::error::ReactiveError;

type CallbackRc<T> = Rc<dyn Fn(&T)>;
type CallbackWeak<T> = Weak<dyn Fn(&T)>;

/// What happens when a subscriber sets the observable that is notifying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reentrancy {
    /// Refuse the nested `set` with [`ReactiveError::ReentrantNotification`].
    #[default]
    Reject,
    /// Apply the nested value after the current round finishes, each queued
    /// value producing its own notification round.
    Queue,
}

impl Reentrancy {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reject" => Some(Self::Reject),
            "queue" => Some(Self::Queue),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Queue => "queue",
        }
    }
}

impl fmt::Display for Reentrancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification limits for one observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservableConfig {
    pub reentrancy: Reentrancy,
    /// Maximum notification depth at which this observable still accepts a
    /// `set`, and the maximum number of rounds one `set` may run when
    /// draining queued values.
    pub max_cascade_depth: usize,
}

impl ObservableConfig {
    pub const DEFAULT_MAX_CASCADE_DEPTH: usize = 4;

    #[must_use]
    pub fn with_reentrancy(mut self, reentrancy: Reentrancy) -> Self {
        self.reentrancy = reentrancy;
        self
    }

    #[must_use]
    pub fn with_max_cascade_depth(mut self, depth: usize) -> Self {
        self.max_cascade_depth = depth;
        self
    }
}

impl Default for ObservableConfig {
    fn default() -> Self {
        Self {
            reentrancy: Reentrancy::Reject,
            max_cascade_depth: Self::DEFAULT_MAX_CASCADE_DEPTH,
        }
    }
}

enum Subscriber<T> {
    /// Registered through `observe`; lives as long as the observable.
    Retained(CallbackRc<T>),
    /// Registered through `subscribe`; the strong side is in a [`Subscription`].
    Guarded(CallbackWeak<T>),
}

impl<T> Subscriber<T> {
    fn is_live(&self) -> bool {
        match self {
            Self::Retained(_) => true,
            Self::Guarded(weak) => weak.strong_count() > 0,
        }
    }

    fn upgrade(&self) -> Option<CallbackRc<T>> {
        match self {
            Self::Retained(cb) => Some(Rc::clone(cb)),
            Self::Guarded(weak) => weak.upgrade(),
        }
    }
}

struct ObservableInner<T> {
    value: Option<T>,
    version: u64,
    subscribers: Vec<Subscriber<T>>,
    notifying: bool,
    pending: VecDeque<T>,
    config: ObservableConfig,
}

/// A shared, version-tracked value slot with change notification.
///
/// Cloning an `Observable` creates a new handle to the **same** slot: both
/// handles see the same value and share subscribers.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 for every value that is stored.
/// 2. Every stored value is delivered once to every subscriber that was
///    live when its round started, in registration order.
/// 3. Subscribing never replays the current value.
/// 4. A failed `set` leaves value and version unchanged.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Clone + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Clone + 'static> Observable<T> {
    /// Create an observable holding `value`, at version 0.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::with_config(Some(value), ObservableConfig::default())
    }

    /// Create an observable with no value yet.
    #[must_use]
    pub fn empty() -> Self {
        Self::with_config(None, ObservableConfig::default())
    }

    #[must_use]
    pub fn with_config(initial: Option<T>, config: ObservableConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                value: initial,
                version: 0,
                subscribers: Vec::new(),
                notifying: false,
                pending: VecDeque::new(),
                config,
            })),
        }
    }

    /// A clone of the current value, or `None` before the first `set`.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.inner.borrow().value.clone()
    }

    /// A clone of the current value.
    pub fn try_get(&self) -> Result<T, ReactiveError> {
        self.get().ok_or(ReactiveError::AbsentValue)
    }

    /// Whether a value has been stored.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.inner.borrow().value.is_some()
    }

    /// Access the current value by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.inner.borrow().value.as_ref())
    }

    /// The value the next queued round will build on: the last queued value
    /// when sets are waiting under [`Reentrancy::Queue`], otherwise the
    /// current value.
    ///
    /// Outside a notification this is the same as [`Observable::get`].
    #[must_use]
    pub fn latest(&self) -> Option<T> {
        let inner = self.inner.borrow();
        inner.pending.back().or(inner.value.as_ref()).cloned()
    }

    /// Store `value` and notify every live subscriber with it.
    ///
    /// Each call is one event: equal values are delivered again.
    pub fn set(&self, value: T) -> Result<(), ReactiveError> {
        let depth = cascade::depth();
        {
            let mut inner = self.inner.borrow_mut();
            if inner.notifying {
                match inner.config.reentrancy {
                    Reentrancy::Reject => {
                        warn!(
                            version = inner.version,
                            "observable: rejected re-entrant set"
                        );
                        return Err(ReactiveError::ReentrantNotification {
                            version: inner.version,
                        });
                    }
                    Reentrancy::Queue => {
                        inner.pending.push_back(value);
                        trace!(
                            queued = inner.pending.len(),
                            "observable: queued re-entrant set"
                        );
                        return Ok(());
                    }
                }
            }
            let limit = inner.config.max_cascade_depth;
            if depth >= limit {
                warn!(depth, limit, "observable: cascade limit reached");
                return Err(ReactiveError::CascadeTooDeep { depth, limit });
            }
            inner.value = Some(value.clone());
            inner.version += 1;
        }
        self.notify(value)
    }

    /// Clone the [latest](Observable::latest) value, let `f` modify it, and
    /// `set` the result.
    ///
    /// Updates queued during one round chain: each one starts from the value
    /// the previous one queued.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> Result<(), ReactiveError> {
        let mut value = self.latest().ok_or(ReactiveError::AbsentValue)?;
        f(&mut value);
        self.set(value)
    }

    /// Register a callback for every future value. The callback stays
    /// registered for the observable's lifetime.
    pub fn observe(&self, callback: impl Fn(&T) + 'static) {
        let strong: CallbackRc<T> = Rc::new(callback);
        self.inner
            .borrow_mut()
            .subscribers
            .push(Subscriber::Retained(strong));
    }

    /// Register a callback for every future value, owned by the returned
    /// guard.
    ///
    /// Dropping or [cancelling](Subscription::cancel) the guard unsubscribes
    /// the callback: it will not be called afterwards, though its slot stays
    /// in the list until the next notification prunes it.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: CallbackRc<T> = Rc::new(callback);
        let weak = Rc::downgrade(&strong);
        self.inner
            .borrow_mut()
            .subscribers
            .push(Subscriber::Guarded(weak));
        // `Rc<dyn Fn(&T)>` cannot coerce to `Rc<dyn Any>`, so box the Rc.
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Number of values stored since creation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Number of registered subscribers (including cancelled ones not yet
    /// pruned).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    #[must_use]
    pub fn config(&self) -> ObservableConfig {
        self.inner.borrow().config
    }

    fn notify(&self, mut value: T) -> Result<(), ReactiveError> {
        let _cascade = CascadeGuard::enter();
        let _notifying = NotifyingGuard::new(&self.inner);
        let mut rounds = 1usize;
        loop {
            let (callbacks, version) = {
                let mut inner = self.inner.borrow_mut();
                inner.subscribers.retain(Subscriber::is_live);
                let callbacks: Vec<CallbackRc<T>> = inner
                    .subscribers
                    .iter()
                    .filter_map(Subscriber::upgrade)
                    .collect();
                (callbacks, inner.version)
            };
            trace!(version, subscribers = callbacks.len(), "observable: notify");

            // No borrow is held while subscribers run.
            for cb in &callbacks {
                cb(&value);
            }

            let next = {
                let mut inner = self.inner.borrow_mut();
                let Some(next) = inner.pending.pop_front() else {
                    return Ok(());
                };
                let limit = inner.config.max_cascade_depth;
                if rounds >= limit {
                    let dropped = inner.pending.len() + 1;
                    inner.pending.clear();
                    warn!(
                        rounds,
                        limit,
                        dropped,
                        "observable: queued sets exceeded cascade limit"
                    );
                    return Err(ReactiveError::CascadeTooDeep {
                        depth: rounds,
                        limit,
                    });
                }
                inner.value = Some(next.clone());
                inner.version += 1;
                next
            };
            rounds += 1;
            value = next;
        }
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// `set` only when `value` differs from the current one. Returns whether
    /// subscribers were notified.
    pub fn set_if_changed(&self, value: T) -> Result<bool, ReactiveError> {
        if self.inner.borrow().value.as_ref() == Some(&value) {
            return Ok(false);
        }
        self.set(value).map(|()| true)
    }
}

/// Marks an observable as notifying for the lifetime of one `notify` call.
struct NotifyingGuard<'a, T> {
    inner: &'a RefCell<ObservableInner<T>>,
}

impl<'a, T> NotifyingGuard<'a, T> {
    fn new(inner: &'a RefCell<ObservableInner<T>>) -> Self {
        inner.borrow_mut().notifying = true;
        Self { inner }
    }
}

impl<T> Drop for NotifyingGuard<'_, T> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.try_borrow_mut() {
            inner.notifying = false;
            inner.pending.clear();
        }
    }
}

/// RAII guard for a subscriber callback.
///
/// Dropping the `Subscription` drops the strong `Rc` to the callback, so the
/// `Weak` in the observable's subscriber list fails to upgrade on the next
/// notification round.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl Subscription {
    /// Unsubscribe now.
    pub fn cancel(self) {
        drop(self);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
