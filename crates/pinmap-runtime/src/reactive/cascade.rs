#![forbid(unsafe_code)]

//! Per-thread notification depth.
//!
//! Every notification round of every [`Observable`](super::Observable) on a
//! thread enters this counter for its duration. A `set` issued from inside a
//! subscriber therefore sees the depth of the chain it belongs to, whichever
//! observables the chain has passed through.

use std::cell::Cell;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Number of notification rounds currently on this thread's stack.
///
/// `0` outside of any subscriber callback.
#[must_use]
pub fn depth() -> usize {
    DEPTH.with(Cell::get)
}

/// RAII marker for one notification round. Restores the depth on drop,
/// including when a subscriber panics.
pub(crate) struct CascadeGuard {
    _private: (),
}

impl CascadeGuard {
    pub(crate) fn enter() -> Self {
        DEPTH.with(|d| d.set(d.get() + 1));
        Self { _private: () }
    }
}

impl Drop for CascadeGuard {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}
