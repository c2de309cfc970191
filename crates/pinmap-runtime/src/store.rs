#![forbid(unsafe_code)]

//! The current-user and pins stores.
//!
//! Both are thin, cloneable handles over an [`Observable`]. Clones share
//! state, so a subscriber of one store can hold a handle to the other and
//! update it from inside a notification.
//!
//! # Invariants
//!
//! 1. The current-user store only ever holds a record whose id is the
//!    store's fixed user id.
//! 2. Each pins mutation notifies exactly once, and the removal slot is
//!    stored with the list it belongs to, so subscribers read a slot that
//!    matches the value they were handed.
//! 3. A mutation that fails leaves the list and the slot as they were.
//! 4. Mutations build on the latest value, including values queued earlier
//!    in the same notification round, so queued mutations never overwrite
//!    each other.

use pinmap_core::{Location, Person, PersonId};
use tracing::debug;

use crate::error::{ReactiveError, SessionError};
use crate::reactive::{Observable, ObservableConfig, Subscription};

/// Holds the signed-in user's own record.
#[derive(Debug, Clone)]
pub struct CurrentUserStore {
    user_id: PersonId,
    user: Observable<Person>,
}

impl CurrentUserStore {
    /// An empty store for the user `user_id`.
    #[must_use]
    pub fn new(user_id: PersonId, config: ObservableConfig) -> Self {
        Self {
            user_id,
            user: Observable::with_config(None, config),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> PersonId {
        self.user_id
    }

    #[must_use]
    pub fn get(&self) -> Option<Person> {
        self.user.get()
    }

    pub fn try_get(&self) -> Result<Person, SessionError> {
        self.user.try_get().map_err(|err| match err {
            ReactiveError::AbsentValue => SessionError::NotSignedIn,
            other => SessionError::Reactive(other),
        })
    }

    /// Replace the record and notify.
    pub fn set(&self, user: Person) -> Result<(), SessionError> {
        if user.id != self.user_id {
            return Err(SessionError::ForeignIdentity {
                expected: self.user_id,
                found: user.id,
            });
        }
        debug!(user = %user.id, located = user.is_located(), "current user set");
        self.user.set(user)?;
        Ok(())
    }

    /// Pin the user at `location`. Returns the stored record.
    pub fn relocate(&self, location: Location) -> Result<Person, SessionError> {
        let moved = self.latest()?.copy_with_location(location);
        self.set(moved.clone())?;
        Ok(moved)
    }

    /// Apply a profile edit. The id cannot be changed through `f`.
    pub fn edit(&self, f: impl FnOnce(&mut Person)) -> Result<Person, SessionError> {
        let mut user = self.latest()?;
        f(&mut user);
        user.id = self.user_id;
        self.set(user.clone())?;
        Ok(user)
    }

    /// See [`Observable::observe`].
    pub fn observe(&self, callback: impl Fn(&Person) + 'static) {
        self.user.observe(callback);
    }

    /// See [`Observable::subscribe`].
    pub fn subscribe(&self, callback: impl Fn(&Person) + 'static) -> Subscription {
        self.user.subscribe(callback)
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.user.version()
    }

    #[must_use]
    pub fn observable(&self) -> &Observable<Person> {
        &self.user
    }

    /// The record a new edit builds on, counting edits queued earlier in the
    /// current notification round.
    fn latest(&self) -> Result<Person, SessionError> {
        self.user.latest().ok_or(SessionError::NotSignedIn)
    }
}

/// Result of [`PinsStore::merge`].
#[derive(Debug, Clone, PartialEq)]
pub enum Merge {
    /// An entry with the same id was removed and the new record appended.
    Replaced(Person),
    /// No entry existed; the located record was appended.
    Appended,
    /// No entry existed and the record has no location. Nothing changed.
    Skipped,
}

/// One stored pins value: the list and the entry its mutation removed.
///
/// Keeping the removal next to the list means a queued round carries its own
/// removal, not whatever a later queued mutation wrote.
#[derive(Debug, Clone)]
struct PinList {
    people: Vec<Person>,
    removed: Option<Person>,
}

/// Holds the people shown on the map, plus the most recently removed entry.
#[derive(Debug, Clone)]
pub struct PinsStore {
    pins: Observable<PinList>,
}

impl PinsStore {
    /// An unloaded store.
    #[must_use]
    pub fn new(config: ObservableConfig) -> Self {
        Self {
            pins: Observable::with_config(None, config),
        }
    }

    /// The current list; empty before the first load.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Person> {
        self.pins
            .with(|state| state.map(|state| state.people.clone()))
            .unwrap_or_default()
    }

    /// Whether a list has been stored yet.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.pins.is_set()
    }

    /// The entry removed by the mutation that produced the current list, if
    /// it removed one.
    ///
    /// Only the latest removal is kept: a reader that skips a notification
    /// cannot recover earlier ones.
    #[must_use]
    pub fn pin_to_remove(&self) -> Option<Person> {
        self.pins
            .with(|state| state.and_then(|state| state.removed.clone()))
    }

    /// Replace the whole list, as after a fetch. Clears the removal slot.
    pub fn replace_all(&self, people: Vec<Person>) -> Result<(), ReactiveError> {
        debug!(count = people.len(), "pins replaced");
        self.commit(people, None)
    }

    /// Remove the first entry with `person.id` and append `person`.
    ///
    /// The replacement always lands at the end of the list. Returns the
    /// removed entry.
    pub fn upsert(&self, person: Person) -> Result<Option<Person>, ReactiveError> {
        let mut next = self.latest();
        let previous = next
            .iter()
            .position(|p| p.id == person.id)
            .map(|idx| next.remove(idx));
        debug!(person = %person.id, replaced = previous.is_some(), "pins upsert");
        next.push(person);
        self.commit(next, previous.clone())?;
        Ok(previous)
    }

    /// Fold an updated record into the list: replace an existing entry, or
    /// append the record when it is located. Unlocated newcomers are skipped
    /// without a notification.
    pub fn merge(&self, person: Person) -> Result<Merge, ReactiveError> {
        let known = self.latest().iter().any(|p| p.id == person.id);
        if !known && !person.is_located() {
            return Ok(Merge::Skipped);
        }
        Ok(match self.upsert(person)? {
            Some(previous) => Merge::Replaced(previous),
            None => Merge::Appended,
        })
    }

    /// Remove every entry for `id`. Returns the first one removed, or
    /// `None` (without notifying) when there was none.
    pub fn remove(&self, id: PersonId) -> Result<Option<Person>, ReactiveError> {
        let current = self.latest();
        let Some(first) = current.iter().find(|p| p.id == id).cloned() else {
            return Ok(None);
        };
        let next: Vec<Person> = current.into_iter().filter(|p| p.id != id).collect();
        debug!(person = %id, "pins remove");
        self.commit(next, Some(first.clone()))?;
        Ok(Some(first))
    }

    /// The latest entry for `id`.
    #[must_use]
    pub fn find(&self, id: PersonId) -> Option<Person> {
        self.pins.with(|state| {
            state.and_then(|state| state.people.iter().rev().find(|p| p.id == id).cloned())
        })
    }

    /// The first person pinned exactly at `location`.
    #[must_use]
    pub fn find_at(&self, location: &Location) -> Option<Person> {
        self.pins.with(|state| {
            state.and_then(|state| state.people.iter().find(|p| p.is_at(location)).cloned())
        })
    }

    /// See [`Observable::observe`].
    pub fn observe(&self, callback: impl Fn(&Vec<Person>) + 'static) {
        self.pins.observe(move |state| callback(&state.people));
    }

    /// See [`Observable::subscribe`].
    pub fn subscribe(&self, callback: impl Fn(&Vec<Person>) + 'static) -> Subscription {
        self.pins.subscribe(move |state| callback(&state.people))
    }

    /// Like [`PinsStore::subscribe`], also handing over the entry removed by
    /// the mutation being announced.
    pub fn subscribe_changes(
        &self,
        callback: impl Fn(&[Person], Option<&Person>) + 'static,
    ) -> Subscription {
        self.pins
            .subscribe(move |state| callback(&state.people, state.removed.as_ref()))
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.pins.version()
    }

    /// The list a new mutation builds on. Inside a queued notification round
    /// this includes mutations queued earlier in the same round.
    fn latest(&self) -> Vec<Person> {
        self.pins
            .latest()
            .map(|state| state.people)
            .unwrap_or_default()
    }

    fn commit(&self, people: Vec<Person>, removed: Option<Person>) -> Result<(), ReactiveError> {
        self.pins.set(PinList { people, removed })
    }
}
