#![forbid(unsafe_code)]

//! One signed-in user's view of the map.
//!
//! A [`Session`] owns the two stores and the surface and wires them together
//! when it is created:
//!
//! ```text
//!   sign_in / drop_pin / edit_profile
//!        │
//!        ▼
//!   CurrentUserStore ──(merge)──▶ PinsStore ──(reconcile)──▶ RenderSurface
//!                                     ▲
//!                     refresh / poll_refresh (fetch result)
//! ```
//!
//! Both links are subscriptions owned by the session, so dropping the
//! session unhooks them. Errors raised inside those subscriptions cannot be
//! returned to anyone; they are logged and kept as faults until
//! [`Session::take_faults`] is called.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use pinmap_core::{Location, MapRegion, Person, PersonId};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{FetchError, SessionError};
use crate::fetch::{FetchWorker, PinSource};
use crate::reactive::Subscription;
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::store::{CurrentUserStore, Merge, PinsStore};
use crate::surface::{ArtifactId, RenderSurface};

pub struct Session<S: RenderSurface + 'static> {
    config: SessionConfig,
    current_user: CurrentUserStore,
    pins: PinsStore,
    surface: Rc<RefCell<S>>,
    reconciler: Reconciler,
    last_report: Rc<RefCell<ReconcileReport>>,
    faults: Rc<RefCell<Vec<SessionError>>>,
    _subscriptions: Vec<Subscription>,
    pending: Option<FetchWorker>,
}

impl<S: RenderSurface + 'static> Session<S> {
    /// Create a session for `user_id`, drawing on `surface`.
    ///
    /// Nothing is signed in and no pins are loaded yet.
    pub fn new(config: SessionConfig, user_id: impl Into<PersonId>, surface: S) -> Self {
        if let Err(errors) = config.validate() {
            for error in &errors {
                warn!(%error, "session config invalid");
            }
        }
        let user_id = user_id.into();
        let current_user = CurrentUserStore::new(user_id, config.observable);
        let pins = PinsStore::new(config.observable);
        let surface = Rc::new(RefCell::new(surface));
        let reconciler = Reconciler::new(config.reconcile_key);
        let last_report = Rc::new(RefCell::new(ReconcileReport::default()));
        let faults: Rc<RefCell<Vec<SessionError>>> = Rc::new(RefCell::new(Vec::new()));

        let merge_link = {
            let pins = pins.clone();
            let faults = Rc::clone(&faults);
            current_user.subscribe(move |user| match pins.merge(user.clone()) {
                Ok(Merge::Skipped) => {
                    debug!(user = %user.id, "current user not merged (no location)");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(user = %user.id, error = %err, "current user merge failed");
                    faults.borrow_mut().push(err.into());
                }
            })
        };

        let reconcile_link = {
            let surface = Rc::clone(&surface);
            let last_report = Rc::clone(&last_report);
            pins.subscribe_changes(move |list, removed| {
                let report = reconciler.reconcile(list, removed, &mut *surface.borrow_mut());
                *last_report.borrow_mut() = report;
            })
        };

        info!(user = %user_id, config = %config.summary_short(), "session started");
        Self {
            config,
            current_user,
            pins,
            surface,
            reconciler,
            last_report,
            faults,
            _subscriptions: vec![merge_link, reconcile_link],
            pending: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn user_id(&self) -> PersonId {
        self.current_user.user_id()
    }

    /// Store the signed-in user's record. A located user is merged into the
    /// pins and drawn.
    pub fn sign_in(&self, user: Person) -> Result<(), SessionError> {
        self.current_user.set(user)
    }

    /// Pin the signed-in user at `location`.
    pub fn drop_pin(&self, location: Location) -> Result<Person, SessionError> {
        location.validate().map_err(|err| {
            warn!(%location, error = %err, "drop_pin with invalid location");
            SessionError::InvalidLocation(err)
        })?;
        self.current_user.relocate(location)
    }

    /// Take the signed-in user's pin off the map. The record stays in the
    /// pins list without a location.
    pub fn unpin(&self) -> Result<Person, SessionError> {
        self.current_user.edit(|user| user.location = None)
    }

    /// Edit the signed-in user's record (name and profile fields).
    pub fn edit_profile(&self, f: impl FnOnce(&mut Person)) -> Result<Person, SessionError> {
        self.current_user.edit(f)
    }

    /// Whether the surface shows a pin for the signed-in user.
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        let user_id = self.user_id();
        self.surface
            .borrow()
            .artifacts()
            .iter()
            .any(|a| a.person == user_id)
    }

    /// Fetch from `source` on this thread and replace the pins with the
    /// result. Returns the number of people fetched.
    ///
    /// A failed fetch leaves the pins untouched.
    pub fn refresh<P: PinSource + ?Sized>(&self, source: &P) -> Result<usize, SessionError> {
        self.apply_fetch(source.fetch())
    }

    /// Start fetching from `source` on a worker thread. A fetch already in
    /// flight is abandoned.
    pub fn refresh_in_background<P>(&mut self, source: P) -> Result<(), SessionError>
    where
        P: PinSource + Send + 'static,
    {
        if self.pending.take().is_some() {
            debug!("abandoning in-flight fetch");
        }
        let worker = FetchWorker::spawn(source).map_err(SessionError::Spawn)?;
        self.pending = Some(worker);
        Ok(())
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.pending.is_some()
    }

    /// Apply the background fetch if it has finished.
    ///
    /// `Ok(None)` while it is still running or when none was started.
    pub fn poll_refresh(&mut self) -> Result<Option<usize>, SessionError> {
        let Some(worker) = self.pending.as_mut() else {
            return Ok(None);
        };
        let Some(result) = worker.try_result() else {
            return Ok(None);
        };
        self.pending = None;
        self.apply_fetch(result).map(Some)
    }

    /// Wait for the background fetch, at most `fetch_timeout`, and apply it.
    ///
    /// `Ok(None)` when none was started.
    pub fn finish_refresh(&mut self) -> Result<Option<usize>, SessionError> {
        let Some(worker) = self.pending.take() else {
            return Ok(None);
        };
        let result = worker.wait_timeout(self.config.fetch_timeout);
        self.apply_fetch(result).map(Some)
    }

    /// Reconcile the surface against the current pins without changing
    /// them, as when the map has just finished loading.
    pub fn resync(&self) -> ReconcileReport {
        let pins = self.pins.snapshot();
        let report = self
            .reconciler
            .reconcile(&pins, None, &mut *self.surface.borrow_mut());
        *self.last_report.borrow_mut() = report.clone();
        report
    }

    /// What the most recent reconciliation did.
    #[must_use]
    pub fn last_reconcile(&self) -> ReconcileReport {
        self.last_report.borrow().clone()
    }

    /// The person behind a rendered pin, as shown when the pin is tapped.
    #[must_use]
    pub fn person_for_artifact(&self, id: ArtifactId) -> Option<Person> {
        let artifact = self
            .surface
            .borrow()
            .artifacts()
            .into_iter()
            .find(|a| a.id == id)?;
        let pins = self.pins.snapshot();
        self.reconciler
            .person_for_artifact(&pins, &artifact)
            .cloned()
    }

    /// Where the map opens.
    #[must_use]
    pub fn map_region(&self) -> MapRegion {
        self.config.map_region
    }

    /// Run `f` with the surface.
    ///
    /// # Panics
    ///
    /// If `f` reaches back into this session and triggers a reconciliation.
    pub fn with_surface<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.surface.borrow_mut())
    }

    #[must_use]
    pub fn current_user(&self) -> Option<Person> {
        self.current_user.get()
    }

    /// The current pins list; empty before the first load.
    #[must_use]
    pub fn pins(&self) -> Vec<Person> {
        self.pins.snapshot()
    }

    #[must_use]
    pub fn current_user_store(&self) -> &CurrentUserStore {
        &self.current_user
    }

    #[must_use]
    pub fn pins_store(&self) -> &PinsStore {
        &self.pins
    }

    /// Errors raised inside subscriptions since the last call.
    pub fn take_faults(&self) -> Vec<SessionError> {
        std::mem::take(&mut *self.faults.borrow_mut())
    }

    fn apply_fetch(&self, result: Result<Vec<Person>, FetchError>) -> Result<usize, SessionError> {
        let people = result.map_err(|err| {
            warn!(error = %err, "fetch failed; keeping current pins");
            SessionError::StaleFetch(err)
        })?;
        let count = people.len();
        self.pins.replace_all(people)?;
        info!(count, "pins refreshed");
        Ok(count)
    }
}

impl<S: RenderSurface + 'static> fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id())
            .field("key", &self.reconciler.key())
            .field("pins", &self.pins.snapshot().len())
            .field("refreshing", &self.is_refreshing())
            .finish_non_exhaustive()
    }
}
