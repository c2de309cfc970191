#![forbid(unsafe_code)]

//! Reconciling the rendered pins against the pins list.
//!
//! The [`Reconciler`] compares what a [`RenderSurface`] shows with the
//! current pins and issues the removes and adds that close the gap. Planning
//! is pure ([`Reconciler::plan`]); applying touches the surface
//! ([`Reconciler::apply`]).
//!
//! # Keys
//!
//! - [`ReconcileKey::Identity`] matches pins to people by [`PersonId`]. A
//!   pin whose position or title no longer matches its person is replaced.
//! - [`ReconcileKey::Coordinate`] matches by exact position, removing only
//!   the pin at the location of the store's last removed entry. Two people
//!   at the same coordinates share one pin and a removal may take the other
//!   person's pin. Only for consumers that depend on that deduplication.
//!
//! # Invariants (identity key)
//!
//! 1. After `reconcile`, the surface shows exactly one pin per located
//!    person in the list, at that person's location.
//! 2. A second `reconcile` with the same list issues no commands.
//! 3. Removes are applied before adds.

use std::collections::{HashMap, HashSet};
use std::fmt;

use pinmap_core::{Location, Person, PersonId};
use tracing::debug;

use crate::surface::{Artifact, RenderSurface};

/// How rendered pins are matched to people.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcileKey {
    /// Match on `PersonId`.
    #[default]
    Identity,
    /// Match on exact coordinates.
    Coordinate,
}

impl ReconcileKey {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "identity" | "id" => Some(Self::Identity),
            "coordinate" | "coord" | "legacy" => Some(Self::Coordinate),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Coordinate => "coordinate",
        }
    }
}

impl fmt::Display for ReconcileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands that would bring a surface in line with the pins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub remove: Vec<Artifact>,
    pub add: Vec<Person>,
    /// People in the list without a location.
    pub skipped_unlocated: usize,
}

impl ReconcilePlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.add.is_empty()
    }
}

/// What one reconciliation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Person of every pin actually removed, in removal order.
    pub removed: Vec<PersonId>,
    /// Person of every pin added, in add order.
    pub added: Vec<PersonId>,
    pub skipped_unlocated: usize,
}

impl ReconcileReport {
    /// Whether the surface was left untouched.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconciler {
    key: ReconcileKey,
}

impl Reconciler {
    #[must_use]
    pub fn new(key: ReconcileKey) -> Self {
        Self { key }
    }

    #[must_use]
    pub fn key(&self) -> ReconcileKey {
        self.key
    }

    /// Work out the commands for `pins` against the `rendered` pins.
    ///
    /// `pin_to_remove` is the store's last removed entry; only the
    /// coordinate key uses it.
    #[must_use]
    pub fn plan(
        &self,
        pins: &[Person],
        pin_to_remove: Option<&Person>,
        rendered: &[Artifact],
    ) -> ReconcilePlan {
        match self.key {
            ReconcileKey::Identity => plan_by_identity(pins, rendered),
            ReconcileKey::Coordinate => plan_by_coordinate(pins, pin_to_remove, rendered),
        }
    }

    /// Issue the commands of `plan` against `surface`.
    pub fn apply<S: RenderSurface + ?Sized>(
        &self,
        plan: ReconcilePlan,
        surface: &mut S,
    ) -> ReconcileReport {
        let mut report = ReconcileReport {
            skipped_unlocated: plan.skipped_unlocated,
            ..ReconcileReport::default()
        };
        for artifact in plan.remove {
            if surface.remove_artifact(artifact.id) {
                report.removed.push(artifact.person);
            }
        }
        for person in plan.add {
            if let Some(position) = person.location {
                surface.add_artifact(&person, position);
                report.added.push(person.id);
            }
        }
        debug!(
            key = self.key.as_str(),
            removed = report.removed.len(),
            added = report.added.len(),
            skipped = report.skipped_unlocated,
            "reconcile applied"
        );
        report
    }

    /// Plan against what `surface` shows now, then apply.
    pub fn reconcile<S: RenderSurface + ?Sized>(
        &self,
        pins: &[Person],
        pin_to_remove: Option<&Person>,
        surface: &mut S,
    ) -> ReconcileReport {
        let plan = self.plan(pins, pin_to_remove, &surface.artifacts());
        self.apply(plan, surface)
    }

    /// The person a rendered pin stands for, matched with this key.
    #[must_use]
    pub fn person_for_artifact<'a>(
        &self,
        pins: &'a [Person],
        artifact: &Artifact,
    ) -> Option<&'a Person> {
        match self.key {
            ReconcileKey::Identity => pins.iter().rev().find(|p| p.id == artifact.person),
            ReconcileKey::Coordinate => pins.iter().find(|p| p.is_at(&artifact.position)),
        }
    }
}

fn plan_by_identity(pins: &[Person], rendered: &[Artifact]) -> ReconcilePlan {
    // Last entry per id wins; order follows first appearance.
    let mut latest: HashMap<PersonId, &Person> = HashMap::with_capacity(pins.len());
    let mut order: Vec<PersonId> = Vec::with_capacity(pins.len());
    for person in pins {
        if latest.insert(person.id, person).is_none() {
            order.push(person.id);
        }
    }
    let skipped_unlocated = latest.values().filter(|p| !p.is_located()).count();

    let mut shown: HashSet<PersonId> = HashSet::with_capacity(rendered.len());
    let remove: Vec<Artifact> = rendered
        .iter()
        .filter(|artifact| {
            let current = latest
                .get(&artifact.person)
                .is_some_and(|p| is_current(artifact, p));
            // Keep only the first up-to-date pin per person.
            !(current && shown.insert(artifact.person))
        })
        .cloned()
        .collect();

    let add = order
        .iter()
        .filter(|id| !shown.contains(*id))
        .filter_map(|id| latest.get(id))
        .filter(|p| p.is_located())
        .map(|p| (*p).clone())
        .collect();

    ReconcilePlan {
        remove,
        add,
        skipped_unlocated,
    }
}

fn is_current(artifact: &Artifact, person: &Person) -> bool {
    person.location == Some(artifact.position) && artifact.title == person.name
}

fn plan_by_coordinate(
    pins: &[Person],
    pin_to_remove: Option<&Person>,
    rendered: &[Artifact],
) -> ReconcilePlan {
    let mut occupied: Vec<Location> = rendered.iter().map(|a| a.position).collect();
    let mut remove = Vec::new();
    if let Some(target) = pin_to_remove.and_then(|p| p.location)
        && let Some(idx) = rendered.iter().position(|a| a.position == target)
    {
        remove.push(rendered[idx].clone());
        occupied.remove(idx);
    }

    let mut add = Vec::new();
    let mut skipped_unlocated = 0;
    for person in pins {
        let Some(position) = person.location else {
            skipped_unlocated += 1;
            continue;
        };
        if !occupied.contains(&position) {
            occupied.push(position);
            add.push(person.clone());
        }
    }

    ReconcilePlan {
        remove,
        add,
        skipped_unlocated,
    }
}
