#![forbid(unsafe_code)]

//! The rendering surface pins are drawn on.
//!
//! The runtime never draws anything itself. It issues add/remove commands
//! against a [`RenderSurface`] and reads back what the surface currently
//! shows. [`MemorySurface`] is the in-process implementation used by the
//! demo and the tests; it also keeps a log of every command it received.

use std::fmt;

use pinmap_core::{Location, Person, PersonId};

/// Surface-assigned handle of one rendered pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactId(pub u64);

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A pin as the surface shows it.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub id: ArtifactId,
    /// Person the pin was created for.
    pub person: PersonId,
    pub position: Location,
    pub title: String,
}

/// Something that can show pins.
pub trait RenderSurface {
    /// Show a pin for `person` at `position`, titled with the person's name.
    fn add_artifact(&mut self, person: &Person, position: Location) -> ArtifactId;

    /// Remove a pin. Returns `false` when no such pin is shown.
    fn remove_artifact(&mut self, id: ArtifactId) -> bool;

    /// Every pin currently shown, in the order they were added.
    fn artifacts(&self) -> Vec<Artifact>;
}

/// A command received by a [`MemorySurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceOp {
    Added {
        artifact: ArtifactId,
        person: PersonId,
    },
    Removed {
        artifact: ArtifactId,
        person: PersonId,
    },
}

/// In-memory [`RenderSurface`] with a command log.
#[derive(Debug, Default)]
pub struct MemorySurface {
    artifacts: Vec<Artifact>,
    next_id: u64,
    log: Vec<SurfaceOp>,
}

impl MemorySurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command received so far, oldest first.
    #[must_use]
    pub fn log(&self) -> &[SurfaceOp] {
        &self.log
    }

    /// Drain the command log.
    pub fn take_log(&mut self) -> Vec<SurfaceOp> {
        std::mem::take(&mut self.log)
    }

    /// Persons with at least one pin, in pin order (duplicates kept).
    #[must_use]
    pub fn persons(&self) -> Vec<PersonId> {
        self.artifacts.iter().map(|a| a.person).collect()
    }

    #[must_use]
    pub fn get(&self, id: ArtifactId) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl RenderSurface for MemorySurface {
    fn add_artifact(&mut self, person: &Person, position: Location) -> ArtifactId {
        self.next_id += 1;
        let id = ArtifactId(self.next_id);
        self.artifacts.push(Artifact {
            id,
            person: person.id,
            position,
            title: person.name.clone(),
        });
        self.log.push(SurfaceOp::Added {
            artifact: id,
            person: person.id,
        });
        id
    }

    fn remove_artifact(&mut self, id: ArtifactId) -> bool {
        let Some(idx) = self.artifacts.iter().position(|a| a.id == id) else {
            return false;
        };
        let removed = self.artifacts.remove(idx);
        self.log.push(SurfaceOp::Removed {
            artifact: id,
            person: removed.person,
        });
        true
    }

    fn artifacts(&self) -> Vec<Artifact> {
        self.artifacts.clone()
    }
}
