#![forbid(unsafe_code)]

//! People shown on the map.
//!
//! A [`Person`] is a value: changes produce a new record through the
//! `with_*` / `copy_with_*` helpers rather than mutating a shared one, so a
//! record handed to a subscriber never changes under it.

use std::fmt;

use crate::location::Location;

/// Stable identity of a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct PersonId(pub u64);

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PersonId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Contact details and needs entered through the profile form.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Profile {
    pub phone: Option<String>,
    pub address: Option<String>,
    /// One entry per line of the needs list, in the order entered.
    pub needs: Vec<String>,
}

impl Profile {
    /// Whether nothing has been filled in.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phone.is_none() && self.address.is_none() && self.needs.is_empty()
    }
}

/// A person who may have dropped a pin.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub location: Option<Location>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub profile: Profile,
}

impl Person {
    /// A person with no pin and an empty profile.
    #[must_use]
    pub fn new(id: impl Into<PersonId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location: None,
            profile: Profile::default(),
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    /// A copy of this record pinned at `location`.
    #[must_use]
    pub fn copy_with_location(&self, location: Location) -> Self {
        self.clone().with_location(location)
    }

    /// A copy of this record with the pin cleared.
    #[must_use]
    pub fn copy_without_location(&self) -> Self {
        Self {
            location: None,
            ..self.clone()
        }
    }

    /// Whether the person can be placed on the map.
    #[must_use]
    pub fn is_located(&self) -> bool {
        self.location.is_some()
    }

    /// Whether this person is pinned exactly at `location`.
    #[must_use]
    pub fn is_at(&self, location: &Location) -> bool {
        self.location.as_ref() == Some(location)
    }
}
