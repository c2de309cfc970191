#![forbid(unsafe_code)]

//! Core: the people, pins, and map regions pinmap works with.
//!
//! # Role in pinmap
//! `pinmap-core` is the data layer. It has no I/O and no notion of
//! observation; `pinmap-runtime` wraps these values in observable stores and
//! keeps a rendered map in step with them.
//!
//! # Primary types
//! - **Person** / **PersonId**: a person and their stable identity.
//! - **Profile**: phone, address, and needs from the profile form.
//! - **Location**: a validated latitude/longitude pair.
//! - **MapRegion**: the visible part of the map.
//!
//! Enable the `serde` feature to (de)serialize the model.

pub mod location;
pub mod person;

pub use location::{Location, LocationError, MapRegion};
pub use person::{Person, PersonId, Profile};
