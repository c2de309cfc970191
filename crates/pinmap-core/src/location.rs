#![forbid(unsafe_code)]

//! Geographic coordinates and map regions.
//!
//! # Invariants
//!
//! 1. A [`Location`] built through [`Location::new`] or [`str::parse`] is
//!    finite, with `|lat| <= 90` and `|long| <= 180`.
//! 2. Equality is exact floating-point equality. Two locations compare equal
//!    only when both components are equal under IEEE `==` (so `0.0` equals
//!    `-0.0`).
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | NaN / infinite component | Bad sensor or parse input | `LocationError::NonFinite` |
//! | Latitude outside ±90 | Swapped axes, bad input | `LocationError::LatitudeOutOfRange` |
//! | Longitude outside ±180 | Bad input | `LocationError::LongitudeOutOfRange` |
//! | Unparseable `"lat,long"` | Missing comma, non-numeric | `LocationError::Malformed` |

use std::fmt;
use std::str::FromStr;

/// Errors from building or parsing a [`Location`].
#[derive(Debug, Clone, PartialEq)]
pub enum LocationError {
    /// A component was NaN or infinite.
    NonFinite,
    /// Latitude outside `[-90, 90]`.
    LatitudeOutOfRange(f64),
    /// Longitude outside `[-180, 180]`.
    LongitudeOutOfRange(f64),
    /// Text could not be parsed as `lat,long`.
    Malformed(String),
}

impl fmt::Display for LocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFinite => write!(f, "coordinate is not finite"),
            Self::LatitudeOutOfRange(lat) => write!(f, "latitude {lat} outside [-90, 90]"),
            Self::LongitudeOutOfRange(long) => write!(f, "longitude {long} outside [-180, 180]"),
            Self::Malformed(text) => write!(f, "expected 'lat,long', got '{text}'"),
        }
    }
}

impl std::error::Error for LocationError {}

/// A point on the map in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Location {
    /// Latitude in degrees, positive north.
    pub lat: f64,
    /// Longitude in degrees, positive east.
    pub long: f64,
}

impl Location {
    /// Build a validated location.
    pub fn new(lat: f64, long: f64) -> Result<Self, LocationError> {
        let location = Self { lat, long };
        location.validate()?;
        Ok(location)
    }

    /// Check the range invariants. Useful for values that arrived through
    /// struct literals or deserialization.
    pub fn validate(&self) -> Result<(), LocationError> {
        if !self.lat.is_finite() || !self.long.is_finite() {
            return Err(LocationError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(LocationError::LatitudeOutOfRange(self.lat));
        }
        if !(-180.0..=180.0).contains(&self.long) {
            return Err(LocationError::LongitudeOutOfRange(self.long));
        }
        Ok(())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.long)
    }
}

impl FromStr for Location {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || LocationError::Malformed(s.to_string());
        let (lat, long) = s.split_once(',').ok_or_else(malformed)?;
        let lat: f64 = lat.trim().parse().map_err(|_| malformed())?;
        let long: f64 = long.trim().parse().map_err(|_| malformed())?;
        Self::new(lat, long)
    }
}

/// The visible part of the map: a center and a square span in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MapRegion {
    pub center: Location,
    /// Latitude and longitude delta covered by the region.
    pub span: f64,
}

impl MapRegion {
    /// Kahramanmaraş city center, the app's starting view.
    pub const DEFAULT_CENTER: Location = Location {
        lat: 37.5753,
        long: 36.9228,
    };

    /// Street-level zoom.
    pub const DEFAULT_SPAN: f64 = 0.01;

    #[must_use]
    pub fn new(center: Location, span: f64) -> Self {
        Self { center, span }
    }

    /// Whether `location` falls inside the region (edges inclusive).
    #[must_use]
    pub fn contains(&self, location: &Location) -> bool {
        let half = self.span / 2.0;
        (location.lat - self.center.lat).abs() <= half
            && (location.long - self.center.long).abs() <= half
    }
}

impl Default for MapRegion {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CENTER, Self::DEFAULT_SPAN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_accepts_valid_coordinates() {
        let loc = Location::new(10.0, 20.0).unwrap();
        assert_eq!(loc.lat, 10.0);
        assert_eq!(loc.long, 20.0);
        assert!(Location::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn new_rejects_out_of_range() {
        assert_eq!(
            Location::new(91.0, 0.0),
            Err(LocationError::LatitudeOutOfRange(91.0))
        );
        assert_eq!(
            Location::new(0.0, -180.5),
            Err(LocationError::LongitudeOutOfRange(-180.5))
        );
        assert_eq!(Location::new(f64::NAN, 0.0), Err(LocationError::NonFinite));
        assert_eq!(
            Location::new(0.0, f64::INFINITY),
            Err(LocationError::NonFinite)
        );
    }

    #[test]
    fn parse_lat_long() {
        let loc: Location = " 37.5 , 36.9 ".parse().unwrap();
        assert_eq!(loc, Location { lat: 37.5, long: 36.9 });
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            "37.5".parse::<Location>(),
            Err(LocationError::Malformed(_))
        ));
        assert!(matches!(
            "north,east".parse::<Location>(),
            Err(LocationError::Malformed(_))
        ));
        assert!(matches!(
            "100,0".parse::<Location>(),
            Err(LocationError::LatitudeOutOfRange(_))
        ));
    }

    #[test]
    fn display_round_trips_through_parse() {
        let loc = Location::new(-12.25, 130.5).unwrap();
        assert_eq!(loc.to_string().parse::<Location>().unwrap(), loc);
    }

    #[test]
    fn equality_is_exact() {
        let a = Location { lat: 1.0, long: 1.0 };
        let b = Location {
            lat: 1.0 + f64::EPSILON,
            long: 1.0,
        };
        assert_ne!(a, b);
        assert_eq!(a, Location { lat: 1.0, long: 1.0 });
    }

    #[test]
    fn signed_zeros_compare_equal() {
        let positive = Location { lat: 0.0, long: 0.0 };
        let negative = Location {
            lat: -0.0,
            long: -0.0,
        };
        assert_ne!(positive.lat.to_bits(), negative.lat.to_bits());
        assert_eq!(positive, negative);
    }

    #[test]
    fn default_region_contains_center() {
        let region = MapRegion::default();
        assert!(region.contains(&MapRegion::DEFAULT_CENTER));
        let far = Location::new(38.0, 36.9228).unwrap();
        assert!(!region.contains(&far));
    }

    #[test]
    fn error_display() {
        assert_eq!(
            LocationError::Malformed("x".into()).to_string(),
            "expected 'lat,long', got 'x'"
        );
    }
}
