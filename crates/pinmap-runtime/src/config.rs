#![forbid(unsafe_code)]

//! Session configuration (deterministic defaults, env-overridable).
//!
//! # Environment Variables
//! - `PINMAP_RECONCILE_KEY` = identity|coordinate
//! - `PINMAP_REENTRANCY` = reject|queue
//! - `PINMAP_MAX_CASCADE_DEPTH` (usize, at least 2)
//! - `PINMAP_MAP_CENTER` = `lat,long`
//! - `PINMAP_MAP_SPAN` (positive float, degrees)
//! - `PINMAP_FETCH_TIMEOUT_MS` (positive integer)
//!
//! Unparseable values are reported as diagnostics and the default is kept.

use std::env;
use std::time::Duration;

use pinmap_core::{Location, MapRegion};

use crate::error::ConfigError;
use crate::reactive::{ObservableConfig, Reentrancy};
use crate::reconcile::ReconcileKey;

const ENV_RECONCILE_KEY: &str = "PINMAP_RECONCILE_KEY";
const ENV_REENTRANCY: &str = "PINMAP_REENTRANCY";
const ENV_MAX_CASCADE_DEPTH: &str = "PINMAP_MAX_CASCADE_DEPTH";
const ENV_MAP_CENTER: &str = "PINMAP_MAP_CENTER";
const ENV_MAP_SPAN: &str = "PINMAP_MAP_SPAN";
const ENV_FETCH_TIMEOUT_MS: &str = "PINMAP_FETCH_TIMEOUT_MS";

/// Current user → pins → reconcile needs two nested rounds.
pub const MIN_CASCADE_DEPTH: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub reconcile_key: ReconcileKey,
    /// Applied to both stores.
    pub observable: ObservableConfig,
    /// Where the map opens.
    pub map_region: MapRegion,
    /// Upper bound for [`Session::finish_refresh`](crate::session::Session::finish_refresh).
    pub fetch_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconcile_key: ReconcileKey::Identity,
            observable: ObservableConfig::default(),
            map_region: MapRegion::default(),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// Configuration parse diagnostics (env + validation).
#[derive(Debug, Clone)]
pub struct SessionConfigParse {
    pub config: SessionConfig,
    pub errors: Vec<ConfigError>,
}

impl SessionConfig {
    /// Parse config from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with_diagnostics().config
    }

    /// Parse config from environment variables and return diagnostics.
    #[must_use]
    pub fn from_env_with_diagnostics() -> SessionConfigParse {
        from_env_with(|key| env::var(key).ok())
    }

    #[must_use]
    pub fn with_reconcile_key(mut self, key: ReconcileKey) -> Self {
        self.reconcile_key = key;
        self
    }

    #[must_use]
    pub fn with_reentrancy(mut self, reentrancy: Reentrancy) -> Self {
        self.observable.reentrancy = reentrancy;
        self
    }

    #[must_use]
    pub fn with_max_cascade_depth(mut self, depth: usize) -> Self {
        self.observable.max_cascade_depth = depth;
        self
    }

    #[must_use]
    pub fn with_map_region(mut self, region: MapRegion) -> Self {
        self.map_region = region;
        self
    }

    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Validate config constraints and return all violations.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();
        if self.observable.max_cascade_depth < MIN_CASCADE_DEPTH {
            errors.push(ConfigError::new(
                "max_cascade_depth",
                self.observable.max_cascade_depth.to_string(),
                "current-user merges need a cascade depth of at least 2",
            ));
        }
        if let Err(err) = self.map_region.center.validate() {
            errors.push(ConfigError::new(
                "map_center",
                self.map_region.center.to_string(),
                err.to_string(),
            ));
        }
        if !(self.map_region.span.is_finite() && self.map_region.span > 0.0) {
            errors.push(ConfigError::new(
                "map_span",
                self.map_region.span.to_string(),
                "expected positive float",
            ));
        }
        if self.fetch_timeout.is_zero() {
            errors.push(ConfigError::new(
                "fetch_timeout",
                "0",
                "expected positive duration",
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Short human-readable summary for logs.
    #[must_use]
    pub fn summary_short(&self) -> String {
        format!(
            "key={} reentrancy={} depth={} center={} span={}",
            self.reconcile_key,
            self.observable.reentrancy,
            self.observable.max_cascade_depth,
            self.map_region.center,
            self.map_region.span
        )
    }
}

fn from_env_with<F>(mut get: F) -> SessionConfigParse
where
    F: FnMut(&str) -> Option<String>,
{
    let mut config = SessionConfig::default();
    let mut errors = Vec::new();

    if let Some(value) = get(ENV_RECONCILE_KEY) {
        match ReconcileKey::parse(&value) {
            Some(parsed) => config.reconcile_key = parsed,
            None => errors.push(ConfigError::new(
                "reconcile_key",
                value,
                "expected identity|coordinate",
            )),
        }
    }

    if let Some(value) = get(ENV_REENTRANCY) {
        match Reentrancy::parse(&value) {
            Some(parsed) => config.observable.reentrancy = parsed,
            None => errors.push(ConfigError::new(
                "reentrancy",
                value,
                "expected reject|queue",
            )),
        }
    }

    if let Some(value) = get(ENV_MAX_CASCADE_DEPTH) {
        match value.trim().parse::<usize>() {
            Ok(parsed) => config.observable.max_cascade_depth = parsed,
            Err(_) => errors.push(ConfigError::new(
                "max_cascade_depth",
                value,
                "expected positive integer",
            )),
        }
    }

    if let Some(value) = get(ENV_MAP_CENTER) {
        match value.parse::<Location>() {
            Ok(parsed) => config.map_region.center = parsed,
            Err(err) => errors.push(ConfigError::new("map_center", value, err.to_string())),
        }
    }

    if let Some(value) = get(ENV_MAP_SPAN) {
        match value.trim().parse::<f64>() {
            Ok(parsed) => config.map_region.span = parsed,
            Err(_) => errors.push(ConfigError::new(
                "map_span",
                value,
                "expected positive float",
            )),
        }
    }

    if let Some(value) = get(ENV_FETCH_TIMEOUT_MS) {
        match value.trim().parse::<u64>() {
            Ok(parsed) => config.fetch_timeout = Duration::from_millis(parsed),
            Err(_) => errors.push(ConfigError::new(
                "fetch_timeout",
                value,
                "expected positive integer (ms)",
            )),
        }
    }

    if let Err(mut violations) = config.validate() {
        errors.append(&mut violations);
    }

    SessionConfigParse { config, errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn parse(vars: &[(&str, &str)]) -> SessionConfigParse {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        from_env_with(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_are_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reconcile_key, ReconcileKey::Identity);
        assert_eq!(config.observable.reentrancy, Reentrancy::Reject);
        assert_eq!(config.map_region, MapRegion::default());
    }

    #[test]
    fn empty_env_gives_defaults() {
        let parsed = parse(&[]);
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.config, SessionConfig::default());
    }

    #[test]
    fn env_overrides_apply() {
        let parsed = parse(&[
            ("PINMAP_RECONCILE_KEY", "coordinate"),
            ("PINMAP_REENTRANCY", "queue"),
            ("PINMAP_MAX_CASCADE_DEPTH", "6"),
            ("PINMAP_MAP_CENTER", "41.0,29.0"),
            ("PINMAP_MAP_SPAN", "0.5"),
            ("PINMAP_FETCH_TIMEOUT_MS", "250"),
        ]);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        let config = parsed.config;
        assert_eq!(config.reconcile_key, ReconcileKey::Coordinate);
        assert_eq!(config.observable.reentrancy, Reentrancy::Queue);
        assert_eq!(config.observable.max_cascade_depth, 6);
        assert_eq!(config.map_region.center, Location::new(41.0, 29.0).unwrap());
        assert_eq!(config.map_region.span, 0.5);
        assert_eq!(config.fetch_timeout, Duration::from_millis(250));
    }

    #[test]
    fn bad_values_keep_defaults_and_report() {
        let parsed = parse(&[
            ("PINMAP_RECONCILE_KEY", "nearest"),
            ("PINMAP_MAP_CENTER", "north"),
            ("PINMAP_FETCH_TIMEOUT_MS", "soon"),
        ]);
        let fields: Vec<&str> = parsed.errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["reconcile_key", "map_center", "fetch_timeout"]);
        assert_eq!(parsed.config, SessionConfig::default());
    }

    #[test]
    fn validation_catches_shallow_cascade_and_bad_span() {
        let parsed = parse(&[
            ("PINMAP_MAX_CASCADE_DEPTH", "1"),
            ("PINMAP_MAP_SPAN", "-3"),
        ]);
        let fields: Vec<&str> = parsed.errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["max_cascade_depth", "map_span"]);
    }

    #[test]
    fn validate_reports_all_violations() {
        let config = SessionConfig::default()
            .with_max_cascade_depth(0)
            .with_fetch_timeout(Duration::ZERO)
            .with_map_region(MapRegion::new(Location { lat: 95.0, long: 0.0 }, 0.0));
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn summary_mentions_key() {
        let summary = SessionConfig::default()
            .with_reconcile_key(ReconcileKey::Coordinate)
            .summary_short();
        assert!(summary.contains("key=coordinate"));
        assert!(summary.contains("reentrancy=reject"));
    }
}
