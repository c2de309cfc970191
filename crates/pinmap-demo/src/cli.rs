#![forbid(unsafe_code)]

//! Command-line argument parsing for the demo.
//!
//! Parses args manually to keep the binary lean. Supports environment
//! variable defaults via the `PINMAP_DEMO_*` prefix.

use std::env;
use std::process;

use pinmap_core::Location;
use pinmap_runtime::ReconcileKey;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
pinmap demo: load pins, sign in, drop pins, and print the map

USAGE:
    pinmap-demo [OPTIONS]

OPTIONS:
    --pins=PATH          JSON array of people to pin (default: built-in fixture)
    --user-id=N          Id of the signed-in user (default: 1)
    --user-name=NAME     Name of the signed-in user (default: Me)
    --drop=LAT,LONG      Drop the user's pin here; repeatable, applied in order
    --key=KEY            Match pins by 'identity' or 'coordinate' (default: identity)
    --background         Fetch pins on a worker thread
    --json               Print JSON lines instead of text
    --help, -h           Show this help message
    --version, -V        Show version

ENVIRONMENT VARIABLES:
    PINMAP_DEMO_PINS          Default for --pins
    PINMAP_DEMO_USER_ID       Default for --user-id
    PINMAP_DEMO_USER_NAME     Default for --user-name
    PINMAP_DEMO_JSON          Print JSON lines (1/true)
    PINMAP_RECONCILE_KEY      Session default for --key
    PINMAP_REENTRANCY         reject|queue
    PINMAP_MAX_CASCADE_DEPTH  Nested update limit (>= 2)
    PINMAP_MAP_CENTER         Map center as LAT,LONG
    PINMAP_MAP_SPAN           Map span in degrees
    PINMAP_FETCH_TIMEOUT_MS   Background fetch timeout
    RUST_LOG                  Log filter (logs go to stderr)";

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq)]
pub struct Opts {
    /// Pins file; `None` uses the built-in fixture.
    pub pins: Option<String>,
    pub user_id: u64,
    pub user_name: String,
    /// Pin drops, in order.
    pub drops: Vec<Location>,
    /// Overrides the session config when set.
    pub key: Option<ReconcileKey>,
    pub background: bool,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParseError {
    Help,
    Version,
    InvalidValue { flag: &'static str, value: String },
    UnknownArg(String),
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            pins: None,
            user_id: 1,
            user_name: "Me".into(),
            drops: Vec::new(),
            key: None,
            background: false,
            json: false,
        }
    }
}

impl Opts {
    /// Parse command-line arguments and environment variables.
    ///
    /// Environment variables take precedence over defaults but are overridden
    /// by explicit command-line flags.
    pub fn parse() -> Self {
        match Self::parse_from_env_and_args(env::args().skip(1), |key| env::var(key).ok()) {
            Ok(opts) => opts,
            Err(ParseError::Help) => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            Err(ParseError::Version) => {
                println!("pinmap-demo {VERSION}");
                process::exit(0);
            }
            Err(ParseError::InvalidValue { flag, value }) => {
                eprintln!("Invalid {flag} value: {value}");
                process::exit(1);
            }
            Err(ParseError::UnknownArg(arg)) => {
                eprintln!("Unknown argument: {arg}");
                eprintln!("Run with --help for usage information.");
                process::exit(1);
            }
        }
    }

    fn parse_from_env_and_args<I, S, F>(args: I, get_env: F) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&str) -> Option<String>,
    {
        let mut opts = Self::default();

        // Apply environment variable defaults first
        if let Some(val) = get_env("PINMAP_DEMO_PINS")
            && !val.trim().is_empty()
        {
            opts.pins = Some(val);
        }
        if let Some(val) = get_env("PINMAP_DEMO_USER_ID")
            && let Ok(n) = val.trim().parse()
        {
            opts.user_id = n;
        }
        if let Some(val) = get_env("PINMAP_DEMO_USER_NAME")
            && !val.trim().is_empty()
        {
            opts.user_name = val;
        }
        if let Some(val) = get_env("PINMAP_DEMO_JSON") {
            opts.json = val == "1" || val.eq_ignore_ascii_case("true");
        }

        // Parse command-line args (override env vars)
        for arg in args {
            let arg = arg.as_ref();
            match arg {
                "--help" | "-h" => return Err(ParseError::Help),
                "--version" | "-V" => return Err(ParseError::Version),
                "--json" => opts.json = true,
                "--background" => opts.background = true,
                other => {
                    if let Some(val) = other.strip_prefix("--pins=") {
                        if val.trim().is_empty() {
                            return Err(ParseError::InvalidValue {
                                flag: "--pins",
                                value: val.to_string(),
                            });
                        }
                        opts.pins = Some(val.to_string());
                    } else if let Some(val) = other.strip_prefix("--user-id=") {
                        match val.parse() {
                            Ok(n) => opts.user_id = n,
                            Err(_) => {
                                return Err(ParseError::InvalidValue {
                                    flag: "--user-id",
                                    value: val.to_string(),
                                });
                            }
                        }
                    } else if let Some(val) = other.strip_prefix("--user-name=") {
                        opts.user_name = val.to_string();
                    } else if let Some(val) = other.strip_prefix("--drop=") {
                        match val.parse::<Location>() {
                            Ok(location) => opts.drops.push(location),
                            Err(_) => {
                                return Err(ParseError::InvalidValue {
                                    flag: "--drop",
                                    value: val.to_string(),
                                });
                            }
                        }
                    } else if let Some(val) = other.strip_prefix("--key=") {
                        match ReconcileKey::parse(val) {
                            Some(key) => opts.key = Some(key),
                            None => {
                                return Err(ParseError::InvalidValue {
                                    flag: "--key",
                                    value: val.to_string(),
                                });
                            }
                        }
                    } else {
                        return Err(ParseError::UnknownArg(other.to_string()));
                    }
                }
            }
        }

        Ok(opts)
    }
}
