#![forbid(unsafe_code)]

//! Error types for the runtime.
//!
//! Every error here is local and recoverable. None of them leaves a store in
//! a half-updated state: a failed `set` or a failed fetch keeps the previous
//! value and fires no notification.

use std::fmt;
use std::io;
use std::time::Duration;

use pinmap_core::{LocationError, PersonId};

/// Errors from [`Observable`](crate::reactive::Observable) operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactiveError {
    /// The value was read before the first `set`.
    AbsentValue,
    /// `set` was called on an observable from inside its own notification
    /// while the reentrancy policy is `Reject`.
    ReentrantNotification {
        /// Version being notified when the nested `set` arrived.
        version: u64,
    },
    /// The notification chain is already `depth` rounds deep and the
    /// observable allows at most `limit`.
    CascadeTooDeep { depth: usize, limit: usize },
}

impl fmt::Display for ReactiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AbsentValue => write!(f, "observable has no value yet"),
            Self::ReentrantNotification { version } => {
                write!(f, "re-entrant set while notifying version {version}")
            }
            Self::CascadeTooDeep { depth, limit } => {
                write!(f, "notification cascade depth {depth} reached limit {limit}")
            }
        }
    }
}

impl std::error::Error for ReactiveError {}

/// Errors reported by a [`PinSource`](crate::fetch::PinSource).
#[derive(Debug)]
pub enum FetchError {
    /// Reading the source failed.
    Io(io::Error),
    /// The source returned data that is not a list of people.
    Parse(String),
    /// The backend refused or is unreachable.
    Unavailable(String),
    /// No result arrived within the allotted time.
    TimedOut(Duration),
    /// The worker thread went away without reporting a result.
    Disconnected,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "fetch i/o error: {err}"),
            Self::Parse(msg) => write!(f, "fetch parse error: {msg}"),
            Self::Unavailable(msg) => write!(f, "pin source unavailable: {msg}"),
            Self::TimedOut(after) => write!(f, "fetch timed out after {}ms", after.as_millis()),
            Self::Disconnected => write!(f, "fetch worker exited without a result"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for FetchError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Errors from [`Session`](crate::session::Session) and the stores.
#[derive(Debug)]
pub enum SessionError {
    /// An observable refused the update.
    Reactive(ReactiveError),
    /// A fetch failed; the pins keep their last good value.
    StaleFetch(FetchError),
    /// The operation needs a signed-in current user.
    NotSignedIn,
    /// A record with another id was offered to the current-user store.
    ForeignIdentity { expected: PersonId, found: PersonId },
    /// A pin was dropped at coordinates that are not on the map.
    InvalidLocation(LocationError),
    /// The background fetch thread could not be started.
    Spawn(io::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reactive(err) => write!(f, "{err}"),
            Self::StaleFetch(err) => write!(f, "pins not refreshed: {err}"),
            Self::NotSignedIn => write!(f, "no current user"),
            Self::ForeignIdentity { expected, found } => write!(
                f,
                "current user is {expected}, refusing record for {found}"
            ),
            Self::InvalidLocation(err) => write!(f, "cannot pin there: {err}"),
            Self::Spawn(err) => write!(f, "could not start fetch worker: {err}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Reactive(err) => Some(err),
            Self::StaleFetch(err) => Some(err),
            Self::InvalidLocation(err) => Some(err),
            Self::Spawn(err) => Some(err),
            Self::NotSignedIn | Self::ForeignIdentity { .. } => None,
        }
    }
}

impl From<ReactiveError> for SessionError {
    fn from(err: ReactiveError) -> Self {
        Self::Reactive(err)
    }
}

impl From<FetchError> for SessionError {
    fn from(err: FetchError) -> Self {
        Self::StaleFetch(err)
    }
}

/// Configuration error with field context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub field: &'static str,
    pub value: String,
    pub message: String,
}

impl ConfigError {
    pub(crate) fn new(
        field: &'static str,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field,
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} ({})", self.field, self.value, self.message)
    }
}

impl std::error::Error for ConfigError {}
