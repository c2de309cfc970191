#![forbid(unsafe_code)]

//! Runtime for pinmap: observable stores, reconciliation, and sessions.
//!
//! # Role in pinmap
//! `pinmap-runtime` keeps a rendered map in step with two pieces of state:
//! the signed-in user and the list of people to pin. Both live in
//! [`Observable`](reactive::Observable)-backed stores. A [`Session`] wires
//! them so that a change to the user folds into the pins and a change to the
//! pins is reconciled onto a [`RenderSurface`].
//!
//! # Primary types
//! - **Session**: owns the stores, the surface, and the fetch worker.
//! - **CurrentUserStore** / **PinsStore**: the two observable stores.
//! - **Reconciler**: add/remove delta between pins and rendered artifacts.
//! - **PinSource** / **FetchWorker**: where pins come from, and fetching
//!   them off-thread.
//! - **SessionConfig**: env-overridable settings.
//!
//! # Features
//! - `json`: [`JsonFileSource`](fetch::JsonFileSource), reading pins from a
//!   JSON file.

pub mod config;
pub mod error;
pub mod fetch;
pub mod reactive;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod surface;

pub use config::{SessionConfig, SessionConfigParse};
pub use error::{ConfigError, FetchError, ReactiveError, SessionError};
#[cfg(feature = "json")]
pub use fetch::JsonFileSource;
pub use fetch::{FetchWorker, PinSource, StaticSource};
pub use reactive::{Observable, ObservableConfig, Reentrancy, Subscription};
pub use reconcile::{ReconcileKey, ReconcilePlan, ReconcileReport, Reconciler};
pub use session::Session;
pub use store::{CurrentUserStore, Merge, PinsStore};
pub use surface::{Artifact, ArtifactId, MemorySurface, RenderSurface, SurfaceOp};
