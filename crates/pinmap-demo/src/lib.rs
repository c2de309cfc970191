#![forbid(unsafe_code)]

//! pinmap demo library.
//!
//! Exposes the demo internals so tests can run a session end to end without
//! spawning the binary.

pub mod app;
pub mod cli;
