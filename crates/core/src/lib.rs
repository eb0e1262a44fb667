//! autoname-core
//!
//! Heuristic naming of unnamed functions and data objects in an already
//! analyzed binary.
//!
//! Names come from two sources: string literals referenced by exactly one
//! unnamed function, and propagation across the reference graph when a node
//! has a single (or a majority) reference to something already named. The
//! crate never disassembles; it drives a `NamingBackend` that owns the
//! project state.

pub mod anchors;
pub mod backends;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod graph;
pub mod markov;
pub mod model;
pub mod naming;
pub mod rename;
pub mod services;

pub use config::{AutonameConfig, Strategy};
pub use engine::{Autonamer, RunReport};
pub use error::{AutonameError, AutonameResult};

/// Returns the library version as encoded at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
