//! Analysis backends.
//!
//! The naming pass never disassembles anything itself. It talks to an
//! already-analyzed project through `NamingBackend`:
//! - segments, heads, functions and their items
//! - current names, demangling, and the guarded "set name" write
//! - cross references in both directions
//! - string literals
//!
//! `SnapshotBackend` is the bundled implementation over a serialized project.

use thiserror::Error;

use crate::model::{Address, FunctionBounds, Segment, StringEncoding, StringEntry, XRef};

pub mod snapshot;

pub use snapshot::{ProjectSnapshot, SnapshotBackend};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Invalid function bounds {start:#x}..{end:#x}")]
    InvalidBounds { start: Address, end: Address },
    #[error("Unknown segment {0}")]
    UnknownSegment(String),
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Snapshot format error: {0}")]
    Format(String),
    #[error("Backend error: {0}")]
    Other(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Options for `NamingBackend::set_name`.
///
/// `no_check` skips character validation, `no_warn` suppresses interactive
/// confirmation, `auto` allows overwriting backend-generated names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetNameFlags {
    pub no_check: bool,
    pub no_warn: bool,
    pub auto: bool,
}

impl SetNameFlags {
    /// The flag set used by every rename the engine commits.
    pub const UNATTENDED: SetNameFlags = SetNameFlags { no_check: true, no_warn: true, auto: true };
}

/// Trait implemented by analysis backends the naming pass runs against.
pub trait NamingBackend {
    /// Human-readable backend name (recorded in the audit trail).
    fn label(&self) -> &str;

    fn segments(&self) -> BackendResult<Vec<Segment>>;

    /// Addressable units inside `segment`, ascending.
    fn heads(&self, segment: &Segment) -> BackendResult<Vec<Address>>;

    /// Start addresses of every recognized function, ascending.
    fn functions(&self) -> BackendResult<Vec<Address>>;

    fn function_containing(&self, addr: Address) -> BackendResult<Option<FunctionBounds>>;

    /// Instruction addresses belonging to the function starting at `start`.
    fn function_items(&self, start: Address) -> BackendResult<Vec<Address>>;

    fn name_at(&self, addr: Address) -> BackendResult<Option<String>>;

    fn demangle(&self, name: &str) -> BackendResult<Option<String>>;

    /// Set the name at `addr`. Returns `Ok(false)` when the name is already
    /// taken by another address (or otherwise rejected); never overwrites it.
    fn set_name(&mut self, addr: Address, name: &str, flags: SetNameFlags) -> BackendResult<bool>;

    fn xrefs_from(&self, addr: Address) -> BackendResult<Vec<XRef>>;

    fn xrefs_to(&self, addr: Address) -> BackendResult<Vec<XRef>>;

    fn strings(&self, encoding: StringEncoding) -> BackendResult<Vec<StringEntry>>;
}
