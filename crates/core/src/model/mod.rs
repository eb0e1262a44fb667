//! Core data model for the naming pass.
//!
//! Everything here is a plain value handed across the backend seam:
//! - Segment descriptors (code vs data)
//! - Function bounds
//! - Cross references with a kind tag
//! - String literal entries
//! - `Node`, the resolved function-or-data entity that names flow between

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backends::{BackendError, BackendResult, NamingBackend};

/// Location in the analyzed image.
pub type Address = u64;

/// Owned span of a non-function node (a scalar data object).
pub const DATA_SPAN: u64 = 4;

/// Segment class tag. Only `Code` segments are skipped by the data passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentClass {
    Code,
    Data,
    Bss,
    Const,
}

/// Segment descriptor; `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    pub start: Address,
    pub end: Address,
    pub class: SegmentClass,
}

impl Segment {
    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.start && addr < self.end
    }
}

/// Start/end (exclusive) of a recognized function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionBounds {
    pub start: Address,
    pub end: Address,
}

/// Kind of a cross reference as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Call,
    Jump,
    /// Ordinary fall-through to the next instruction.
    Flow,
    Read,
    Write,
    Offset,
    Other,
}

/// Cross reference between two addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XRef {
    pub from: Address,
    pub to: Address,
    pub kind: RefKind,
}

/// Literal encoding used when enumerating strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringEncoding {
    #[default]
    C,
    Utf16,
    Utf32,
}

/// String literal as enumerated by the backend.
///
/// `text` is `None` when the string table entry has no decodable content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringEntry {
    pub address: Address,
    pub text: Option<String>,
}

/// A function or data object resolved from a raw address.
///
/// Identity is the start address. The name is whatever the backend reports
/// at resolution time (demangled when possible), so re-resolve after renames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub addr: Address,
    pub end_addr: Address,
    pub is_function: bool,
    pub name: String,
}

impl Node {
    /// Resolve `addr` to the function containing it, or to a scalar data
    /// object starting at it.
    pub fn resolve(backend: &dyn NamingBackend, addr: Address) -> BackendResult<Self> {
        let (start, end, is_function) = match backend.function_containing(addr)? {
            Some(bounds) => {
                if bounds.end <= bounds.start {
                    return Err(BackendError::InvalidBounds {
                        start: bounds.start,
                        end: bounds.end,
                    });
                }
                (bounds.start, bounds.end, true)
            }
            None => (addr, addr.saturating_add(DATA_SPAN), false),
        };
        if end <= start {
            return Err(BackendError::InvalidBounds { start, end });
        }

        let mut name = backend.name_at(start)?.unwrap_or_default();
        if !name.is_empty() {
            if let Some(demangled) = backend.demangle(&name)? {
                name = demangled;
            }
        }

        Ok(Self { addr: start, end_addr: end, is_function, name })
    }

    /// True when `target` lies inside this node's own range.
    pub fn owns(&self, target: Address) -> bool {
        target >= self.addr && target < self.end_addr
    }

    /// Meaningful-name check, see [`crate::naming::is_named`].
    pub fn is_named(&self) -> bool {
        crate::naming::is_named(&self.name)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_function {
            write!(f, "{}()", self.name)
        } else {
            write!(f, "{}@", self.name)
        }
    }
}
