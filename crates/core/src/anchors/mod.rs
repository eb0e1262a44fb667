//! String-literal anchors.
//!
//! A string literal referenced by exactly one not-yet-meaningfully-named
//! function is a strong hint for that function's name. Functions that
//! already carry a meaningful name never receive an anchor; strings used
//! only by such functions produce no candidate at all.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::backends::{BackendResult, NamingBackend};
use crate::error::AutonameResult;
use crate::model::{Address, Node, StringEncoding};
use crate::naming::{self, NamingRules};
use crate::rename::{RenamePhase, RunStats, SafeRenamer};

/// Proposed name for a function, derived from one string literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameCandidate {
    pub function: Address,
    /// Lowest referencing address inside `function`.
    pub reference: Address,
    pub string: Address,
    pub sanitized: String,
}

/// Result of scanning every string literal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorScan {
    /// At most one candidate per function, keyed by function start.
    pub candidates: BTreeMap<Address, NameCandidate>,
    /// Strings without decodable content.
    pub missing: Vec<Address>,
}

/// Collect one candidate per function from the project's string literals.
///
/// When several strings qualify for the same function, the one referenced
/// from the lowest address wins.
pub fn resolve_candidates(
    backend: &dyn NamingBackend,
    rules: &NamingRules,
    encoding: StringEncoding,
) -> BackendResult<AnchorScan> {
    let mut scan = AnchorScan::default();

    for entry in backend.strings(encoding)? {
        let Some(text) = entry.text else {
            warn!("Nothing for string at {:#x}", entry.address);
            scan.missing.push(entry.address);
            continue;
        };
        let sanitized = naming::sanitize(&text);
        if sanitized.is_empty() {
            continue;
        }

        // function start -> lowest referencing address
        let mut referrers: BTreeMap<Address, Address> = BTreeMap::new();
        for xref in backend.xrefs_to(entry.address)? {
            let Some(bounds) = backend.function_containing(xref.from)? else {
                continue;
            };
            let func = Node::resolve(backend, bounds.start)?;
            if !rules.accepts_anchor(&func.name) {
                continue;
            }
            referrers
                .entry(func.addr)
                .and_modify(|lowest| *lowest = (*lowest).min(xref.from))
                .or_insert(xref.from);
        }

        if referrers.len() != 1 {
            if referrers.len() > 1 {
                debug!(
                    "string at {:#x} is referenced by {} functions; skipped",
                    entry.address,
                    referrers.len()
                );
            }
            continue;
        }
        let Some((function, reference)) = referrers.into_iter().next() else {
            continue;
        };

        let candidate = NameCandidate { function, reference, string: entry.address, sanitized };
        match scan.candidates.get(&function) {
            Some(existing) if existing.reference <= candidate.reference => {}
            _ => {
                scan.candidates.insert(function, candidate);
            }
        }
    }

    Ok(scan)
}

/// Commit every candidate through the safe rename protocol.
pub fn apply_candidates(
    backend: &mut dyn NamingBackend,
    renamer: &SafeRenamer,
    rules: &NamingRules,
    max_len: usize,
    candidates: &BTreeMap<Address, NameCandidate>,
    stats: &mut RunStats,
) -> AutonameResult<()> {
    info!("Renaming based on strings ({} candidates)", candidates.len());
    for candidate in candidates.values() {
        let Some(base) = rules.anchor_name(&candidate.sanitized, max_len) else {
            continue;
        };
        let func = Node::resolve(&*backend, candidate.function)?;
        renamer.safe_name(backend, stats, func.addr, &base, &func.name, RenamePhase::StringAnchor)?;
    }
    Ok(())
}

/// Give every named string literal a stable name derived from its text.
///
/// Literals already carrying the prefix are left alone. Returns the
/// addresses of strings without decodable content.
pub fn rename_string_literals(
    backend: &mut dyn NamingBackend,
    renamer: &SafeRenamer,
    rules: &NamingRules,
    encoding: StringEncoding,
    max_len: usize,
    stats: &mut RunStats,
) -> AutonameResult<Vec<Address>> {
    info!("Renaming string literals");
    let mut missing = Vec::new();
    for entry in backend.strings(encoding)? {
        let Some(text) = entry.text else {
            warn!("Nothing for string at {:#x}", entry.address);
            missing.push(entry.address);
            continue;
        };
        let name = backend.name_at(entry.address)?.unwrap_or_default();
        if name.is_empty() || name.starts_with(rules.prefix()) {
            continue;
        }
        let Some(base) = rules.anchor_name(&text, max_len) else {
            continue;
        };
        renamer.safe_name(backend, stats, entry.address, &base, &name, RenamePhase::StringLiteral)?;
    }
    Ok(missing)
}
