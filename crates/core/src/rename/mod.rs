//! Collision-safe renaming.
//!
//! A rename walks the candidates produced by a `Uniquifier` (the bare base
//! name first) and commits the first one the backend accepts. Every commit
//! bumps the run counter and appends an audit record; running out of
//! candidates is fatal for the whole run.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::backends::{NamingBackend, SetNameFlags};
use crate::error::{AutonameError, AutonameResult};
use crate::model::Address;

/// Default number of numeric suffixes tried after the bare name.
pub const DEFAULT_MAX_ATTEMPTS: usize = 10_000;

/// Produces the candidate names tried for one rename.
pub trait Uniquifier {
    /// Candidate for `attempt` (0 is the bare `base`), or `None` when the
    /// strategy is exhausted.
    fn candidate(&self, base: &str, attempt: usize) -> Option<String>;
}

/// `base`, `base0`, `base1`, ... up to `max_suffixes` suffixed names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericSuffix {
    pub max_suffixes: usize,
}

impl Default for NumericSuffix {
    fn default() -> Self {
        Self { max_suffixes: DEFAULT_MAX_ATTEMPTS }
    }
}

impl Uniquifier for NumericSuffix {
    fn candidate(&self, base: &str, attempt: usize) -> Option<String> {
        match attempt {
            0 => Some(base.to_string()),
            n if n <= self.max_suffixes => Some(format!("{base}{}", n - 1)),
            _ => None,
        }
    }
}

/// `base`, then `base_<8 hex digits>` derived from SHA-256 of the base and
/// attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashSuffix {
    pub max_suffixes: usize,
}

impl Default for HashSuffix {
    fn default() -> Self {
        Self { max_suffixes: DEFAULT_MAX_ATTEMPTS }
    }
}

impl Uniquifier for HashSuffix {
    fn candidate(&self, base: &str, attempt: usize) -> Option<String> {
        if attempt == 0 {
            return Some(base.to_string());
        }
        if attempt > self.max_suffixes {
            return None;
        }
        let mut hasher = Sha256::new();
        hasher.update(base.as_bytes());
        hasher.update(attempt.to_le_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Some(format!("{base}_{}", &digest[..8]))
    }
}

/// Caller-supplied candidate generator.
pub struct FnUniquifier<F>(pub F);

impl<F> Uniquifier for FnUniquifier<F>
where
    F: Fn(&str, usize) -> Option<String>,
{
    fn candidate(&self, base: &str, attempt: usize) -> Option<String> {
        (self.0)(base, attempt)
    }
}

/// Which part of the run produced a rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenamePhase {
    StringLiteral,
    StringAnchor,
    DataPass,
    FunctionPass,
    Markov,
}

impl RenamePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            RenamePhase::StringLiteral => "string_literal",
            RenamePhase::StringAnchor => "string_anchor",
            RenamePhase::DataPass => "data_pass",
            RenamePhase::FunctionPass => "function_pass",
            RenamePhase::Markov => "markov",
        }
    }
}

impl fmt::Display for RenamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RenamePhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string_literal" => Ok(RenamePhase::StringLiteral),
            "string_anchor" => Ok(RenamePhase::StringAnchor),
            "data_pass" => Ok(RenamePhase::DataPass),
            "function_pass" => Ok(RenamePhase::FunctionPass),
            "markov" => Ok(RenamePhase::Markov),
            other => Err(format!("unknown rename phase '{other}'")),
        }
    }
}

/// One committed rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRecord {
    pub address: Address,
    pub old_name: String,
    pub new_name: String,
    pub phase: RenamePhase,
}

/// Rename counter plus ordered audit trail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub renames: usize,
    pub audit: Vec<RenameRecord>,
}

impl RunStats {
    pub fn record(&mut self, record: RenameRecord) {
        self.renames += 1;
        self.audit.push(record);
    }

    /// Fold another pass's stats into this one, keeping audit order.
    pub fn absorb(&mut self, other: RunStats) {
        self.renames += other.renames;
        self.audit.extend(other.audit);
    }

    pub fn is_empty(&self) -> bool {
        self.renames == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed { new_name: String },
    /// The old name already is (or starts with) the proposed base.
    Unchanged,
}

impl RenameOutcome {
    pub fn is_renamed(&self) -> bool {
        matches!(self, RenameOutcome::Renamed { .. })
    }
}

/// Commits renames through a `Uniquifier`.
pub struct SafeRenamer {
    uniquifier: Box<dyn Uniquifier>,
}

impl SafeRenamer {
    pub fn new(uniquifier: Box<dyn Uniquifier>) -> Self {
        Self { uniquifier }
    }

    /// Rename `addr` from `old_name` to the first free candidate for `base`.
    pub fn safe_name(
        &self,
        backend: &mut dyn NamingBackend,
        stats: &mut RunStats,
        addr: Address,
        base: &str,
        old_name: &str,
        phase: RenamePhase,
    ) -> AutonameResult<RenameOutcome> {
        if old_name.starts_with(base) {
            return Ok(RenameOutcome::Unchanged);
        }

        let mut last_attempt = base.to_string();
        let mut attempt = 0;
        while let Some(candidate) = self.uniquifier.candidate(base, attempt) {
            if backend.set_name(addr, &candidate, SetNameFlags::UNATTENDED)? {
                info!("{old_name} -> {candidate}");
                stats.record(RenameRecord {
                    address: addr,
                    old_name: old_name.to_string(),
                    new_name: candidate.clone(),
                    phase,
                });
                return Ok(RenameOutcome::Renamed { new_name: candidate });
            }
            last_attempt = candidate;
            attempt += 1;
        }

        Err(AutonameError::RenameCollisionExhausted {
            address: addr,
            old_name: old_name.to_string(),
            base: base.to_string(),
            last_attempt,
        })
    }
}

impl Default for SafeRenamer {
    fn default() -> Self {
        Self::new(Box::new(NumericSuffix::default()))
    }
}
