use thiserror::Error;

use crate::backends::BackendError;
use crate::config::ConfigError;
use crate::model::Address;

/// Errors that abort a naming run.
///
/// Unreadable string literals and nodes without a single qualifying
/// reference are not errors; they are skipped (and logged) where they occur.
#[derive(Debug, Error)]
pub enum AutonameError {
    /// Every uniquified candidate for a rename was already taken.
    #[error("Unable to name {address:#x}: {old_name} -> {base} (last tried {last_attempt})")]
    RenameCollisionExhausted {
        address: Address,
        old_name: String,
        base: String,
        last_attempt: String,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type AutonameResult<T> = Result<T, AutonameError>;
