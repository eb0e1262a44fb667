//! Audit trail persistence.
//!
//! Every naming run can be recorded in a small SQLite database:
//! - `autoname_runs`: one row per run (project, hash, strategy, status)
//! - `autoname_renames`: the ordered `(old, new)` pairs the run committed
//!
//! Nothing else about a run is persisted.

pub mod audit_db;
pub mod models;

pub use audit_db::{AuditDb, DbError, DbResult, CURRENT_SCHEMA_VERSION};
pub use models::{AuditRunRecord, RunStatus};
