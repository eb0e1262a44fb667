use std::path::Path;

use rusqlite::{params, Connection};
use thiserror::Error;

use crate::db::{AuditRunRecord, RunStatus};
use crate::rename::{RenamePhase, RenameRecord};

/// Minimum schema version we know how to handle.
///
/// `0` means "no schema yet" (fresh DB).
const MIN_SUPPORTED_SCHEMA_VERSION: i32 = 0;

/// Latest schema version this crate knows about.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error(
        "Unsupported schema version {found}; supported range is {min_supported}..={max_supported}"
    )]
    UnsupportedSchemaVersion { found: i32, min_supported: i32, max_supported: i32 },

    #[error("Corrupt audit row: {0}")]
    Corrupt(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// SQLite store for the audit trail of naming runs.
#[derive(Debug)]
pub struct AuditDb {
    conn: Connection,
}

impl AuditDb {
    /// Open (or create) an audit database and bring its schema up to date.
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory database, mostly for tests.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Insert a run record and return its row id.
    pub fn insert_run(&self, record: &AuditRunRecord) -> DbResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO autoname_runs
                (project, project_hash, backend, strategy, status, renames, started_at, finished_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                record.project,
                record.project_hash,
                record.backend,
                record.strategy,
                record.status.as_str(),
                record.renames as i64,
                record.started_at,
                record.finished_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Append the audit trail of `run_id`, preserving order.
    pub fn insert_renames(&mut self, run_id: i64, renames: &[RenameRecord]) -> DbResult<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO autoname_renames (run_id, seq, address, old_name, new_name, phase)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for (seq, rename) in renames.iter().enumerate() {
                stmt.execute(params![
                    run_id,
                    seq as i64,
                    rename.address as i64,
                    rename.old_name,
                    rename.new_name,
                    rename.phase.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(renames.len())
    }

    /// List runs (ordered by id), optionally for a single project.
    pub fn list_runs(&self, project: Option<&str>) -> DbResult<Vec<(i64, AuditRunRecord)>> {
        fn map_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, AuditRunRecord, String)> {
            let renames: i64 = row.get(6)?;
            Ok((
                row.get(0)?,
                AuditRunRecord {
                    project: row.get(1)?,
                    project_hash: row.get(2)?,
                    backend: row.get(3)?,
                    strategy: row.get(4)?,
                    status: RunStatus::Running,
                    renames: renames as u64,
                    started_at: row.get(7)?,
                    finished_at: row.get(8)?,
                },
                row.get(5)?,
            ))
        }

        let sql = r#"
            SELECT id, project, project_hash, backend, strategy, status, renames,
                   started_at, finished_at
            FROM autoname_runs
            WHERE ?1 IS NULL OR project = ?1
            ORDER BY id
            "#;
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![project], map_run)?;

        let mut out = Vec::new();
        for row in rows {
            let (id, mut record, status) = row?;
            record.status = status.parse().map_err(DbError::Corrupt)?;
            out.push((id, record));
        }
        Ok(out)
    }

    /// Load the ordered audit trail of a run.
    pub fn load_renames(&self, run_id: i64) -> DbResult<Vec<RenameRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT address, old_name, new_name, phase
            FROM autoname_renames
            WHERE run_id = ?1
            ORDER BY seq
            "#,
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            let address: i64 = row.get(0)?;
            let phase: String = row.get(3)?;
            Ok((address as u64, row.get::<_, String>(1)?, row.get::<_, String>(2)?, phase))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (address, old_name, new_name, phase) = row?;
            let phase: RenamePhase = phase.parse().map_err(DbError::Corrupt)?;
            out.push(RenameRecord { address, old_name, new_name, phase });
        }
        Ok(out)
    }

    /// Update status, rename count and finish time of a run.
    pub fn update_run_status(
        &self,
        run_id: i64,
        status: RunStatus,
        renames: u64,
        finished_at: &str,
    ) -> DbResult<usize> {
        let updated = self.conn.execute(
            r#"
            UPDATE autoname_runs
            SET status = ?1, renames = ?2, finished_at = ?3
            WHERE id = ?4
            "#,
            params![status.as_str(), renames as i64, finished_at, run_id],
        )?;
        Ok(updated)
    }
}

/// Apply schema migrations up to `CURRENT_SCHEMA_VERSION`.
///
/// We use `PRAGMA user_version` as the schema version indicator.
fn apply_migrations(conn: &Connection) -> DbResult<()> {
    let current_version = current_schema_version(conn)?;

    if !(MIN_SUPPORTED_SCHEMA_VERSION..=CURRENT_SCHEMA_VERSION).contains(&current_version) {
        return Err(DbError::UnsupportedSchemaVersion {
            found: current_version,
            min_supported: MIN_SUPPORTED_SCHEMA_VERSION,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if current_version < 1 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS autoname_runs (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                project      TEXT NOT NULL,
                project_hash TEXT,
                backend      TEXT NOT NULL,
                strategy     TEXT NOT NULL,
                status       TEXT NOT NULL,
                renames      INTEGER NOT NULL DEFAULT 0,
                started_at   TEXT NOT NULL,
                finished_at  TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS autoname_renames (
                run_id   INTEGER NOT NULL,
                seq      INTEGER NOT NULL,
                address  INTEGER NOT NULL,
                old_name TEXT NOT NULL,
                new_name TEXT NOT NULL,
                phase    TEXT NOT NULL,
                PRIMARY KEY(run_id, seq)
            );
            PRAGMA user_version = 1;
            COMMIT;
            "#,
        )?;
    }

    Ok(())
}

/// Read the SQLite schema version from `PRAGMA user_version`.
fn current_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(version)
}
