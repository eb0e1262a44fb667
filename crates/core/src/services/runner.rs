use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::backends::{NamingBackend, SnapshotBackend};
use crate::config::{load_config, AutonameConfig};
use crate::db::{AuditDb, AuditRunRecord, RunStatus};
use crate::engine::{Autonamer, RunReport};
use crate::rename::RunStats;

/// Coordinator that runs the naming pass against a backend and records the
/// audit trail.
#[derive(Debug, Clone, Default)]
pub struct AutonameRunner {
    pub config: AutonameConfig,
}

impl AutonameRunner {
    pub fn new(config: AutonameConfig) -> Self {
        Self { config }
    }

    /// Build a runner from a JSON/YAML config file.
    pub fn from_config_file(path: &Path) -> Result<Self> {
        let config = load_config(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?;
        Ok(Self::new(config))
    }

    pub fn with_audit_db(mut self, path: impl AsRef<Path>) -> Self {
        self.config.audit_db = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Run against a snapshot file and write the renamed project back.
    ///
    /// The snapshot is saved even when the run aborts, since renames
    /// committed before the failure are not rolled back.
    pub fn run_snapshot(&self, path: &Path) -> Result<RunReport> {
        let project_hash = sha256_file(path)?;
        let mut backend = SnapshotBackend::load(path)
            .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
        let project = backend
            .snapshot()
            .label
            .clone()
            .or_else(|| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .unwrap_or_else(|| "unnamed-project".to_string());

        let outcome = self.run_backend(&mut backend, &project, Some(project_hash));

        backend
            .save(path)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        outcome
    }

    /// Run against any backend; persists the audit trail when configured.
    ///
    /// With an audit database the run is recorded as `running` before any
    /// rename, then finalized with its status and rename trail.
    pub fn run_backend(
        &self,
        backend: &mut dyn NamingBackend,
        project: &str,
        project_hash: Option<String>,
    ) -> Result<RunReport> {
        let started_at = Utc::now().to_rfc3339();
        let backend_label = backend.label().to_string();
        let mut autonamer = Autonamer::new(backend, self.config.clone())?;

        let mut audit = match self.audit_db_path() {
            Some(db_path) => {
                let record = AuditRunRecord {
                    project: project.to_string(),
                    project_hash,
                    backend: backend_label,
                    strategy: self.config.strategy.as_str().to_string(),
                    status: RunStatus::Running,
                    renames: 0,
                    started_at: started_at.clone(),
                    finished_at: started_at,
                };
                Some(start_audit(&db_path, &record)?)
            }
            None => None,
        };

        let result = autonamer.run();
        let stats = autonamer.stats().clone();

        if let Some((db, run_id)) = audit.as_mut() {
            let status = if result.is_ok() { RunStatus::Succeeded } else { RunStatus::Failed };
            let finished_at = Utc::now().to_rfc3339();
            let persisted = finish_audit(db, *run_id, status, &stats, &finished_at);
            match (&result, persisted) {
                (_, Ok(())) => info!("Recorded audit trail as run {run_id}"),
                // Keep the run's own error; the audit failure is secondary.
                (Err(_), Err(e)) => warn!("Failed to record audit trail: {e:#}"),
                (Ok(_), Err(e)) => return Err(e),
            }
        }

        Ok(result?)
    }

    fn audit_db_path(&self) -> Option<PathBuf> {
        self.config.audit_db.as_ref().map(PathBuf::from)
    }
}

fn start_audit(path: &Path, record: &AuditRunRecord) -> Result<(AuditDb, i64)> {
    let db = AuditDb::open(path)
        .with_context(|| format!("Failed to open audit database at {}", path.display()))?;
    let run_id = db.insert_run(record).context("Failed to insert run record")?;
    Ok((db, run_id))
}

fn finish_audit(
    db: &mut AuditDb,
    run_id: i64,
    status: RunStatus,
    stats: &RunStats,
    finished_at: &str,
) -> Result<()> {
    db.insert_renames(run_id, &stats.audit).context("Failed to insert audit trail")?;
    db.update_run_status(run_id, status, stats.renames as u64, finished_at)
        .context("Failed to update run status")?;
    Ok(())
}

/// Compute the SHA-256 hash of a file and return it as a hex string.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open snapshot for hashing: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("Failed to read snapshot for hashing: {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let digest = hasher.finalize();
    Ok(format!("{:x}", digest))
}
