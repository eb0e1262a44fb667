use serde::{Deserialize, Serialize};

/// Final status of a naming run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Succeeded,
    /// Aborted by a fatal error; renames already committed were kept.
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "succeeded" => Ok(RunStatus::Succeeded),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status '{other}'")),
        }
    }
}

/// One naming run as stored in the audit database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditRunRecord {
    /// Project label (snapshot label or file name).
    pub project: String,
    /// SHA-256 of the project state the run started from.
    pub project_hash: Option<String>,
    pub backend: String,
    pub strategy: String,
    pub status: RunStatus,
    pub renames: u64,
    pub started_at: String,
    pub finished_at: String,
}
