use std::path::Path;

use tempfile::tempdir;

use autoname_core::backends::{ProjectSnapshot, SnapshotBackend};
use autoname_core::db::{AuditDb, RunStatus};
use autoname_core::model::{RefKind, SegmentClass};
use autoname_core::rename::RenamePhase;
use autoname_core::services::{sha256_file, AutonameRunner};
use autoname_core::{AutonameConfig, AutonameError};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn write_usage_project(path: &Path) {
    ProjectSnapshot::new()
        .segment(".text", 0x401000, 0x403000, SegmentClass::Code)
        .segment(".rodata", 0x8000, 0x8100, SegmentClass::Const)
        .function(0x401000, 0x401020, "sub_401000")
        .function(0x402000, 0x402010, "sub_402000")
        .string(0x8000, Some("usage: tool"), Some("aUsageTool"))
        .xref(0x401004, 0x8000, RefKind::Read)
        .xref(0x402004, 0x401000, RefKind::Call)
        .save(path)
        .expect("write snapshot");
}

#[test]
fn run_snapshot_rewrites_names_and_records_audit() {
    init_tracing();
    let dir = tempdir().expect("tempdir");
    let project = dir.path().join("project.json");
    let audit = dir.path().join("audit.db");
    write_usage_project(&project);
    let original_hash = sha256_file(&project).expect("hash");

    let runner = AutonameRunner::new(AutonameConfig::default()).with_audit_db(&audit);
    let report = runner.run_snapshot(&project).expect("run");
    assert_eq!(report.stats.renames, 3);
    assert!(report.converged);

    let renamed = SnapshotBackend::load(&project).expect("reload");
    assert_eq!(renamed.name_of(0x8000), Some("z_usage_tool"));
    assert_eq!(renamed.name_of(0x401000), Some("z_usage_tool0"));
    assert_eq!(renamed.name_of(0x402000), Some("z_usage_tool00"));

    let db = AuditDb::open(&audit).expect("open audit");
    let runs = db.list_runs(None).expect("list runs");
    assert_eq!(runs.len(), 1);
    let (run_id, record) = &runs[0];
    assert_eq!(record.project, "project");
    assert_eq!(record.project_hash.as_deref(), Some(original_hash.as_str()));
    assert_eq!(record.backend, "snapshot");
    assert_eq!(record.strategy, "direct");
    assert_eq!(record.status, RunStatus::Succeeded);
    assert_eq!(record.renames, 3);

    let trail = db.load_renames(*run_id).expect("load renames");
    assert_eq!(trail, report.stats.audit);
    let phases: Vec<RenamePhase> = trail.iter().map(|r| r.phase).collect();
    assert_eq!(
        phases,
        vec![RenamePhase::StringLiteral, RenamePhase::StringAnchor, RenamePhase::FunctionPass]
    );

    // A second run over the renamed project has nothing left to do.
    let report = runner.run_snapshot(&project).expect("second run");
    assert_eq!(report.stats.renames, 0);
    assert_eq!(db.list_runs(Some("project")).expect("list runs").len(), 2);
}

#[test]
fn unusable_audit_db_stops_the_run_before_renaming() {
    let dir = tempdir().expect("tempdir");
    let project = dir.path().join("project.json");
    write_usage_project(&project);

    // a directory cannot be opened as a database
    let runner = AutonameRunner::new(AutonameConfig::default()).with_audit_db(dir.path());
    assert!(runner.run_snapshot(&project).is_err());

    let untouched = SnapshotBackend::load(&project).expect("reload");
    assert_eq!(untouched.name_of(0x8000), Some("aUsageTool"));
    assert_eq!(untouched.name_of(0x401000), Some("sub_401000"));
}

#[test]
fn aborted_run_keeps_committed_renames() {
    init_tracing();
    let dir = tempdir().expect("tempdir");
    let project = dir.path().join("collide.yaml");
    let audit = dir.path().join("audit.db");
    ProjectSnapshot::new()
        .with_label("collide")
        .segment(".rodata", 0x8000, 0x8100, SegmentClass::Const)
        .segment(".data", 0x9000, 0x9400, SegmentClass::Data)
        .string(0x8000, Some("Hello"), Some("aHello"))
        .data(0x9000, "dword_9000")
        .data(0x9100, "g_x")
        .data(0x9200, "z_g_x")
        .data(0x9204, "z_g_x0")
        .xref(0x9000, 0x9100, RefKind::Offset)
        .save(&project)
        .expect("write snapshot");

    let mut config = AutonameConfig::default();
    config.uniquifier.max_attempts = 1;
    let runner = AutonameRunner::new(config).with_audit_db(&audit);

    let err = runner.run_snapshot(&project).expect_err("collision");
    match err.downcast_ref::<AutonameError>() {
        Some(AutonameError::RenameCollisionExhausted { address, base, last_attempt, .. }) => {
            assert_eq!(*address, 0x9000);
            assert_eq!(base, "z_g_x");
            assert_eq!(last_attempt, "z_g_x0");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let saved = SnapshotBackend::load(&project).expect("reload");
    assert_eq!(saved.name_of(0x8000), Some("z_Hello"));
    assert_eq!(saved.name_of(0x9000), Some("dword_9000"));

    let db = AuditDb::open(&audit).expect("open audit");
    let runs = db.list_runs(Some("collide")).expect("list runs");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].1.status, RunStatus::Failed);
    assert_eq!(runs[0].1.renames, 1);
    assert_eq!(db.load_renames(runs[0].0).expect("load renames").len(), 1);
}

#[test]
fn runner_reads_config_files() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("autoname.yaml");
    std::fs::write(&path, "strategy: markov\ncutoff: 0.75\n").expect("write config");
    let runner = AutonameRunner::from_config_file(&path).expect("runner");
    assert_eq!(runner.config.cutoff, 0.75);

    std::fs::write(&path, "cutoff: 2.0\n").expect("write config");
    assert!(AutonameRunner::from_config_file(&path).is_err());
}
