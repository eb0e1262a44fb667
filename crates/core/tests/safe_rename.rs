use autoname_core::backends::{NamingBackend, ProjectSnapshot, SnapshotBackend};
use autoname_core::rename::{
    FnUniquifier, HashSuffix, NumericSuffix, RenameOutcome, RenamePhase, RunStats, SafeRenamer,
    Uniquifier,
};
use autoname_core::AutonameError;

fn backend_with(names: &[(u64, &str)]) -> SnapshotBackend {
    let snapshot = names
        .iter()
        .fold(ProjectSnapshot::new(), |snapshot, (addr, name)| snapshot.data(*addr, *name));
    SnapshotBackend::new(snapshot)
}

#[test]
fn renames_to_bare_base_when_free() {
    let mut backend = backend_with(&[(0x10, "dword_10")]);
    let renamer = SafeRenamer::default();
    let mut stats = RunStats::default();

    let outcome = renamer
        .safe_name(&mut backend, &mut stats, 0x10, "z_config", "dword_10", RenamePhase::DataPass)
        .expect("rename");

    assert_eq!(outcome, RenameOutcome::Renamed { new_name: "z_config".into() });
    assert_eq!(backend.name_of(0x10), Some("z_config"));
    assert_eq!(stats.renames, 1);
    assert_eq!(stats.audit[0].old_name, "dword_10");
    assert_eq!(stats.audit[0].new_name, "z_config");
    assert_eq!(stats.audit[0].phase, RenamePhase::DataPass);
}

#[test]
fn no_op_when_old_name_already_starts_with_base() {
    let mut backend = backend_with(&[(0x10, "z_main_loop")]);
    let renamer = SafeRenamer::default();
    let mut stats = RunStats::default();

    let outcome = renamer
        .safe_name(&mut backend, &mut stats, 0x10, "z_main", "z_main_loop", RenamePhase::Markov)
        .expect("rename");
    assert_eq!(outcome, RenameOutcome::Unchanged);

    let outcome = renamer
        .safe_name(
            &mut backend,
            &mut stats,
            0x10,
            "z_main_loop",
            "z_main_loop",
            RenamePhase::Markov,
        )
        .expect("rename");
    assert_eq!(outcome, RenameOutcome::Unchanged);

    assert_eq!(stats.renames, 0);
    assert!(stats.audit.is_empty());
    assert_eq!(backend.name_of(0x10), Some("z_main_loop"));
}

#[test]
fn collisions_fall_through_numeric_suffixes_in_order() {
    let mut backend =
        backend_with(&[(0x10, "z_foo"), (0x20, "z_foo0"), (0x30, "dword_30"), (0x40, "dword_40")]);
    let renamer = SafeRenamer::default();
    let mut stats = RunStats::default();

    renamer
        .safe_name(&mut backend, &mut stats, 0x30, "z_foo", "dword_30", RenamePhase::DataPass)
        .expect("rename 0x30");
    renamer
        .safe_name(&mut backend, &mut stats, 0x40, "z_foo", "dword_40", RenamePhase::DataPass)
        .expect("rename 0x40");

    assert_eq!(backend.name_of(0x30), Some("z_foo1"));
    assert_eq!(backend.name_of(0x40), Some("z_foo2"));
    assert_eq!(stats.renames, 2);
}

#[test]
fn exhausting_candidates_is_fatal_and_records_nothing() {
    let mut backend = backend_with(&[
        (0x10, "z_foo"),
        (0x14, "z_foo0"),
        (0x18, "z_foo1"),
        (0x30, "dword_30"),
    ]);
    let renamer = SafeRenamer::new(Box::new(NumericSuffix { max_suffixes: 2 }));
    let mut stats = RunStats::default();

    let err = renamer
        .safe_name(&mut backend, &mut stats, 0x30, "z_foo", "dword_30", RenamePhase::DataPass)
        .expect_err("exhausted");
    match err {
        AutonameError::RenameCollisionExhausted { address, base, last_attempt, .. } => {
            assert_eq!(address, 0x30);
            assert_eq!(base, "z_foo");
            assert_eq!(last_attempt, "z_foo1");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(stats.renames, 0);
    assert_eq!(backend.name_of(0x30), Some("dword_30"));
}

#[test]
fn default_numeric_suffix_tries_ten_thousand_and_one_names() {
    let suffix = NumericSuffix::default();
    assert_eq!(suffix.candidate("z_a", 0).as_deref(), Some("z_a"));
    assert_eq!(suffix.candidate("z_a", 1).as_deref(), Some("z_a0"));
    assert_eq!(suffix.candidate("z_a", 10_000).as_deref(), Some("z_a9999"));
    assert_eq!(suffix.candidate("z_a", 10_001), None);
}

#[test]
fn hash_suffix_is_deterministic_and_distinct() {
    let suffix = HashSuffix::default();
    assert_eq!(suffix.candidate("z_a", 0).as_deref(), Some("z_a"));
    let first = suffix.candidate("z_a", 1).expect("first");
    let second = suffix.candidate("z_a", 2).expect("second");
    assert!(first.starts_with("z_a_"));
    assert_eq!(first.len(), "z_a_".len() + 8);
    assert_ne!(first, second);
    assert_eq!(suffix.candidate("z_a", 1).as_deref(), Some(first.as_str()));
}

#[test]
fn caller_supplied_uniquifier_is_used() {
    let mut backend = backend_with(&[(0x10, "z_foo"), (0x20, "dword_20")]);
    let renamer = SafeRenamer::new(Box::new(FnUniquifier(|base: &str, attempt: usize| {
        match attempt {
            0 => Some(base.to_string()),
            1 => Some(format!("{base}_dup")),
            _ => None,
        }
    })));
    let mut stats = RunStats::default();

    renamer
        .safe_name(&mut backend, &mut stats, 0x20, "z_foo", "dword_20", RenamePhase::DataPass)
        .expect("rename");
    assert_eq!(backend.name_of(0x20), Some("z_foo_dup"));
    assert_eq!(backend.name_at(0x20).unwrap().as_deref(), Some("z_foo_dup"));
}

#[test]
fn stats_absorb_keeps_audit_order() {
    let mut backend = backend_with(&[(0x10, "dword_10"), (0x20, "dword_20")]);
    let renamer = SafeRenamer::default();

    let mut first = RunStats::default();
    renamer
        .safe_name(&mut backend, &mut first, 0x10, "z_a", "dword_10", RenamePhase::DataPass)
        .unwrap();
    let mut second = RunStats::default();
    renamer
        .safe_name(&mut backend, &mut second, 0x20, "z_b", "dword_20", RenamePhase::FunctionPass)
        .unwrap();

    let mut total = RunStats::default();
    total.absorb(first);
    total.absorb(second);
    assert_eq!(total.renames, 2);
    let names: Vec<&str> = total.audit.iter().map(|r| r.new_name.as_str()).collect();
    assert_eq!(names, vec!["z_a", "z_b"]);
}
