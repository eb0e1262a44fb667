use autoname_core::backends::{NamingBackend, ProjectSnapshot, SetNameFlags, SnapshotBackend};
use autoname_core::model::{FunctionBounds, Node, RefKind, SegmentClass, StringEncoding};
use tempfile::tempdir;

fn sample() -> ProjectSnapshot {
    ProjectSnapshot::new()
        .with_label("sample.bin")
        .segment(".text", 0x401000, 0x402000, SegmentClass::Code)
        .segment(".data", 0x8000, 0x8100, SegmentClass::Data)
        .function(0x401000, 0x401040, "sub_401000")
        .data(0x8000, "dword_8000")
        .data(0x8010, "g_counter")
        .string(0x8020, Some("hello"), Some("aHello"))
        .xref(0x401008, 0x8010, RefKind::Write)
        .xref(0x401010, 0x8020, RefKind::Read)
}

#[test]
fn function_lookup_respects_exclusive_end() {
    let backend = SnapshotBackend::new(sample());
    let bounds = FunctionBounds { start: 0x401000, end: 0x401040 };
    assert_eq!(backend.function_containing(0x401000).unwrap(), Some(bounds));
    assert_eq!(backend.function_containing(0x40103f).unwrap(), Some(bounds));
    assert_eq!(backend.function_containing(0x401040).unwrap(), None);
    assert_eq!(backend.function_containing(0x400fff).unwrap(), None);
}

#[test]
fn heads_are_limited_to_the_segment() {
    let backend = SnapshotBackend::new(sample());
    let segments = backend.segments().unwrap();
    let data = segments.iter().find(|s| s.name == ".data").unwrap();
    assert_eq!(backend.heads(data).unwrap(), vec![0x8000, 0x8010, 0x8020]);
    let text = segments.iter().find(|s| s.name == ".text").unwrap();
    assert_eq!(backend.heads(text).unwrap(), vec![0x401000]);
}

#[test]
fn function_items_fall_back_to_reference_sources() {
    let backend = SnapshotBackend::new(sample());
    assert_eq!(backend.function_items(0x401000).unwrap(), vec![0x401000, 0x401008, 0x401010]);
    assert!(backend.function_items(0x999).unwrap().is_empty());
}

#[test]
fn set_name_refuses_names_held_elsewhere() {
    let mut backend = SnapshotBackend::new(sample());
    assert!(!backend.set_name(0x8000, "g_counter", SetNameFlags::UNATTENDED).unwrap());
    assert!(backend.set_name(0x8010, "g_counter", SetNameFlags::UNATTENDED).unwrap());
    assert!(backend.set_name(0x8000, "z_counter", SetNameFlags::UNATTENDED).unwrap());
    // the old name is free again
    assert!(backend.set_name(0x401000, "dword_8000", SetNameFlags::UNATTENDED).unwrap());
    assert!(!backend.set_name(0x8000, "", SetNameFlags::UNATTENDED).unwrap());
}

#[test]
fn duplicate_names_stay_reserved_while_any_holder_keeps_them() {
    let snapshot = ProjectSnapshot::new()
        .segment(".data", 0x10, 0x100, SegmentClass::Data)
        .data(0x10, "foo")
        .data(0x20, "foo")
        .data(0x30, "dword_30");
    let mut backend = SnapshotBackend::new(snapshot);

    assert!(backend.set_name(0x20, "bar", SetNameFlags::UNATTENDED).unwrap());
    assert!(!backend.set_name(0x30, "foo", SetNameFlags::UNATTENDED).unwrap());
    assert_eq!(backend.name_of(0x30), Some("dword_30"));

    // a holder re-asserting its own name is fine
    assert!(backend.set_name(0x10, "foo", SetNameFlags::UNATTENDED).unwrap());
    assert!(backend.set_name(0x10, "baz", SetNameFlags::UNATTENDED).unwrap());
    assert!(backend.set_name(0x30, "foo", SetNameFlags::UNATTENDED).unwrap());
}

#[test]
fn checked_set_name_rejects_whitespace() {
    let mut backend = SnapshotBackend::new(sample());
    assert!(!backend.set_name(0x8000, "bad name", SetNameFlags::default()).unwrap());
    assert!(backend.set_name(0x8000, "bad name", SetNameFlags::UNATTENDED).unwrap());
}

#[test]
fn node_resolution_snaps_to_function_bounds() {
    let backend = SnapshotBackend::new(sample());

    let func = Node::resolve(&backend, 0x401010).unwrap();
    assert!(func.is_function);
    assert_eq!((func.addr, func.end_addr), (0x401000, 0x401040));
    assert_eq!(func.name, "sub_401000");
    assert!(!func.is_named());
    assert_eq!(func.to_string(), "sub_401000()");

    let data = Node::resolve(&backend, 0x8010).unwrap();
    assert!(!data.is_function);
    assert_eq!(data.end_addr, 0x8014);
    assert!(data.is_named());
    assert_eq!(data.to_string(), "g_counter@");
}

#[test]
fn broken_function_bounds_are_reported() {
    let mut snapshot = sample();
    snapshot.functions[0].end = snapshot.functions[0].start;
    let backend = SnapshotBackend::new(snapshot);
    assert!(Node::resolve(&backend, 0x401000).is_err());
}

#[test]
fn strings_filter_by_encoding() {
    let backend = SnapshotBackend::new(sample());
    assert_eq!(backend.strings(StringEncoding::C).unwrap().len(), 1);
    assert!(backend.strings(StringEncoding::Utf16).unwrap().is_empty());
    assert_eq!(backend.xrefs_to(0x8020).unwrap()[0].from, 0x401010);
}

#[test]
fn snapshot_saves_and_reloads_in_json_and_yaml() {
    let dir = tempdir().expect("tempdir");
    for file in ["project.json", "project.yaml"] {
        let path = dir.path().join(file);
        let mut backend = SnapshotBackend::new(sample());
        backend.set_name(0x8000, "z_counter", SetNameFlags::UNATTENDED).unwrap();
        backend.save(&path).expect("save");

        let reloaded = SnapshotBackend::load(&path).expect("load");
        assert_eq!(reloaded.name_of(0x8000), Some("z_counter"));
        assert_eq!(reloaded.label(), "sample.bin");
        assert_eq!(reloaded.snapshot(), backend.snapshot());
    }
}

#[test]
fn unknown_snapshot_extension_is_an_error() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("project.toml");
    std::fs::write(&path, "").unwrap();
    assert!(SnapshotBackend::load(&path).is_err());
}
