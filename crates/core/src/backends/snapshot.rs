use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backends::{BackendError, BackendResult, NamingBackend, SetNameFlags};
use crate::model::{
    Address, FunctionBounds, RefKind, Segment, SegmentClass, StringEncoding, StringEntry, XRef,
};

/// Function as stored in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub start: Address,
    pub end: Address,
    /// Instruction addresses. When empty, every reference source inside the
    /// bounds (plus the start) is treated as an item.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Address>,
}

/// String literal as stored in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringRecord {
    pub address: Address,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub encoding: StringEncoding,
}

/// Serializable state of an analyzed project.
///
/// Lives as JSON or YAML on disk; `SnapshotBackend` mutates names in memory
/// and `save` writes the result back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub functions: Vec<FunctionRecord>,
    #[serde(default)]
    pub data_heads: Vec<Address>,
    #[serde(default)]
    pub names: BTreeMap<Address, String>,
    /// Raw name -> demangled name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub demangled: BTreeMap<String, String>,
    #[serde(default)]
    pub xrefs: Vec<XRef>,
    #[serde(default)]
    pub strings: Vec<StringRecord>,
}

impl ProjectSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn segment(
        mut self,
        name: impl Into<String>,
        start: Address,
        end: Address,
        class: SegmentClass,
    ) -> Self {
        self.segments.push(Segment { name: name.into(), start, end, class });
        self
    }

    pub fn function(mut self, start: Address, end: Address, name: impl Into<String>) -> Self {
        self.functions.push(FunctionRecord { start, end, items: Vec::new() });
        self.names.insert(start, name.into());
        self
    }

    pub fn data(mut self, addr: Address, name: impl Into<String>) -> Self {
        self.data_heads.push(addr);
        self.names.insert(addr, name.into());
        self
    }

    pub fn xref(mut self, from: Address, to: Address, kind: RefKind) -> Self {
        self.xrefs.push(XRef { from, to, kind });
        self
    }

    /// Add a C string literal. `name` is the backend's label for it, if any.
    pub fn string(mut self, addr: Address, text: Option<&str>, name: Option<&str>) -> Self {
        self.strings.push(StringRecord {
            address: addr,
            text: text.map(str::to_string),
            encoding: StringEncoding::C,
        });
        if let Some(name) = name {
            self.names.insert(addr, name.to_string());
        }
        self
    }

    pub fn demangle(mut self, raw: impl Into<String>, pretty: impl Into<String>) -> Self {
        self.demangled.insert(raw.into(), pretty.into());
        self
    }

    /// Load a snapshot from `.json`, `.yaml` or `.yml`.
    pub fn load(path: &Path) -> BackendResult<Self> {
        let body = fs::read_to_string(path)?;
        match snapshot_format(path)? {
            SnapshotFormat::Json => serde_json::from_str(&body)
                .map_err(|e| BackendError::Format(format!("{}: {e}", path.display()))),
            SnapshotFormat::Yaml => serde_yaml::from_str(&body)
                .map_err(|e| BackendError::Format(format!("{}: {e}", path.display()))),
        }
    }

    /// Write the snapshot back in the format implied by `path`.
    pub fn save(&self, path: &Path) -> BackendResult<()> {
        let body = match snapshot_format(path)? {
            SnapshotFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| BackendError::Format(e.to_string()))?,
            SnapshotFormat::Yaml => {
                serde_yaml::to_string(self).map_err(|e| BackendError::Format(e.to_string()))?
            }
        };
        fs::write(path, body)?;
        Ok(())
    }
}

enum SnapshotFormat {
    Json,
    Yaml,
}

fn snapshot_format(path: &Path) -> BackendResult<SnapshotFormat> {
    match path.extension().and_then(|e| e.to_str()).unwrap_or_default() {
        "json" => Ok(SnapshotFormat::Json),
        "yaml" | "yml" => Ok(SnapshotFormat::Yaml),
        other => Err(BackendError::Format(format!(
            "unsupported snapshot extension '{other}' for {}",
            path.display()
        ))),
    }
}

/// In-memory backend over a `ProjectSnapshot`.
#[derive(Debug, Clone)]
pub struct SnapshotBackend {
    snapshot: ProjectSnapshot,
    functions: BTreeMap<Address, FunctionRecord>,
    refs_from: BTreeMap<Address, Vec<XRef>>,
    refs_to: BTreeMap<Address, Vec<XRef>>,
    /// Name -> every address holding it; snapshots may carry duplicates.
    owners: HashMap<String, BTreeSet<Address>>,
}

impl SnapshotBackend {
    pub fn new(snapshot: ProjectSnapshot) -> Self {
        let functions = snapshot.functions.iter().map(|f| (f.start, f.clone())).collect();

        let mut refs_from: BTreeMap<Address, Vec<XRef>> = BTreeMap::new();
        let mut refs_to: BTreeMap<Address, Vec<XRef>> = BTreeMap::new();
        for xref in &snapshot.xrefs {
            refs_from.entry(xref.from).or_default().push(*xref);
            refs_to.entry(xref.to).or_default().push(*xref);
        }

        let mut owners: HashMap<String, BTreeSet<Address>> = HashMap::new();
        for (addr, name) in &snapshot.names {
            owners.entry(name.clone()).or_default().insert(*addr);
        }

        Self { snapshot, functions, refs_from, refs_to, owners }
    }

    pub fn load(path: &Path) -> BackendResult<Self> {
        Ok(Self::new(ProjectSnapshot::load(path)?))
    }

    pub fn save(&self, path: &Path) -> BackendResult<()> {
        self.snapshot.save(path)
    }

    pub fn snapshot(&self) -> &ProjectSnapshot {
        &self.snapshot
    }

    pub fn into_snapshot(self) -> ProjectSnapshot {
        self.snapshot
    }

    /// Convenience accessor for tests and reports.
    pub fn name_of(&self, addr: Address) -> Option<&str> {
        self.snapshot.names.get(&addr).map(String::as_str)
    }
}

impl NamingBackend for SnapshotBackend {
    fn label(&self) -> &str {
        self.snapshot.label.as_deref().unwrap_or("snapshot")
    }

    fn segments(&self) -> BackendResult<Vec<Segment>> {
        let mut segments = self.snapshot.segments.clone();
        segments.sort_by_key(|s| s.start);
        Ok(segments)
    }

    fn heads(&self, segment: &Segment) -> BackendResult<Vec<Address>> {
        if !self.snapshot.segments.iter().any(|s| s == segment) {
            return Err(BackendError::UnknownSegment(segment.name.clone()));
        }
        let mut heads = BTreeSet::new();
        heads.extend(self.snapshot.data_heads.iter().copied());
        heads.extend(self.snapshot.strings.iter().map(|s| s.address));
        for func in self.functions.values() {
            heads.insert(func.start);
            heads.extend(func.items.iter().copied());
        }
        Ok(heads.into_iter().filter(|a| segment.contains(*a)).collect())
    }

    fn functions(&self) -> BackendResult<Vec<Address>> {
        Ok(self.functions.keys().copied().collect())
    }

    fn function_containing(&self, addr: Address) -> BackendResult<Option<FunctionBounds>> {
        Ok(self
            .functions
            .range(..=addr)
            .next_back()
            .filter(|(_, f)| addr < f.end)
            .map(|(_, f)| FunctionBounds { start: f.start, end: f.end }))
    }

    fn function_items(&self, start: Address) -> BackendResult<Vec<Address>> {
        let Some(func) = self.functions.get(&start) else {
            return Ok(Vec::new());
        };
        if !func.items.is_empty() {
            let mut items = func.items.clone();
            items.sort_unstable();
            items.dedup();
            return Ok(items);
        }
        let mut items: BTreeSet<Address> =
            self.refs_from.range(func.start..func.end).map(|(from, _)| *from).collect();
        items.insert(func.start);
        Ok(items.into_iter().collect())
    }

    fn name_at(&self, addr: Address) -> BackendResult<Option<String>> {
        Ok(self.snapshot.names.get(&addr).cloned())
    }

    fn demangle(&self, name: &str) -> BackendResult<Option<String>> {
        Ok(self.snapshot.demangled.get(name).cloned())
    }

    fn set_name(&mut self, addr: Address, name: &str, flags: SetNameFlags) -> BackendResult<bool> {
        if name.is_empty() {
            return Ok(false);
        }
        if !flags.no_check && name.chars().any(char::is_whitespace) {
            return Ok(false);
        }
        if self.snapshot.names.get(&addr).map(String::as_str) == Some(name) {
            return Ok(true);
        }
        if self.owners.get(name).is_some_and(|holders| !holders.is_empty()) {
            return Ok(false);
        }

        if let Some(previous) = self.snapshot.names.insert(addr, name.to_string()) {
            if let Some(holders) = self.owners.get_mut(&previous) {
                holders.remove(&addr);
                if holders.is_empty() {
                    self.owners.remove(&previous);
                }
            }
        }
        self.owners.entry(name.to_string()).or_default().insert(addr);
        Ok(true)
    }

    fn xrefs_from(&self, addr: Address) -> BackendResult<Vec<XRef>> {
        Ok(self.refs_from.get(&addr).cloned().unwrap_or_default())
    }

    fn xrefs_to(&self, addr: Address) -> BackendResult<Vec<XRef>> {
        Ok(self.refs_to.get(&addr).cloned().unwrap_or_default())
    }

    fn strings(&self, encoding: StringEncoding) -> BackendResult<Vec<StringEntry>> {
        let mut out: Vec<StringEntry> = self
            .snapshot
            .strings
            .iter()
            .filter(|s| s.encoding == encoding)
            .map(|s| StringEntry { address: s.address, text: s.text.clone() })
            .collect();
        out.sort_by_key(|s| s.address);
        Ok(out)
    }
}
