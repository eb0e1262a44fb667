//! Run-scoped cache of qualifying references.
//!
//! A node's qualifying references are the targets of every outward reference
//! originating inside the node (every item of a function, or the single
//! address of a data object) that land outside the node's own range.
//! Bounds and references do not change during a run, so each set is queried
//! from the backend once and shared by every later lookup.

use std::collections::{BTreeMap, BTreeSet};

use crate::backends::{BackendResult, NamingBackend};
use crate::model::{Address, Node, RefKind};

#[derive(Debug, Default)]
pub struct ReferenceGraph {
    refs: BTreeMap<Address, BTreeSet<Address>>,
    ignore_flow: bool,
}

impl ReferenceGraph {
    pub fn new(ignore_flow: bool) -> Self {
        Self { refs: BTreeMap::new(), ignore_flow }
    }

    /// Qualifying references of `node`, computed on first use.
    pub fn qualifying_refs(
        &mut self,
        backend: &dyn NamingBackend,
        node: &Node,
    ) -> BackendResult<&BTreeSet<Address>> {
        if !self.refs.contains_key(&node.addr) {
            let computed = self.compute(backend, node)?;
            self.refs.insert(node.addr, computed);
        }
        Ok(&self.refs[&node.addr])
    }

    /// The single qualifying reference of `node`, if it has exactly one.
    pub fn sole_ref(
        &mut self,
        backend: &dyn NamingBackend,
        node: &Node,
    ) -> BackendResult<Option<Address>> {
        let refs = self.qualifying_refs(backend, node)?;
        if refs.len() == 1 {
            Ok(refs.iter().next().copied())
        } else {
            Ok(None)
        }
    }

    /// Number of nodes whose references have been materialized.
    pub fn cached_nodes(&self) -> usize {
        self.refs.len()
    }

    fn compute(
        &self,
        backend: &dyn NamingBackend,
        node: &Node,
    ) -> BackendResult<BTreeSet<Address>> {
        let sources = if node.is_function {
            backend.function_items(node.addr)?
        } else {
            vec![node.addr]
        };

        let mut out = BTreeSet::new();
        for from in sources {
            for xref in backend.xrefs_from(from)? {
                if self.ignore_flow && xref.kind == RefKind::Flow {
                    continue;
                }
                if !node.owns(xref.to) {
                    out.insert(xref.to);
                }
            }
        }
        Ok(out)
    }
}
