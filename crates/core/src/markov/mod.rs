//! Weighted reference graph over unnamed nodes.
//!
//! Each unnamed node contributes one transition per qualifying reference.
//! Weights are normalized per source; culling drops every destination that
//! does not carry at least `cutoff` of the source's references, leaving only
//! majority destinations as naming anchors.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::backends::{BackendResult, NamingBackend};
use crate::graph::ReferenceGraph;
use crate::model::{Address, Node, SegmentClass};

/// Default culling cutoff.
pub const DEFAULT_CUTOFF: f64 = 0.5;

/// Outgoing transitions of a single source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionState {
    edges: BTreeMap<Address, u64>,
    total_count: u64,
}

impl TransitionState {
    pub fn add_transition(&mut self, to: Address) {
        *self.edges.entry(to).or_insert(0) += 1;
        self.total_count += 1;
    }

    /// `edges[to] / total_count`; `None` with no transitions or unknown `to`.
    ///
    /// `total_count` is not reduced by culling, so surviving weights keep
    /// their pre-cull values.
    pub fn weight(&self, to: Address) -> Option<f64> {
        if self.total_count == 0 {
            return None;
        }
        self.edges.get(&to).map(|count| *count as f64 / self.total_count as f64)
    }

    pub fn edges(&self) -> &BTreeMap<Address, u64> {
        &self.edges
    }

    /// Destinations, ascending.
    pub fn destinations(&self) -> impl Iterator<Item = Address> + '_ {
        self.edges.keys().copied()
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    fn cull(&mut self, cutoff: f64) -> usize {
        let total = self.total_count;
        if total == 0 {
            return 0;
        }
        let before = self.edges.len();
        self.edges.retain(|_, count| *count as f64 / total as f64 >= cutoff);
        before - self.edges.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransitionModel {
    states: BTreeMap<Address, TransitionState>,
}

impl TransitionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_transition(&mut self, from: Address, to: Address) {
        self.states.entry(from).or_default().add_transition(to);
    }

    pub fn weight(&self, from: Address, to: Address) -> Option<f64> {
        self.states.get(&from).and_then(|s| s.weight(to))
    }

    pub fn state(&self, from: Address) -> Option<&TransitionState> {
        self.states.get(&from)
    }

    /// Sources with their states, ascending by address.
    pub fn states(&self) -> impl Iterator<Item = (Address, &TransitionState)> + '_ {
        self.states.iter().map(|(addr, state)| (*addr, state))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Drop every edge whose weight is below `cutoff` (ties survive).
    /// Returns the number of edges removed.
    pub fn cull(&mut self, cutoff: f64) -> usize {
        self.states.values_mut().map(|s| s.cull(cutoff)).sum()
    }

    /// Build the model over every currently-unnamed data and function node.
    pub fn build(backend: &dyn NamingBackend, graph: &mut ReferenceGraph) -> BackendResult<Self> {
        let mut model = Self::new();

        info!("Building transition model for data");
        for segment in backend.segments()? {
            if segment.class == SegmentClass::Code {
                continue;
            }
            for head in backend.heads(&segment)? {
                let node = Node::resolve(backend, head)?;
                if node.is_function || node.name.is_empty() || node.is_named() {
                    continue;
                }
                for to in graph.qualifying_refs(backend, &node)? {
                    model.add_transition(node.addr, *to);
                }
            }
        }

        info!("Building transition model for functions");
        for start in backend.functions()? {
            let node = Node::resolve(backend, start)?;
            if node.is_named() {
                continue;
            }
            for to in graph.qualifying_refs(backend, &node)? {
                model.add_transition(node.addr, *to);
            }
        }

        debug!(sources = model.len(), "transition model built");
        Ok(model)
    }
}
