//! Fixed-point name propagation.
//!
//! A run optionally renames string literals, seeds function names from
//! string anchors, then propagates names with one of two strategies until a
//! pass commits no rename:
//! - `Direct`: an unnamed node with exactly one qualifying reference takes
//!   the name of that reference when it is named (data pass, then function
//!   pass).
//! - `Markov`: the transition model over all unnamed nodes is culled once;
//!   an unnamed source takes the name of its first named surviving
//!   destination.
//!
//! Renames are never reverted within a run, so every productive pass
//! shrinks the unnamed set and the loop terminates.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::anchors;
use crate::backends::NamingBackend;
use crate::config::{AutonameConfig, Strategy};
use crate::error::AutonameResult;
use crate::graph::ReferenceGraph;
use crate::markov::TransitionModel;
use crate::model::{Address, Node, SegmentClass};
use crate::naming::NamingRules;
use crate::rename::{RenamePhase, RunStats, SafeRenamer, Uniquifier};

/// Renames committed by one propagation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub index: usize,
    pub data_renames: usize,
    pub function_renames: usize,
}

impl PassSummary {
    pub fn renames(&self) -> usize {
        self.data_renames + self.function_renames
    }
}

/// Outcome of a naming run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub backend: String,
    pub strategy: Strategy,
    pub stats: RunStats,
    pub passes: Vec<PassSummary>,
    pub missing_strings: usize,
    pub anchor_candidates: usize,
    /// False when `max_passes` stopped propagation before a no-op pass.
    pub converged: bool,
}

impl RunReport {
    /// Passes that committed at least one rename.
    pub fn productive_passes(&self) -> usize {
        self.passes.iter().filter(|p| p.renames() > 0).count()
    }
}

/// Drives a single naming run against one backend.
pub struct Autonamer<'b> {
    backend: &'b mut dyn NamingBackend,
    config: AutonameConfig,
    rules: NamingRules,
    renamer: SafeRenamer,
    graph: ReferenceGraph,
    stats: RunStats,
    passes: Vec<PassSummary>,
    missing: BTreeSet<Address>,
    anchor_candidates: usize,
    converged: bool,
}

impl<'b> Autonamer<'b> {
    pub fn new(backend: &'b mut dyn NamingBackend, config: AutonameConfig) -> AutonameResult<Self> {
        config.validate()?;
        let rules = config.naming_rules()?;
        let renamer = SafeRenamer::new(config.uniquifier.build());
        let graph = ReferenceGraph::new(config.ignore_flow_refs);
        Ok(Self {
            backend,
            config,
            rules,
            renamer,
            graph,
            stats: RunStats::default(),
            passes: Vec::new(),
            missing: BTreeSet::new(),
            anchor_candidates: 0,
            converged: false,
        })
    }

    /// Replace the configured uniquifier.
    pub fn with_uniquifier(mut self, uniquifier: Box<dyn Uniquifier>) -> Self {
        self.renamer = SafeRenamer::new(uniquifier);
        self
    }

    pub fn config(&self) -> &AutonameConfig {
        &self.config
    }

    /// Renames committed so far, including those of a pass that failed.
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            backend: self.backend.label().to_string(),
            strategy: self.config.strategy,
            stats: self.stats.clone(),
            passes: self.passes.clone(),
            missing_strings: self.missing.len(),
            anchor_candidates: self.anchor_candidates,
            converged: self.converged,
        }
    }

    /// Full run: string literals, string anchors, then propagation.
    pub fn run(&mut self) -> AutonameResult<RunReport> {
        let result = self.run_phases();
        match &result {
            Ok(()) => info!("Done with a total of {} changes", self.stats.renames),
            Err(e) => error!("Run aborted after {} changes: {e}", self.stats.renames),
        }
        result.map(|()| self.report())
    }

    fn run_phases(&mut self) -> AutonameResult<()> {
        if self.config.rename_string_literals {
            self.string_literal_pass()?;
        }
        if self.config.anchor_strings {
            self.string_anchor_pass()?;
        }
        match self.config.strategy {
            Strategy::Direct => self.propagate_direct()?,
            Strategy::Markov => self.propagate_markov()?,
        };
        Ok(())
    }

    pub fn string_literal_pass(&mut self) -> AutonameResult<usize> {
        let mut pass = RunStats::default();
        let result = anchors::rename_string_literals(
            &mut *self.backend,
            &self.renamer,
            &self.rules,
            self.config.string_encoding,
            self.config.max_name_len,
            &mut pass,
        );
        let renames = pass.renames;
        self.stats.absorb(pass);
        self.missing.extend(result?);
        Ok(renames)
    }

    pub fn string_anchor_pass(&mut self) -> AutonameResult<usize> {
        let scan =
            anchors::resolve_candidates(&*self.backend, &self.rules, self.config.string_encoding)?;
        self.missing.extend(scan.missing.iter().copied());
        self.anchor_candidates = scan.candidates.len();

        let mut pass = RunStats::default();
        let result = anchors::apply_candidates(
            &mut *self.backend,
            &self.renamer,
            &self.rules,
            self.config.max_name_len,
            &scan.candidates,
            &mut pass,
        );
        let renames = pass.renames;
        self.stats.absorb(pass);
        result.map(|()| renames)
    }

    /// Direct strategy: repeat data and function passes to a fixed point.
    /// Returns the number of renames committed.
    pub fn propagate_direct(&mut self) -> AutonameResult<usize> {
        let mut total = 0;
        let mut index = 0;
        loop {
            index += 1;
            if self.pass_limit_reached(index) {
                return Ok(total);
            }

            let mut data = RunStats::default();
            let result = self.data_pass(&mut data);
            let data_renames = data.renames;
            self.stats.absorb(data);
            result?;

            let mut functions = RunStats::default();
            let result = self.function_pass(&mut functions);
            let function_renames = functions.renames;
            self.stats.absorb(functions);
            result?;

            let summary = PassSummary { index, data_renames, function_renames };
            info!("Pass {index} had {} changes", summary.renames());
            self.passes.push(summary);
            total += summary.renames();
            if summary.renames() == 0 {
                self.converged = true;
                return Ok(total);
            }
        }
    }

    /// Markov strategy: build and cull the model once, then repeat passes to
    /// a fixed point. Returns the number of renames committed.
    pub fn propagate_markov(&mut self) -> AutonameResult<usize> {
        let mut model = TransitionModel::build(&*self.backend, &mut self.graph)?;
        let culled = model.cull(self.config.cutoff);
        info!("Culling at {:.0}% dropped {culled} edges", self.config.cutoff * 100.0);

        let mut total = 0;
        let mut index = 0;
        loop {
            index += 1;
            if self.pass_limit_reached(index) {
                return Ok(total);
            }

            let mut pass = RunStats::default();
            let mut summary = PassSummary { index, ..PassSummary::default() };
            let result = self.markov_pass(&model, &mut pass, &mut summary);
            self.stats.absorb(pass);
            result?;

            info!("Pass {index}, {} changes", summary.renames());
            self.passes.push(summary);
            total += summary.renames();
            if summary.renames() == 0 {
                self.converged = true;
                return Ok(total);
            }
        }
    }

    fn pass_limit_reached(&self, index: usize) -> bool {
        match self.config.max_passes {
            Some(limit) if index > limit => {
                warn!("Stopping after {limit} passes without reaching a fixed point");
                true
            }
            _ => false,
        }
    }

    fn data_pass(&mut self, stats: &mut RunStats) -> AutonameResult<()> {
        debug!("Renaming data");
        for segment in self.backend.segments()? {
            if segment.class == SegmentClass::Code {
                continue;
            }
            for head in self.backend.heads(&segment)? {
                let node = Node::resolve(&*self.backend, head)?;
                if node.is_function || node.name.is_empty() || node.is_named() {
                    continue;
                }
                self.adopt_sole_reference(&node, stats, RenamePhase::DataPass)?;
            }
        }
        Ok(())
    }

    fn function_pass(&mut self, stats: &mut RunStats) -> AutonameResult<()> {
        debug!("Renaming functions");
        for start in self.backend.functions()? {
            let node = Node::resolve(&*self.backend, start)?;
            if node.is_named() {
                continue;
            }
            self.adopt_sole_reference(&node, stats, RenamePhase::FunctionPass)?;
        }
        Ok(())
    }

    /// Rename `node` after its single qualifying reference, when that
    /// reference is named. Returns whether a rename was committed.
    fn adopt_sole_reference(
        &mut self,
        node: &Node,
        stats: &mut RunStats,
        phase: RenamePhase,
    ) -> AutonameResult<bool> {
        let Some(target) = self.graph.sole_ref(&*self.backend, node)? else {
            debug!("{node}: not exactly one qualifying reference");
            return Ok(false);
        };
        let target = Node::resolve(&*self.backend, target)?;
        if !target.is_named() {
            return Ok(false);
        }
        let base = self.rules.propagated_name(&target.name);
        let outcome =
            self.renamer.safe_name(&mut *self.backend, stats, node.addr, &base, &node.name, phase)?;
        Ok(outcome.is_renamed())
    }

    fn markov_pass(
        &mut self,
        model: &TransitionModel,
        stats: &mut RunStats,
        summary: &mut PassSummary,
    ) -> AutonameResult<()> {
        for (source, state) in model.states() {
            let node = Node::resolve(&*self.backend, source)?;
            if node.is_named() {
                continue;
            }
            for dest in state.destinations() {
                let target = Node::resolve(&*self.backend, dest)?;
                if !target.is_named() {
                    continue;
                }
                let base = self.rules.propagated_name(&target.name);
                let outcome = self.renamer.safe_name(
                    &mut *self.backend,
                    stats,
                    node.addr,
                    &base,
                    &node.name,
                    RenamePhase::Markov,
                )?;
                if outcome.is_renamed() {
                    if node.is_function {
                        summary.function_renames += 1;
                    } else {
                        summary.data_renames += 1;
                    }
                }
                break;
            }
        }
        Ok(())
    }
}
