//! Collaborator contracts: pattern matching, the block-equivalence oracle,
//! debug info, and the orchestrator.

use rustc_hash::FxHashMap;
use semdiff_ir::{BlockId, Function, InstId, SourceLoc};

use crate::report::Verdict;

/// A matched multi-instruction equivalence region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternMatch {
    /// Instructions consumed on the left side, starting at the cursor.
    pub left_span: usize,
    /// Instructions consumed on the right side, starting at the cursor.
    pub right_span: usize,
    /// Value pairs to synchronize at once for the whole region.
    pub value_pairs: Vec<(InstId, InstId)>,
}

/// Pre-registered multi-instruction equivalence templates.
pub trait PatternMatcher: Sync {
    /// Try to match a registered pattern at the given cursors.
    fn try_match(
        &self,
        left: &Function,
        left_block: BlockId,
        left_pos: usize,
        right: &Function,
        right_block: BlockId,
        right_pos: usize,
    ) -> Option<PatternMatch>;
}

/// Pattern matcher with no registered patterns.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPatterns;

impl PatternMatcher for NoPatterns {
    fn try_match(
        &self,
        _left: &Function,
        _left_block: BlockId,
        _left_pos: usize,
        _right: &Function,
        _right_block: BlockId,
        _right_pos: usize,
    ) -> Option<PatternMatch> {
        None
    }
}

/// External decision procedure for block-level equivalence, consulted when
/// syntactic heuristics are inconclusive.
pub trait EquivalenceOracle: Sync {
    /// Decide whether the block remainders starting at the given cursors
    /// are equivalent.
    fn blocks_equivalent(
        &self,
        left: &Function,
        left_block: BlockId,
        left_pos: usize,
        right: &Function,
        right_block: BlockId,
        right_pos: usize,
    ) -> bool;
}

/// Oracle that never decides equivalence.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOracle;

impl EquivalenceOracle for NoOracle {
    fn blocks_equivalent(
        &self,
        _left: &Function,
        _left_block: BlockId,
        _left_pos: usize,
        _right: &Function,
        _right_block: BlockId,
        _right_pos: usize,
    ) -> bool {
        false
    }
}

/// Maps instructions to source locations and enclosing macros.
pub trait DebugInfoProvider: Sync {
    /// Source location of an instruction.
    fn location_of(&self, func: &Function, inst: InstId) -> Option<SourceLoc>;

    /// Name of the macro the instruction was expanded from, if any.
    fn enclosing_macro(&self, func: &Function, inst: InstId) -> Option<String>;
}

/// Debug info read directly from instruction locations; knows no macros.
#[derive(Clone, Copy, Debug, Default)]
pub struct InstLocations;

impl DebugInfoProvider for InstLocations {
    fn location_of(&self, func: &Function, inst: InstId) -> Option<SourceLoc> {
        func.inst(inst).loc.clone()
    }

    fn enclosing_macro(&self, _func: &Function, _inst: InstId) -> Option<String> {
        None
    }
}

/// Debug info with a static macro table keyed by source location.
#[derive(Clone, Debug, Default)]
pub struct MacroTable {
    macros: FxHashMap<SourceLoc, String>,
}

impl MacroTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the given location lies inside a macro expansion.
    pub fn insert(&mut self, loc: SourceLoc, macro_name: &str) {
        self.macros.insert(loc, macro_name.to_string());
    }
}

impl DebugInfoProvider for MacroTable {
    fn location_of(&self, func: &Function, inst: InstId) -> Option<SourceLoc> {
        func.inst(inst).loc.clone()
    }

    fn enclosing_macro(&self, func: &Function, inst: InstId) -> Option<String> {
        let loc = func.inst(inst).loc.as_ref()?;
        self.macros.get(loc).cloned()
    }
}

/// Call-graph-level orchestration consulted when callee comparison recurses.
pub trait Orchestrator: Sync {
    /// Check whether a comparison of the named function is in flight.
    fn in_progress(&self, name: &str) -> bool;

    /// Previously computed verdict for the named function, if any.
    fn cached_verdict(&self, name: &str) -> Option<Verdict>;

    /// Mark a comparison as in flight. Returns false when already running.
    fn begin_comparison(&self, _name: &str) -> bool {
        true
    }

    /// Record a finished verdict and clear the in-flight marker.
    fn record_verdict(&self, _name: &str, _verdict: Verdict) {}
}

/// Orchestrator with no cache and no in-flight tracking; callee pairs are
/// then judged by name identity alone.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOrchestrator;

impl Orchestrator for NoOrchestrator {
    fn in_progress(&self, _name: &str) -> bool {
        false
    }

    fn cached_verdict(&self, _name: &str) -> Option<Verdict> {
        None
    }
}

/// The collaborator bundle handed to a comparator at construction time.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub patterns: &'a dyn PatternMatcher,
    pub oracle: &'a dyn EquivalenceOracle,
    pub debug_info: &'a dyn DebugInfoProvider,
    pub orchestrator: &'a dyn Orchestrator,
}

impl Default for Collaborators<'_> {
    fn default() -> Self {
        static PATTERNS: NoPatterns = NoPatterns;
        static ORACLE: NoOracle = NoOracle;
        static DEBUG_INFO: InstLocations = InstLocations;
        static ORCHESTRATOR: NoOrchestrator = NoOrchestrator;
        Self {
            patterns: &PATTERNS,
            oracle: &ORACLE,
            debug_info: &DEBUG_INFO,
            orchestrator: &ORCHESTRATOR,
        }
    }
}
