//! Comparison outcomes and structured diagnostics.

use rustc_hash::FxHashSet;
use semdiff_ir::{BlockId, InstId, SourceLoc};

/// Final outcome of one function-pair comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Equal,
    NotEqual,
}

/// Tri-state result of one heuristic. `Defer` hands the pair to the next
/// heuristic in line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Equal,
    NotEqual,
    Defer,
}

impl Decision {
    /// Check for `Equal`.
    pub const fn is_equal(self) -> bool {
        matches!(self, Self::Equal)
    }
}

/// The first point at which the two functions diverged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DivergencePoint {
    /// Function signatures are incompatible.
    Signature,
    /// An instruction pair no heuristic reconciled. Either side may be
    /// absent when one block ran out of instructions.
    Insts {
        left: Option<InstId>,
        right: Option<InstId>,
    },
    /// Block terminators differ.
    Terminators { left: BlockId, right: BlockId },
}

/// Divergence record: written at most once per comparison.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DivergenceRecord {
    pub point: DivergencePoint,
    pub left_loc: Option<SourceLoc>,
    pub right_loc: Option<SourceLoc>,
}

/// Kind of a source-level explanation produced by the diagnosis layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticKind {
    AsmDiff,
    MacroDiff,
    TypeDiff,
}

/// A difference explained as a source-level artifact rather than a semantic
/// change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Name of the compared function the difference was found in.
    pub function: String,
    pub loc: Option<SourceLoc>,
    pub detail: String,
}

/// Comparison coverage counters. Monotonically non-decreasing over one
/// comparison; never used for correctness.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Coverage {
    /// Instructions compared on the left side.
    pub compared_left: u32,
    /// Instructions compared on the right side.
    pub compared_right: u32,
    /// Instruction pairs matched 1:1.
    pub matched: u32,
    /// (file, line) pairs touched on the left side.
    pub lines_left: FxHashSet<(String, u32)>,
    /// (file, line) pairs touched on the right side.
    pub lines_right: FxHashSet<(String, u32)>,
}

/// Full result of one function-pair comparison.
#[derive(Clone, Debug)]
pub struct ComparisonResult {
    pub verdict: Verdict,
    /// Set exactly when the verdict is `NotEqual` for a reason located in
    /// the body (signature mismatches carry `DivergencePoint::Signature`).
    pub divergence: Option<DivergenceRecord>,
    pub diagnostics: Vec<Diagnostic>,
    pub coverage: Coverage,
}

impl ComparisonResult {
    /// Check for an equal verdict.
    pub const fn is_equal(&self) -> bool {
        matches!(self.verdict, Verdict::Equal)
    }
}
