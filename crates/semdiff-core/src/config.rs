//! Comparator configuration.

/// Granularity of the aliasing-hazard check used by relocation detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HazardGranularity {
    /// Two accesses conflict when they may touch the same object.
    Object,
    /// Accesses to provably distinct constant offsets of one object do not
    /// conflict.
    Field,
}

/// Configuration bundle for one comparison.
#[derive(Clone, Debug)]
pub struct Config {
    /// Ignore data-value and type details; judge equivalence from control
    /// structure alone.
    pub control_flow_only: bool,
    /// Disable the relocation engine.
    pub suppress_relocations: bool,
    /// Disable the external block-equivalence oracle.
    pub suppress_oracle: bool,
    /// Bound on the relocation lookahead, in instructions. `None` searches
    /// to the end of the current block (never beyond it).
    pub reloc_lookahead: Option<usize>,
    /// Aliasing-hazard granularity for relocation.
    pub hazard_granularity: HazardGranularity,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            control_flow_only: false,
            suppress_relocations: false,
            suppress_oracle: false,
            reloc_lookahead: None,
            hazard_granularity: HazardGranularity::Object,
        }
    }
}
