//! Differential function comparator.
//!
//! Decides whether two versions of a function are semantically equivalent
//! while tolerating compilation artifacts: relocated instructions, struct
//! layout changes, elided casts, reassociated arithmetic, and renamed
//! registers in inline assembly. Verdicts are conservative; an `Equal`
//! verdict means every difference found was provably benign.
//!
//! Entry points are [`CompareSession`] for whole-module runs and
//! [`FunctionComparator`] for a single function pair.

mod comparator;
mod config;
mod diagnose;
mod driver;
mod heuristics;
mod providers;
mod reloc;
mod report;
mod sync;

pub use comparator::*;
pub use config::*;
pub use driver::*;
pub use heuristics::*;
pub use providers::*;
pub use reloc::*;
pub use report::*;
pub use sync::*;
