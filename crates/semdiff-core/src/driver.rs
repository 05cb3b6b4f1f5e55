//! Module-level comparison session: verdict cache, recursion tracking, and
//! parallel comparison of all shared functions.

use parking_lot::Mutex;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tracing::debug;

use semdiff_ir::Module;

use crate::comparator::FunctionComparator;
use crate::config::Config;
use crate::providers::{Collaborators, Orchestrator};
use crate::report::{ComparisonResult, Verdict};

/// Errors produced by a comparison session.
#[derive(Debug, Error)]
pub enum Error {
    /// The named function is not defined in both modules.
    #[error("function `{0}` is not defined in both modules")]
    FunctionNotFound(String),
    /// One of the input modules is malformed.
    #[error("invalid input module: {0}")]
    InvalidModule(#[from] semdiff_ir::IrError),
}

/// Session result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// A comparison session over one module pair. Verdicts are cached across
/// function comparisons, and an in-flight set breaks call-graph recursion.
pub struct CompareSession<'a> {
    mod_l: &'a Module,
    mod_r: &'a Module,
    config: Config,
    cache: Mutex<FxHashMap<String, Verdict>>,
    in_flight: Mutex<FxHashSet<String>>,
}

impl Orchestrator for CompareSession<'_> {
    fn in_progress(&self, name: &str) -> bool {
        self.in_flight.lock().contains(name)
    }

    fn cached_verdict(&self, name: &str) -> Option<Verdict> {
        self.cache.lock().get(name).copied()
    }

    fn begin_comparison(&self, name: &str) -> bool {
        self.in_flight.lock().insert(name.to_string())
    }

    fn record_verdict(&self, name: &str, verdict: Verdict) {
        self.cache.lock().insert(name.to_string(), verdict);
        self.in_flight.lock().remove(name);
    }
}

impl<'a> CompareSession<'a> {
    /// Create a session for one module pair.
    pub fn new(mod_l: &'a Module, mod_r: &'a Module, config: Config) -> Self {
        Self {
            mod_l,
            mod_r,
            config,
            cache: Mutex::default(),
            in_flight: Mutex::default(),
        }
    }

    /// Validate both input modules.
    pub fn validate(&self) -> Result<()> {
        self.mod_l.validate()?;
        self.mod_r.validate()?;
        Ok(())
    }

    /// Compare one function pair by name, with default collaborators.
    pub fn compare_function(&self, name: &str) -> Result<ComparisonResult> {
        self.compare_function_with(name, Collaborators::default())
    }

    /// Compare one function pair by name. The orchestrator in `collab` is
    /// replaced by the session itself.
    pub fn compare_function_with(
        &self,
        name: &str,
        collab: Collaborators<'_>,
    ) -> Result<ComparisonResult> {
        let (lid, _) = self
            .mod_l
            .function_by_name(name)
            .ok_or_else(|| Error::FunctionNotFound(name.to_string()))?;
        let (rid, _) = self
            .mod_r
            .function_by_name(name)
            .ok_or_else(|| Error::FunctionNotFound(name.to_string()))?;

        self.begin_comparison(name);
        let collab = Collaborators {
            orchestrator: self,
            ..collab
        };
        let result =
            FunctionComparator::new(self.mod_l, self.mod_r, lid, rid, &self.config, collab)
                .compare();
        debug!(function = name, verdict = ?result.verdict, "comparison finished");
        self.record_verdict(name, result.verdict);
        Ok(result)
    }

    /// Compare every function defined in both modules, in parallel. Results
    /// are ordered by function name.
    pub fn compare_all(&self) -> Vec<(String, ComparisonResult)> {
        let mut names: Vec<String> = self
            .mod_l
            .functions
            .iter()
            .filter(|f| !f.is_declaration())
            .filter(|f| {
                self.mod_r
                    .function_by_name(&f.name)
                    .is_some_and(|(_, g)| !g.is_declaration())
            })
            .map(|f| f.name.clone())
            .collect();
        names.sort();
        names.dedup();
        debug!(count = names.len(), "comparing all shared functions");

        names
            .par_iter()
            .filter_map(|name| {
                self.compare_function(name)
                    .ok()
                    .map(|result| (name.clone(), result))
            })
            .collect()
    }
}
