//! Core traits for binopt
//!
//! The limit-setting tool and the datacard text helpers are external programs.
//! They sit behind these traits so the search and evaluation logic can run
//! against deterministic fakes.

use std::path::{Path, PathBuf};

use crate::Result;

/// One invocation of the limit-setting tool.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverRun {
    /// Unique run identifier (used as the task version).
    pub run_id: String,
    /// Datacards to combine; the first one is the category under study.
    pub datacards: Vec<PathBuf>,
    /// Parameter of interest.
    pub poi: String,
    /// Scan-parameter specification, e.g. `kl,1,1,1`.
    pub scan: String,
}

/// Limit-setting tool.
pub trait Solver {
    /// Run the tool and return its combined textual output.
    fn run(&self, run: &SolverRun) -> Result<String>;

    /// Remove the auxiliary outputs produced by `run`.
    fn cleanup(&self, run: &SolverRun) -> Result<()>;
}

/// Line-oriented datacard transforms.
pub trait CardEditor {
    /// Remove whole processes from the datacard in place.
    fn remove_processes(&self, card: &Path, processes: &[String]) -> Result<()>;

    /// Remove nuisances for specific processes (`*,<process>,<nuisance>` specs).
    fn remove_nuisances(&self, card: &Path, specs: &[String]) -> Result<()>;
}
