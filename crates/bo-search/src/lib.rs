//! # bo-search
//!
//! Binning search for binopt.
//!
//! - [`LimitEvaluator`] turns a candidate binning into an expected limit by
//!   rewriting the category's datacard and calling the external solver.
//! - [`BinningSearch`] drives a [`SearchAlgorithm`] against an objective and
//!   checkpoints every evaluation in a [`ResultLog`].
//! - [`SequentialCategoryOrchestrator`] optimizes the categories of a channel
//!   one after another and records the selections in a
//!   [`BestBinningRegistry`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod anneal;
pub mod command;
pub mod datacard;
pub mod evaluator;
pub mod orchestrator;
pub mod registry;
pub mod result_log;
pub mod search;
pub mod suggestions;

pub use anneal::{AlgorithmParams, AnnealingConfig, AnnealingSearch};
pub use command::{CommandCardEditor, CommandSolver, EditorConfig, SolverConfig};
pub use evaluator::{CategoryObjective, EvaluatorOptions, ExpectedLimitParser, LimitEvaluator};
pub use orchestrator::{CategoryPoi, OrchestratorConfig, SequentialCategoryOrchestrator};
pub use registry::BestBinningRegistry;
pub use result_log::ResultLog;
pub use search::{BinningSearch, LimitObjective, SearchAlgorithm};
pub use suggestions::CandidateSuggestions;
