//! # bo-core
//!
//! Core types, traits, and error handling for binopt.
//!
//! This crate provides:
//! - The error taxonomy shared by all crates
//! - `BinEdges` and `EvaluationResult` with the best-result ordering
//! - The `Solver` and `CardEditor` seams for external tools

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::{CardEditor, Solver, SolverRun};
pub use types::{BinEdges, EvaluationResult, select_best};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
