//! Binning → expected limit.
//!
//! One evaluation rebins every shape of a category, repairs negative bins,
//! prunes processes and nuisances whose shapes became unusable, writes the
//! datacard + shape store into the output directory and asks the solver for
//! the median expected limit.

use std::cell::Cell;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use bo_core::{BinEdges, CardEditor, Error, Result, Solver, SolverRun};
use bo_hist::{ShapeFile, rebin, repair_negative_bins};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::datacard::{
    DEFAULT_NUISANCE_PREFIX, NuisanceRef, ShapeClassifier, ShapeKind, card_stem, shapes_path,
};
use crate::search::LimitObjective;

/// Scan-parameter specification passed to the solver.
pub const DEFAULT_SCAN_PARAMETERS: &str = "kl,1,1,1";

/// Evaluation settings shared by every category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorOptions {
    /// Prefix of nuisance names in systematic-variation shapes.
    pub nuisance_prefix: String,
    /// Scan parameters for the solver.
    pub scan_parameters: String,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            nuisance_prefix: DEFAULT_NUISANCE_PREFIX.to_string(),
            scan_parameters: DEFAULT_SCAN_PARAMETERS.to_string(),
        }
    }
}

/// Processes and nuisances dropped from a datacard by one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pruning {
    /// Processes whose central shape is unusable.
    pub processes: BTreeSet<String>,
    /// `(process, nuisance)` pairs whose variation shape is unusable.
    pub nuisances: BTreeSet<NuisanceRef>,
}

impl Pruning {
    /// Whether nothing was removed.
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty() && self.nuisances.is_empty()
    }
}

/// Datacard materialized for one binning.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCard {
    /// Rewritten datacard.
    pub card: PathBuf,
    /// Rebinned shape store next to it.
    pub shapes: PathBuf,
    /// Removals applied to the datacard.
    pub pruning: Pruning,
}

/// Evaluates binnings of one input datacard.
pub struct LimitEvaluator<'a> {
    input_card: PathBuf,
    shapes: ShapeFile,
    reference_edges: BinEdges,
    output_dir: PathBuf,
    classifier: ShapeClassifier,
    scan_parameters: String,
    editor: &'a dyn CardEditor,
    solver: &'a dyn Solver,
    limit_parser: ExpectedLimitParser,
    n_runs: Cell<usize>,
}

impl<'a> LimitEvaluator<'a> {
    /// Load the shapes of `input_card` and prepare to write into `output_dir`.
    pub fn new(
        input_card: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        options: &EvaluatorOptions,
        editor: &'a dyn CardEditor,
        solver: &'a dyn Solver,
    ) -> Result<Self> {
        let input_card = input_card.into();
        let shapes_file = shapes_path(&input_card)?;
        log::debug!("input shapes: {}", shapes_file.display());
        let shapes = ShapeFile::read(&shapes_file)?;
        let reference_edges = common_x_edges(&shapes, &shapes_file)?;
        Ok(Self {
            input_card,
            shapes,
            reference_edges,
            output_dir: output_dir.into(),
            classifier: ShapeClassifier::new(&options.nuisance_prefix)?,
            scan_parameters: options.scan_parameters.clone(),
            editor,
            solver,
            limit_parser: ExpectedLimitParser::new()?,
            n_runs: Cell::new(0),
        })
    }

    /// Input datacard.
    pub fn input_card(&self) -> &Path {
        &self.input_card
    }

    /// Binning shared by all input shapes; every candidate must coarsen it.
    pub fn source_edges(&self) -> &BinEdges {
        &self.reference_edges
    }

    /// Rebin-only mode: write the datacard and rebinned shapes for `edges`
    /// without running the solver.
    pub fn prepare(&self, edges: &BinEdges) -> Result<PreparedCard> {
        std::fs::create_dir_all(&self.output_dir)?;
        let stem = card_stem(&self.input_card)?;
        let card = self.output_dir.join(format!("{stem}.txt"));
        let shapes = shapes_path(&card)?;
        if same_file(&card, &self.input_card) {
            return Err(Error::Validation(format!(
                "output directory '{}' must differ from the input directory",
                self.output_dir.display()
            )));
        }
        for out in [&card, &shapes] {
            if out.exists() {
                std::fs::remove_file(out)?;
            }
        }
        std::fs::copy(&self.input_card, &card)?;

        let mut pruning = Pruning::default();
        let mut output = ShapeFile::new();
        for hist in self.shapes.iter() {
            let kind = self.classifier.classify(&hist.name);
            if pruning.processes.contains(kind.process()) {
                continue;
            }
            if let ShapeKind::Variation { process, .. } = &kind
                && !self.shapes.contains(process)
            {
                return Err(Error::HistogramMismatch(format!(
                    "variation '{}' has no central histogram '{process}'",
                    hist.name
                )));
            }
            let mut rebinned = rebin(hist, edges)?;
            if repair_negative_bins(&mut rebinned) {
                output.insert(rebinned);
                continue;
            }
            match kind {
                ShapeKind::Central { process } => {
                    pruning.processes.insert(process);
                }
                ShapeKind::Variation { process, nuisance, .. } => {
                    pruning.nuisances.insert(NuisanceRef { process, nuisance });
                }
            }
        }
        output.write(&shapes)?;

        if !pruning.processes.is_empty() {
            let processes: Vec<String> = pruning.processes.iter().cloned().collect();
            log::info!("Removing processes: {}", processes.join(" "));
            self.editor.remove_processes(&card, &processes)?;
        }
        if !pruning.nuisances.is_empty() {
            let specs: Vec<String> = pruning.nuisances.iter().map(ToString::to_string).collect();
            log::info!("Removing nuisances: {}", specs.join(" "));
            self.editor.remove_nuisances(&card, &specs)?;
        }
        Ok(PreparedCard { card, shapes, pruning })
    }

    /// Prepare the datacard for `edges` and compute the expected limit of
    /// `poi`, combining it with the already finalized `prior_cards`.
    pub fn evaluate(&self, edges: &BinEdges, poi: &str, prior_cards: &[PathBuf]) -> Result<f64> {
        let prepared = self.prepare(edges)?;

        let n = self.n_runs.get() + 1;
        self.n_runs.set(n);
        let mut datacards = vec![prepared.card];
        datacards.extend(prior_cards.iter().cloned());
        let run = SolverRun {
            run_id: format!("{}_{n}", chrono::Local::now().format("%Y%m%d_%H%M%S")),
            datacards,
            poi: poi.to_string(),
            scan: self.scan_parameters.clone(),
        };

        log::info!("Running limits for {edges}...");
        let output = match self.solver.run(&run) {
            Ok(output) => output,
            Err(e) => {
                if let Err(cleanup) = self.solver.cleanup(&run) {
                    log::warn!("cleanup after failed run {} also failed: {cleanup}", run.run_id);
                }
                return Err(e);
            }
        };
        self.solver.cleanup(&run)?;
        self.limit_parser.parse(&output, poi)
    }
}

/// Reads the median expected limit from solver output.
#[derive(Debug, Clone)]
pub struct ExpectedLimitParser {
    pattern: Regex,
}

impl ExpectedLimitParser {
    /// Compile the `Expected 50.0%: <poi> < <value>` line pattern.
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(r"^Expected 50\.0%: (\S+) < (\S+)")
            .map_err(|e| Error::Validation(format!("invalid limit pattern: {e}")))?;
        Ok(Self { pattern })
    }

    /// Value of the last expected-limit line for `poi`. That line alone
    /// decides: if its value is not a finite number the limit is missing.
    pub fn parse(&self, output: &str, poi: &str) -> Result<f64> {
        let not_found = || Error::LimitNotFound { poi: poi.to_string() };
        let value = output
            .lines()
            .rev()
            .find_map(|line| {
                let c = self.pattern.captures(line)?;
                if c.get(1)?.as_str() == poi { c.get(2).map(|m| m.as_str()) } else { None }
            })
            .ok_or_else(not_found)?;
        match value.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => {
                log::warn!("unreadable expected limit '{value}' for {poi}");
                Err(not_found())
            }
        }
    }
}

/// A [`LimitEvaluator`] bound to a POI and the prior categories' datacards.
pub struct CategoryObjective<'e, 'a> {
    evaluator: &'e LimitEvaluator<'a>,
    poi: String,
    prior_cards: Vec<PathBuf>,
}

impl<'e, 'a> CategoryObjective<'e, 'a> {
    /// Bind `evaluator` to `poi` and `prior_cards`.
    pub fn new(evaluator: &'e LimitEvaluator<'a>, poi: impl Into<String>, prior_cards: Vec<PathBuf>) -> Self {
        Self { evaluator, poi: poi.into(), prior_cards }
    }
}

impl LimitObjective for CategoryObjective<'_, '_> {
    fn expected_limit(&mut self, edges: &BinEdges) -> Result<f64> {
        self.evaluator.evaluate(edges, &self.poi, &self.prior_cards)
    }
}

fn common_x_edges(shapes: &ShapeFile, source: &Path) -> Result<BinEdges> {
    let mut iter = shapes.iter();
    let first = iter.next().ok_or_else(|| {
        Error::HistogramMismatch(format!("no histograms in '{}'", source.display()))
    })?;
    let edges = first.x_axis().edges();
    if let Some(other) = iter.find(|h| h.x_axis().edges() != edges) {
        return Err(Error::HistogramMismatch(format!(
            "'{}' and '{}' in '{}' have different binnings",
            first.name,
            other.name,
            source.display()
        )));
    }
    Ok(edges.clone())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
