//! Optimizer-facing search driver.
//!
//! [`BinningSearch`] owns the result log of one category. It feeds the
//! logged history and any seed binnings to a [`SearchAlgorithm`], evaluates
//! the algorithm's proposals through a [`LimitObjective`] and appends every
//! new evaluation to the log before asking for the next proposal.

use bo_core::{BinEdges, EvaluationResult, Result, select_best};

use crate::result_log::ResultLog;

/// Something that maps a binning to an expected limit.
pub trait LimitObjective {
    /// Expected limit for `edges`.
    fn expected_limit(&mut self, edges: &BinEdges) -> Result<f64>;
}

impl<F> LimitObjective for F
where
    F: FnMut(&BinEdges) -> Result<f64>,
{
    fn expected_limit(&mut self, edges: &BinEdges) -> Result<f64> {
        self(edges)
    }
}

/// Proposal strategy of a binning search.
pub trait SearchAlgorithm {
    /// Short algorithm name for logs.
    fn name(&self) -> &str;

    /// Next candidate, or `None` when the search is finished.
    fn propose(&mut self) -> Result<Option<BinEdges>>;

    /// Feedback for a proposal, a seed, or a record replayed from the log.
    fn observe(&mut self, result: &EvaluationResult);
}

/// Binning search for one category.
#[derive(Debug)]
pub struct BinningSearch {
    name: String,
    poi: String,
    max_n_bins: usize,
    seeds: Vec<BinEdges>,
    log: ResultLog,
}

impl BinningSearch {
    /// Search for `name` (used in messages) writing to `log`.
    pub fn new(name: impl Into<String>, poi: impl Into<String>, max_n_bins: usize, log: ResultLog) -> Self {
        Self { name: name.into(), poi: poi.into(), max_n_bins, seeds: Vec::new(), log }
    }

    /// Binnings to evaluate before the algorithm's own proposals.
    pub fn with_seeds(mut self, seeds: Vec<BinEdges>) -> Self {
        self.seeds = seeds;
        self
    }

    /// Result log of this search.
    pub fn log(&self) -> &ResultLog {
        &self.log
    }

    /// Run the search to completion and return the best logged result.
    ///
    /// Binnings already present in the log are never evaluated again; their
    /// logged limit is reused.
    pub fn run(
        &mut self,
        objective: &mut dyn LimitObjective,
        algorithm: &mut dyn SearchAlgorithm,
    ) -> Result<EvaluationResult> {
        let mut history = self.log.load()?;
        if !history.is_empty() {
            log::info!(
                "{}: resuming from {} logged evaluations in {}",
                self.name,
                history.len(),
                self.log.path().display()
            );
        }
        for record in &history {
            algorithm.observe(record);
        }

        let seeds = std::mem::take(&mut self.seeds);
        for seed in seeds {
            if let Err(e) = seed.check_max_bins(self.max_n_bins) {
                log::warn!("{}: skipping suggested binning {seed}: {e}", self.name);
                continue;
            }
            self.evaluate_once(seed, &mut history, objective, algorithm)?;
        }

        log::info!("{}: running {} search", self.name, algorithm.name());
        while let Some(candidate) = algorithm.propose()? {
            candidate.check_max_bins(self.max_n_bins)?;
            self.evaluate_once(candidate, &mut history, objective, algorithm)?;
        }

        select_best(&history).cloned().ok_or_else(|| bo_core::Error::NoResults(self.name.clone()))
    }

    fn evaluate_once(
        &mut self,
        edges: BinEdges,
        history: &mut Vec<EvaluationResult>,
        objective: &mut dyn LimitObjective,
        algorithm: &mut dyn SearchAlgorithm,
    ) -> Result<()> {
        if let Some(known) = history.iter().find(|r| r.bin_edges == edges) {
            log::debug!("{}: {edges} already evaluated ({})", self.name, known.exp_limit);
            algorithm.observe(known);
            return Ok(());
        }
        let exp_limit = objective.expected_limit(&edges)?;
        let result = EvaluationResult::new(edges, exp_limit, self.poi.clone());
        self.log.append(&result)?;
        log::info!("{}: {} -> {exp_limit}", self.name, result.bin_edges);
        algorithm.observe(&result);
        history.push(result);
        Ok(())
    }
}
