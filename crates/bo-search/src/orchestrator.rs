//! Sequential per-category optimization of one channel.
//!
//! Categories are optimized in order. Every category after the first is
//! evaluated in combination with the finalized datacards of the categories
//! before it, so those must exist before its search starts. The selected
//! binnings are checkpointed after each category and a rerun resumes at the
//! first category without a selection.

use std::path::{Path, PathBuf};

use bo_core::{BinEdges, CardEditor, Error, EvaluationResult, Result, Solver};

use crate::datacard::{DEFAULT_CARD_PATTERN, card_file_name, card_stem};
use crate::evaluator::{CategoryObjective, EvaluatorOptions, LimitEvaluator};
use crate::registry::BestBinningRegistry;
use crate::result_log::ResultLog;
use crate::search::{BinningSearch, SearchAlgorithm};
use crate::suggestions::CandidateSuggestions;

/// Creates the solver for one category, running inside the given directory.
pub type SolverFactory<'a> = dyn Fn(&Path) -> Box<dyn Solver> + 'a;

/// Creates the search algorithm for a source binning and bin budget.
pub type AlgorithmFactory<'a> = dyn Fn(&BinEdges, usize) -> Result<Box<dyn SearchAlgorithm>> + 'a;

/// A category and the POI its limit is computed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryPoi {
    /// Category name.
    pub name: String,
    /// Parameter of interest.
    pub poi: String,
}

impl CategoryPoi {
    /// Parse `name:poi[,name:poi...]`.
    pub fn parse_list(s: &str) -> Result<Vec<Self>> {
        let specs = s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|item| match item.split_once(':') {
                Some((name, poi)) if !name.trim().is_empty() && !poi.trim().is_empty() => {
                    Ok(Self { name: name.trim().to_string(), poi: poi.trim().to_string() })
                }
                _ => Err(Error::Validation(format!("category '{item}' must be name:poi"))),
            })
            .collect::<Result<Vec<_>>>()?;
        if specs.is_empty() {
            return Err(Error::Validation("no categories given".into()));
        }
        Ok(specs)
    }
}

/// Static inputs of a channel optimization.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Directory holding the input datacards and shape stores.
    pub input_dir: PathBuf,
    /// Channel name.
    pub channel: String,
    /// Root of the output tree.
    pub output_dir: PathBuf,
    /// Largest number of bins a candidate may have.
    pub max_n_bins: usize,
    /// Categories in processing order.
    pub categories: Vec<CategoryPoi>,
    /// Datacard file name pattern with `{category}` and `{channel}`.
    pub card_pattern: String,
    /// Evaluation settings.
    pub evaluator: EvaluatorOptions,
}

impl OrchestratorConfig {
    /// Configuration with the default card pattern and evaluator options.
    pub fn new(
        input_dir: impl Into<PathBuf>,
        channel: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        max_n_bins: usize,
        categories: Vec<CategoryPoi>,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            channel: channel.into(),
            output_dir: output_dir.into(),
            max_n_bins,
            categories,
            card_pattern: DEFAULT_CARD_PATTERN.to_string(),
            evaluator: EvaluatorOptions::default(),
        }
    }
}

/// Runs the binning search of every category of a channel in order.
pub struct SequentialCategoryOrchestrator<'a> {
    config: OrchestratorConfig,
    suggestions: CandidateSuggestions,
    editor: &'a dyn CardEditor,
    solvers: &'a SolverFactory<'a>,
    algorithms: &'a AlgorithmFactory<'a>,
}

impl<'a> SequentialCategoryOrchestrator<'a> {
    /// Create an orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        suggestions: CandidateSuggestions,
        editor: &'a dyn CardEditor,
        solvers: &'a SolverFactory<'a>,
        algorithms: &'a AlgorithmFactory<'a>,
    ) -> Self {
        Self { config, suggestions, editor, solvers, algorithms }
    }

    /// `<output>/<channel>`
    pub fn channel_dir(&self) -> PathBuf {
        self.config.output_dir.join(&self.config.channel)
    }

    /// Directory of the finalized datacards.
    pub fn best_dir(&self) -> PathBuf {
        self.channel_dir().join("best")
    }

    /// Per-category solver working directories live below this one.
    pub fn workers_dir(&self) -> PathBuf {
        self.channel_dir().join("workers")
    }

    /// Registry checkpoint.
    pub fn registry_path(&self) -> PathBuf {
        self.channel_dir().join("best.json")
    }

    /// Final copy of the registry, `<output>/<channel>.json`.
    pub fn summary_path(&self) -> PathBuf {
        self.config.output_dir.join(format!("{}.json", self.config.channel))
    }

    fn input_card(&self, category: &str) -> PathBuf {
        self.config
            .input_dir
            .join(card_file_name(&self.config.card_pattern, category, &self.config.channel))
    }

    /// Path of the finalized datacard of `category`.
    pub fn finalized_card(&self, category: &str) -> Result<PathBuf> {
        let input = self.input_card(category);
        Ok(self.best_dir().join(format!("{}.txt", card_stem(&input)?)))
    }

    /// Optimize every category without a selection yet and return the
    /// completed registry.
    pub fn run(&self) -> Result<BestBinningRegistry> {
        std::fs::create_dir_all(self.workers_dir())?;
        std::fs::create_dir_all(self.best_dir())?;
        let registry_path = self.registry_path();
        let mut registry = BestBinningRegistry::load_or_new(&registry_path, &self.config.channel)?;

        for index in 0..self.config.categories.len() {
            let category = &self.config.categories[index].name;
            if registry.contains(category) {
                log::info!("{category}: already optimized, skipping");
                continue;
            }
            self.optimize_category(index, &mut registry)?;
        }

        registry.save(&registry_path)?;
        let summary = self.summary_path();
        std::fs::copy(&registry_path, &summary)?;
        log::info!("best binnings of {} written to {}", registry.channel(), summary.display());
        Ok(registry)
    }

    /// Search, finalize and record the category at `index`.
    pub fn optimize_category(
        &self,
        index: usize,
        registry: &mut BestBinningRegistry,
    ) -> Result<EvaluationResult> {
        let target = self.config.categories.get(index).ok_or_else(|| {
            Error::Validation(format!("category index {index} out of range"))
        })?;
        let category = target.name.as_str();

        let mut prior_cards = Vec::with_capacity(index);
        for prior in &self.config.categories[..index] {
            let card = self.finalized_card(&prior.name)?;
            if !card.is_file() {
                return Err(Error::MissingPriorCategory { category: prior.name.clone(), path: card });
            }
            prior_cards.push(card);
        }

        let category_dir = self.channel_dir().join(category);
        let worker_dir = self.workers_dir().join(category);
        std::fs::create_dir_all(&category_dir)?;
        std::fs::create_dir_all(&worker_dir)?;

        let seeds = self.suggestions.for_category(category).to_vec();
        if self.suggestions.has_category(category) {
            let to_try: Vec<&[f64]> = seeds.iter().map(BinEdges::as_slice).collect();
            std::fs::write(category_dir.join("to_try.json"), serde_json::to_string_pretty(&to_try)?)?;
        }

        let solver = (self.solvers)(&worker_dir);
        let evaluator = LimitEvaluator::new(
            self.input_card(category),
            &worker_dir,
            &self.config.evaluator,
            self.editor,
            &*solver,
        )?;
        log::info!(
            "{category}: optimizing {} (poi {}, {} suggestions, {} prior categories)",
            evaluator.input_card().display(),
            target.poi,
            seeds.len(),
            prior_cards.len()
        );

        let mut algorithm = (self.algorithms)(evaluator.source_edges(), self.config.max_n_bins)?;
        let log = ResultLog::open(category_dir.join("results.json"))?;
        let mut search =
            BinningSearch::new(category, &target.poi, self.config.max_n_bins, log).with_seeds(seeds);
        let mut objective = CategoryObjective::new(&evaluator, &target.poi, prior_cards);
        let mut best = search.run(&mut objective, algorithm.as_mut())?;
        best.poi = target.poi.clone();
        log::info!("{category}: best binning {} with expected limit {}", best.bin_edges, best.exp_limit);

        let finalizer = LimitEvaluator::new(
            evaluator.input_card(),
            self.best_dir(),
            &self.config.evaluator,
            self.editor,
            &*solver,
        )?;
        let prepared = finalizer.prepare(&best.bin_edges)?;
        log::debug!("{category}: finalized {}", prepared.card.display());

        registry.insert(category, best.clone())?;
        registry.save(&self.registry_path())?;
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anneal::{AnnealingConfig, AnnealingSearch};
    use crate::datacard::shapes_path;
    use crate::result_log::read_records;
    use bo_core::{SolverRun, select_best};
    use bo_hist::{Axis, Histogram, ShapeFile};
    use std::cell::RefCell;
    use std::rc::Rc;

    const CHANNEL: &str = "tauTau_2018";

    struct NoopEditor;

    impl CardEditor for NoopEditor {
        fn remove_processes(&self, _card: &Path, _processes: &[String]) -> Result<()> {
            Ok(())
        }

        fn remove_nuisances(&self, _card: &Path, _specs: &[String]) -> Result<()> {
            Ok(())
        }
    }

    /// Limit grows with the bin count of the candidate card.
    struct FakeSolver {
        runs: Rc<RefCell<Vec<(PathBuf, SolverRun)>>>,
        working_dir: PathBuf,
    }

    impl Solver for FakeSolver {
        fn run(&self, run: &SolverRun) -> Result<String> {
            self.runs.borrow_mut().push((self.working_dir.clone(), run.clone()));
            let shapes = ShapeFile::read(&shapes_path(&run.datacards[0])?)?;
            let n = shapes.iter().next().map_or(0, |h| h.x_axis().n_bins());
            Ok(format!("Expected 50.0%: {} < {}\n", run.poi, 10.0 - n as f64))
        }

        fn cleanup(&self, _run: &SolverRun) -> Result<()> {
            Ok(())
        }
    }

    fn write_category(dir: &Path, category: &str) {
        let card = dir.join(card_file_name(DEFAULT_CARD_PATTERN, category, CHANNEL));
        std::fs::write(&card, "imax 1\n").unwrap();
        let edges = BinEdges::new((0..=6).map(|i| i as f64).collect()).unwrap();
        let content = vec![0.0, 1.0, 2.0, 3.0, 3.0, 2.0, 1.0, 0.0];
        let sumw2 = content.clone();
        let h = Histogram::from_parts("sig", "", Axis::new(edges), None, content, sumw2).unwrap();
        let mut store = ShapeFile::new();
        store.insert(h);
        store.write(&shapes_path(&card).unwrap()).unwrap();
    }

    fn config(input: &Path, output: &Path) -> OrchestratorConfig {
        let categories = CategoryPoi::parse_list("res2b:r,boosted:r_qqhh").unwrap();
        OrchestratorConfig::new(input, CHANNEL, output, 3, categories)
    }

    fn annealing(source: &BinEdges, max_n_bins: usize) -> Result<Box<dyn SearchAlgorithm>> {
        let cfg = AnnealingConfig { n_iter: 6, ..AnnealingConfig::default() };
        Ok(Box::new(AnnealingSearch::new(source, max_n_bins, cfg)?))
    }

    #[test]
    fn test_parse_category_list() {
        let specs = CategoryPoi::parse_list(" res2b:r , classVBF:r_qqhh").unwrap();
        assert_eq!(specs[1], CategoryPoi { name: "classVBF".into(), poi: "r_qqhh".into() });
        assert!(CategoryPoi::parse_list("res2b").is_err());
        assert!(CategoryPoi::parse_list("res2b:").is_err());
        assert!(CategoryPoi::parse_list("").is_err());
    }

    #[test]
    fn test_full_channel_run() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_category(input.path(), "res2b");
        write_category(input.path(), "boosted");

        let mut suggestions = CandidateSuggestions::new();
        suggestions.push("res2b", BinEdges::new(vec![0.0, 3.0, 6.0]).unwrap());
        let runs = Rc::new(RefCell::new(Vec::new()));
        let shared = Rc::clone(&runs);
        let solvers = move |dir: &Path| -> Box<dyn Solver> {
            Box::new(FakeSolver { runs: Rc::clone(&shared), working_dir: dir.to_path_buf() })
        };
        let orch = SequentialCategoryOrchestrator::new(
            config(input.path(), output.path()),
            suggestions,
            &NoopEditor,
            &solvers,
            &annealing,
        );
        let registry = orch.run().unwrap();

        let order: Vec<_> = registry.entries().map(|(c, _)| c).collect();
        assert_eq!(order, vec!["res2b", "boosted"]);
        for (category, poi) in [("res2b", "r"), ("boosted", "r_qqhh")] {
            let chosen = registry.get(category).unwrap();
            assert_eq!(chosen.poi, poi);
            let logged = read_records(&orch.channel_dir().join(category).join("results.json")).unwrap();
            assert_eq!(select_best(&logged).unwrap().bin_edges, chosen.bin_edges);
            assert!(orch.finalized_card(category).unwrap().is_file());
        }

        let to_try = std::fs::read_to_string(orch.channel_dir().join("res2b/to_try.json")).unwrap();
        let to_try: Vec<Vec<f64>> = serde_json::from_str(&to_try).unwrap();
        assert_eq!(to_try, vec![vec![0.0, 3.0, 6.0]]);
        // No suggestions for boosted, so no seed file either.
        assert!(!orch.channel_dir().join("boosted/to_try.json").exists());
        assert_eq!(registry.channel(), CHANNEL);

        let runs = runs.borrow();
        let res2b_card = orch.finalized_card("res2b").unwrap();
        for (dir, run) in runs.iter() {
            if dir.ends_with("boosted") {
                assert_eq!(run.datacards[1..], [res2b_card.clone()]);
            } else {
                assert_eq!(dir, &orch.workers_dir().join("res2b"));
                assert_eq!(run.datacards.len(), 1);
            }
        }
        assert!(orch.summary_path().is_file());
        let summary = BestBinningRegistry::load_or_new(&orch.summary_path(), CHANNEL).unwrap();
        assert_eq!(summary, registry);
    }

    #[test]
    fn test_resume_skips_finalized_categories() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_category(input.path(), "res2b");
        write_category(input.path(), "boosted");

        let runs = Rc::new(RefCell::new(Vec::new()));
        let shared = Rc::clone(&runs);
        let solvers = move |dir: &Path| -> Box<dyn Solver> {
            Box::new(FakeSolver { runs: Rc::clone(&shared), working_dir: dir.to_path_buf() })
        };
        let orch = SequentialCategoryOrchestrator::new(
            config(input.path(), output.path()),
            CandidateSuggestions::new(),
            &NoopEditor,
            &solvers,
            &annealing,
        );

        std::fs::create_dir_all(orch.best_dir()).unwrap();
        std::fs::write(orch.finalized_card("res2b").unwrap(), "imax 1\n").unwrap();
        let mut registry = BestBinningRegistry::new(CHANNEL);
        let done = EvaluationResult::new(BinEdges::new(vec![0.0, 6.0]).unwrap(), 4.0, "r");
        registry.insert("res2b", done.clone()).unwrap();
        registry.save(&orch.registry_path()).unwrap();

        let registry = orch.run().unwrap();
        assert_eq!(registry.get("res2b"), Some(&done));
        assert!(registry.contains("boosted"));
        assert!(!runs.borrow().is_empty());
        assert!(runs.borrow().iter().all(|(dir, _)| dir.ends_with("boosted")));
    }

    #[test]
    fn test_missing_prior_card_stops_before_solver() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_category(input.path(), "res2b");
        write_category(input.path(), "boosted");

        let runs = Rc::new(RefCell::new(Vec::new()));
        let shared = Rc::clone(&runs);
        let solvers = move |dir: &Path| -> Box<dyn Solver> {
            Box::new(FakeSolver { runs: Rc::clone(&shared), working_dir: dir.to_path_buf() })
        };
        let orch = SequentialCategoryOrchestrator::new(
            config(input.path(), output.path()),
            CandidateSuggestions::new(),
            &NoopEditor,
            &solvers,
            &annealing,
        );
        let mut registry = BestBinningRegistry::new(CHANNEL);
        let err = orch.optimize_category(1, &mut registry).unwrap_err();
        assert!(matches!(err, Error::MissingPriorCategory { ref category, .. } if category == "res2b"));
        assert!(runs.borrow().is_empty());
        assert!(registry.is_empty());
        assert!(!orch.channel_dir().join("boosted").exists());
    }
}
