//! binopt CLI

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bo_core::{BinEdges, Solver};
use bo_search::orchestrator::{AlgorithmFactory, SolverFactory};
use bo_search::result_log::read_records;
use bo_search::search::SearchAlgorithm;
use bo_search::{
    AlgorithmParams, AnnealingConfig, AnnealingSearch, CandidateSuggestions, CategoryPoi,
    CommandCardEditor, CommandSolver, LimitEvaluator, OrchestratorConfig,
    SequentialCategoryOrchestrator,
};
use clap::{Parser, Subcommand};

mod config;

const DEFAULT_CATEGORIES: &str = "res2b:r,res1b:r,boosted:r,classVBF:r_qqhh,classGGF:r,classttH:r_qqhh,classTT:r_qqhh,classDY:r_qqhh";

#[derive(Parser)]
#[command(name = "binopt")]
#[command(about = "binopt - Histogram binning optimization against expected limits")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize the binning of every category of a channel in sequence
    OptimizeChannel {
        /// Directory with the input datacards and shape stores
        #[arg(long)]
        input: PathBuf,

        /// Channel name
        #[arg(long)]
        channel: String,

        /// Output directory
        #[arg(long)]
        output: PathBuf,

        /// Maximal number of bins
        #[arg(long, default_value = "20")]
        max_n_bins: usize,

        /// Search algorithm parameters (name=value,...)
        #[arg(long, default_value = "")]
        params: String,

        /// Categories and their POIs in processing order (category:poi,...)
        #[arg(long, default_value = DEFAULT_CATEGORIES)]
        categories: String,

        /// Run configuration (YAML, or JSON with a .json extension)
        #[arg(long)]
        config: Option<PathBuf>,

        /// JSON files with suggested binnings
        suggestions: Vec<PathBuf>,
    },

    /// Evaluate a single binning of one datacard
    Rebin {
        /// Input datacard
        #[arg(long)]
        input: PathBuf,

        /// Output directory
        #[arg(long)]
        output: PathBuf,

        /// Bin edges, e.g. "0, 0.5, 1"
        #[arg(long)]
        bin_edges: String,

        /// Parameter of interest
        #[arg(long, default_value = "r")]
        poi: String,

        /// Only write the rebinned datacard, do not compute the limit
        #[arg(long)]
        rebin_only: bool,

        /// Run configuration (YAML, or JSON with a .json extension)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Other datacards to combine with
        other_cards: Vec<PathBuf>,
    },

    /// Print the best record of a result log
    Best {
        /// Result log (JSON lines)
        #[arg(long)]
        log: PathBuf,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::OptimizeChannel {
            input,
            channel,
            output,
            max_n_bins,
            params,
            categories,
            config,
            suggestions,
        } => cmd_optimize_channel(
            input,
            channel,
            output,
            max_n_bins,
            &params,
            &categories,
            config.as_deref(),
            &suggestions,
        ),
        Commands::Rebin { input, output, bin_edges, poi, rebin_only, config, other_cards } => {
            cmd_rebin(&input, &output, &bin_edges, &poi, rebin_only, config.as_deref(), &other_cards)
        }
        Commands::Best { log } => cmd_best(&log),
        Commands::Version => {
            println!("binopt {}", bo_core::VERSION);
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_optimize_channel(
    input: PathBuf,
    channel: String,
    output: PathBuf,
    max_n_bins: usize,
    params: &str,
    categories: &str,
    config: Option<&Path>,
    suggestion_files: &[PathBuf],
) -> Result<()> {
    let cfg = config::read_run_config(config)?;
    let categories = CategoryPoi::parse_list(categories)?;
    let anneal = AnnealingConfig::from_params(&AlgorithmParams::parse(params)?)?;
    let suggestions = CandidateSuggestions::from_files(suggestion_files, &channel)
        .context("failed to load suggested binnings")?;

    let mut orch_cfg = OrchestratorConfig::new(&input, &channel, &output, max_n_bins, categories);
    orch_cfg.evaluator = cfg.evaluator_options();
    if let Some(pattern) = &cfg.card_pattern {
        orch_cfg.card_pattern = pattern.clone();
    }
    tracing::info!(
        channel = %channel,
        input = %input.display(),
        output = %output.display(),
        max_n_bins,
        categories = orch_cfg.categories.len(),
        "optimizing channel"
    );

    let editor = CommandCardEditor::new(cfg.editor.clone());
    let solver_cfg = cfg.solver.command.clone();
    let solvers = move |dir: &Path| -> Box<dyn Solver> {
        Box::new(CommandSolver::new(solver_cfg.clone()).with_working_dir(dir))
    };
    let algorithms =
        move |source: &BinEdges, max: usize| -> bo_core::Result<Box<dyn SearchAlgorithm>> {
            Ok(Box::new(AnnealingSearch::new(source, max, anneal.clone())?))
        };
    let solvers: &SolverFactory<'_> = &solvers;
    let algorithms: &AlgorithmFactory<'_> = &algorithms;

    let orch = SequentialCategoryOrchestrator::new(orch_cfg, suggestions, &editor, solvers, algorithms);
    let registry = orch.run()?;
    tracing::info!(path = %orch.summary_path().display(), "channel complete");
    write_json(registry.to_json()?)
}

fn cmd_rebin(
    input: &Path,
    output: &Path,
    bin_edges: &str,
    poi: &str,
    rebin_only: bool,
    config: Option<&Path>,
    other_cards: &[PathBuf],
) -> Result<()> {
    let cfg = config::read_run_config(config)?;
    let edges = BinEdges::parse_list(bin_edges)?;
    let editor = CommandCardEditor::new(cfg.editor.clone());
    let solver = CommandSolver::new(cfg.solver.command.clone()).with_working_dir(output);
    let evaluator = LimitEvaluator::new(input, output, &cfg.evaluator_options(), &editor, &solver)?;

    if rebin_only {
        let prepared = evaluator.prepare(&edges)?;
        tracing::info!(card = %prepared.card.display(), "datacard written");
        return write_json(
            serde_json::json!({
                "card": prepared.card,
                "shapes": prepared.shapes,
                "removed_processes": prepared.pruning.processes,
                "removed_nuisances": prepared.pruning.nuisances.iter().map(ToString::to_string).collect::<Vec<_>>(),
            }),
        );
    }

    let exp_limit = evaluator.evaluate(&edges, poi, other_cards)?;
    tracing::info!(exp_limit, "expected limit computed");
    let result = bo_core::EvaluationResult::new(edges, exp_limit, poi);
    write_json(serde_json::to_value(&result)?)
}

fn cmd_best(log: &Path) -> Result<()> {
    let records = read_records(log)?;
    let best = bo_core::select_best(&records)
        .ok_or_else(|| bo_core::Error::NoResults(log.display().to_string()))?;
    tracing::info!(records = records.len(), "result log loaded");
    write_json(serde_json::to_value(best)?)
}

fn write_json(value: serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
