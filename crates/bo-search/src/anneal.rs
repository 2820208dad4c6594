//! Simulated-annealing search over subsets of the source bin edges.

use std::collections::BTreeMap;
use std::str::FromStr;

use bo_core::{BinEdges, Error, EvaluationResult, Result};
use bo_hist::axis::edges_match;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::search::SearchAlgorithm;

/// `name=value` algorithm parameters (`--params n_iter=50,seed=7`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlgorithmParams(BTreeMap<String, String>);

impl AlgorithmParams {
    /// Parse a comma separated `name=value` list. An empty string yields no
    /// parameters.
    pub fn parse(s: &str) -> Result<Self> {
        let mut params = BTreeMap::new();
        for item in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (name, value) = item.split_once('=').ok_or_else(|| {
                Error::Validation(format!("algorithm parameter '{item}' must be name=value"))
            })?;
            params.insert(name.trim().to_string(), value.trim().to_string());
        }
        Ok(Self(params))
    }

    /// Typed value of `name`, or `default` if absent.
    pub fn get_or<T>(&self, name: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.0.get(name) {
            None => Ok(default),
            Some(v) => v
                .parse()
                .map_err(|e| Error::Validation(format!("algorithm parameter {name}={v}: {e}"))),
        }
    }

    /// Fail on names outside `known`.
    pub fn check_known(&self, known: &[&str]) -> Result<()> {
        match self.0.keys().find(|k| !known.contains(&k.as_str())) {
            Some(k) => Err(Error::Validation(format!(
                "unknown algorithm parameter '{k}' (expected one of: {})",
                known.join(", ")
            ))),
            None => Ok(()),
        }
    }
}

/// Annealing schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnealingConfig {
    /// Number of proposals.
    pub n_iter: usize,
    /// RNG seed.
    pub seed: u64,
    /// Initial temperature, in units of relative limit change.
    pub t0: f64,
    /// Temperature factor applied after each proposal.
    pub cooling: f64,
    /// Smallest number of bins a proposal may have.
    pub min_bins: usize,
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        Self { n_iter: 100, seed: 42, t0: 0.05, cooling: 0.97, min_bins: 1 }
    }
}

impl AnnealingConfig {
    const PARAMS: [&'static str; 5] = ["n_iter", "seed", "t0", "cooling", "min_bins"];

    /// Defaults overridden by `params`.
    pub fn from_params(params: &AlgorithmParams) -> Result<Self> {
        params.check_known(&Self::PARAMS)?;
        let d = Self::default();
        let cfg = Self {
            n_iter: params.get_or("n_iter", d.n_iter)?,
            seed: params.get_or("seed", d.seed)?,
            t0: params.get_or("t0", d.t0)?,
            cooling: params.get_or("cooling", d.cooling)?,
            min_bins: params.get_or("min_bins", d.min_bins)?,
        };
        if !(cfg.t0 > 0.0) || !(cfg.cooling > 0.0 && cfg.cooling <= 1.0) || cfg.min_bins == 0 {
            return Err(Error::Validation(format!(
                "invalid annealing schedule: t0={} cooling={} min_bins={}",
                cfg.t0, cfg.cooling, cfg.min_bins
            )));
        }
        Ok(cfg)
    }
}

/// Anneals over subsets of the interior edges of a source binning. The
/// outer edges are always kept, so every proposal is a coarsening of the
/// source.
#[derive(Debug)]
pub struct AnnealingSearch {
    grid: Vec<f64>,
    max_n_bins: usize,
    config: AnnealingConfig,
    rng: StdRng,
    temperature: f64,
    n_proposed: usize,
    /// Interior grid indices and limit of the current state.
    current: Option<(Vec<usize>, f64)>,
    pending: Option<Vec<usize>>,
}

impl AnnealingSearch {
    /// Search over coarsenings of `source` with at most `max_n_bins` bins.
    pub fn new(source: &BinEdges, max_n_bins: usize, config: AnnealingConfig) -> Result<Self> {
        if max_n_bins < config.min_bins {
            return Err(Error::Validation(format!(
                "max_n_bins={max_n_bins} is below min_bins={}",
                config.min_bins
            )));
        }
        Ok(Self {
            grid: source.as_slice().to_vec(),
            max_n_bins,
            rng: StdRng::seed_from_u64(config.seed),
            temperature: config.t0,
            n_proposed: 0,
            current: None,
            pending: None,
            config,
        })
    }

    fn n_interior(&self) -> usize {
        self.grid.len() - 2
    }

    /// Evenly spread start with half the allowed bins.
    fn initial_state(&self) -> Vec<usize> {
        let grid_bins = self.grid.len() - 1;
        let k = (self.max_n_bins / 2).max(self.config.min_bins).min(grid_bins).max(1);
        let mut interior: Vec<usize> =
            (1..k).map(|j| ((j * grid_bins) as f64 / k as f64).round() as usize).collect();
        interior.dedup();
        interior.retain(|&i| i >= 1 && i <= self.n_interior());
        interior
    }

    fn mutate(&mut self, base: &[usize]) -> Vec<usize> {
        let n_bins = base.len() + 1;
        let free: Vec<usize> = (1..=self.n_interior()).filter(|i| !base.contains(i)).collect();
        for _ in 0..16 {
            let mut next = base.to_vec();
            match self.rng.gen_range(0..3) {
                0 if n_bins < self.max_n_bins && !free.is_empty() => {
                    next.push(free[self.rng.gen_range(0..free.len())]);
                }
                1 if n_bins > self.config.min_bins && !next.is_empty() => {
                    next.remove(self.rng.gen_range(0..next.len()));
                }
                2 if !next.is_empty() => {
                    let pos = self.rng.gen_range(0..next.len());
                    let lo = if pos == 0 { 1 } else { next[pos - 1] + 1 };
                    let hi = if pos + 1 == next.len() { self.n_interior() } else { next[pos + 1] - 1 };
                    if hi > lo {
                        let target = self.rng.gen_range(lo..=hi);
                        if target != next[pos] {
                            next[pos] = target;
                        }
                    }
                }
                _ => continue,
            }
            next.sort_unstable();
            if next != base {
                return next;
            }
        }
        base.to_vec()
    }

    fn edges_of(&self, interior: &[usize]) -> Result<BinEdges> {
        let mut edges = Vec::with_capacity(interior.len() + 2);
        edges.push(self.grid[0]);
        edges.extend(interior.iter().map(|&i| self.grid[i]));
        edges.push(self.grid[self.grid.len() - 1]);
        BinEdges::new(edges)
    }

    /// Interior grid indices of `edges`, if it is a coarsening of the grid.
    fn indices_of(&self, edges: &BinEdges) -> Option<Vec<usize>> {
        let e = edges.as_slice();
        if !edges_match(e[0], self.grid[0]) || !edges_match(e[e.len() - 1], self.grid[self.grid.len() - 1]) {
            return None;
        }
        e[1..e.len() - 1]
            .iter()
            .map(|&x| (1..=self.n_interior()).find(|&i| edges_match(x, self.grid[i])))
            .collect()
    }
}

impl SearchAlgorithm for AnnealingSearch {
    fn name(&self) -> &str {
        "annealing"
    }

    fn propose(&mut self) -> Result<Option<BinEdges>> {
        if self.n_proposed >= self.config.n_iter {
            return Ok(None);
        }
        self.n_proposed += 1;
        let candidate = match self.current.clone() {
            None => self.initial_state(),
            Some((base, _)) => self.mutate(&base),
        };
        self.temperature *= self.config.cooling;
        let edges = self.edges_of(&candidate)?;
        self.pending = Some(candidate);
        Ok(Some(edges))
    }

    fn observe(&mut self, result: &EvaluationResult) {
        let Some(indices) = self.indices_of(&result.bin_edges) else {
            log::debug!("annealing: ignoring off-grid binning {}", result.bin_edges);
            return;
        };
        let limit = result.exp_limit;
        let accept = match &self.current {
            None => true,
            Some((_, current)) if limit <= *current => true,
            Some((_, current)) if self.pending.as_ref() == Some(&indices) => {
                let delta = (limit - current) / current.abs().max(f64::MIN_POSITIVE);
                self.rng.r#gen::<f64>() < (-delta / self.temperature).exp()
            }
            Some(_) => false,
        };
        if self.pending.as_ref() == Some(&indices) {
            self.pending = None;
        }
        if accept {
            self.current = Some((indices, limit));
        }
    }
}
