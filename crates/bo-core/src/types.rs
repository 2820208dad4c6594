//! Common data types for binopt

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Strictly increasing bin boundaries (`n_bins + 1` values).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct BinEdges(Vec<f64>);

impl BinEdges {
    /// Validate and wrap a list of edges.
    pub fn new(edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(Error::InvalidBinEdges(format!(
                "need at least 2 edges, got {}",
                edges.len()
            )));
        }
        if let Some(bad) = edges.iter().find(|e| !e.is_finite()) {
            return Err(Error::InvalidBinEdges(format!("non-finite edge {bad}")));
        }
        if let Some(w) = edges.windows(2).find(|w| w[0] >= w[1]) {
            return Err(Error::InvalidBinEdges(format!(
                "edges must be strictly increasing ({} >= {})",
                w[0], w[1]
            )));
        }
        Ok(Self(edges))
    }

    /// Parse a comma separated list such as `"0, 0.5, 1"`.
    pub fn parse_list(s: &str) -> Result<Self> {
        let edges = s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| {
                t.parse::<f64>()
                    .map_err(|e| Error::InvalidBinEdges(format!("cannot parse '{t}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(edges)
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.0.len() - 1
    }

    /// Fail if the binning has more than `max_n_bins` bins.
    pub fn check_max_bins(&self, max_n_bins: usize) -> Result<()> {
        if self.n_bins() > max_n_bins {
            return Err(Error::InvalidBinEdges(format!(
                "{} bins exceed the maximum of {max_n_bins}",
                self.n_bins()
            )));
        }
        Ok(())
    }

    /// Edge values.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// First edge.
    pub fn min(&self) -> f64 {
        self.0[0]
    }

    /// Last edge.
    pub fn max(&self) -> f64 {
        self.0[self.0.len() - 1]
    }
}

impl TryFrom<Vec<f64>> for BinEdges {
    type Error = Error;

    fn try_from(edges: Vec<f64>) -> Result<Self> {
        Self::new(edges)
    }
}

impl From<BinEdges> for Vec<f64> {
    fn from(edges: BinEdges) -> Self {
        edges.0
    }
}

impl fmt::Display for BinEdges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{e}")?;
        }
        write!(f, "]")
    }
}

/// Outcome of one limit evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Evaluated binning.
    pub bin_edges: BinEdges,

    /// Median expected upper limit on the POI.
    pub exp_limit: f64,

    /// Parameter of interest. Result-log lines may omit it.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub poi: String,
}

impl EvaluationResult {
    /// Create a new evaluation result
    pub fn new(bin_edges: BinEdges, exp_limit: f64, poi: impl Into<String>) -> Self {
        Self { bin_edges, exp_limit, poi: poi.into() }
    }

    /// Preference order: `Less` means `self` is the better result.
    ///
    /// Lower limit first, then fewer edges, then edges compared from the last
    /// one backward (smaller wins).
    pub fn preference_cmp(&self, other: &Self) -> Ordering {
        self.exp_limit
            .total_cmp(&other.exp_limit)
            .then_with(|| self.bin_edges.0.len().cmp(&other.bin_edges.0.len()))
            .then_with(|| {
                self.bin_edges
                    .0
                    .iter()
                    .rev()
                    .zip(other.bin_edges.0.iter().rev())
                    .map(|(a, b)| a.total_cmp(b))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            })
    }

    /// Whether `self` is strictly preferred over `other`.
    pub fn is_better_than(&self, other: &Self) -> bool {
        self.preference_cmp(other) == Ordering::Less
    }
}

/// Best result of a sequence under [`EvaluationResult::preference_cmp`].
pub fn select_best<'a, I>(results: I) -> Option<&'a EvaluationResult>
where
    I: IntoIterator<Item = &'a EvaluationResult>,
{
    results.into_iter().min_by(|a, b| a.preference_cmp(b))
}
