//! Variable-width histogram axis with ROOT-style flow bins.

use bo_core::BinEdges;

/// Relative tolerance used when comparing bin edges.
pub const EDGE_TOLERANCE: f64 = 1e-7;

/// Histogram axis. Bin 0 is the underflow, bins `1..=n` are in range and
/// bin `n + 1` is the overflow.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    edges: BinEdges,
}

impl Axis {
    /// Create an axis from validated edges.
    pub fn new(edges: BinEdges) -> Self {
        Self { edges }
    }

    /// Number of in-range bins.
    pub fn n_bins(&self) -> usize {
        self.edges.n_bins()
    }

    /// Bin edges (length `n_bins + 1`).
    pub fn edges(&self) -> &BinEdges {
        &self.edges
    }

    /// Lower edge of the first in-range bin.
    pub fn min(&self) -> f64 {
        self.edges.min()
    }

    /// Upper edge of the last in-range bin.
    pub fn max(&self) -> f64 {
        self.edges.max()
    }

    /// Low edge of `bin`; the underflow starts at `-inf`.
    pub fn low_edge(&self, bin: usize) -> f64 {
        let e = self.edges.as_slice();
        if bin == 0 { f64::NEG_INFINITY } else { e[(bin - 1).min(e.len() - 1)] }
    }

    /// Upper edge of `bin`; the overflow ends at `+inf`.
    pub fn up_edge(&self, bin: usize) -> f64 {
        let e = self.edges.as_slice();
        if bin > self.n_bins() { f64::INFINITY } else { e[bin] }
    }

    /// Bin whose half-open interval `[low, up)` contains `x`.
    pub fn find_fixed_bin(&self, x: f64) -> usize {
        if x < self.min() {
            return 0;
        }
        if x >= self.max() {
            return self.n_bins() + 1;
        }
        self.edges.as_slice().partition_point(|&e| e <= x)
    }

    /// Like [`Axis::find_fixed_bin`], but a coordinate that sits on the upper
    /// edge of its bin within [`EDGE_TOLERANCE`] belongs to the next bin.
    pub fn locate(&self, x: f64) -> usize {
        let bin = self.find_fixed_bin(x);
        if bin <= self.n_bins() && edges_match(x, self.up_edge(bin)) { bin + 1 } else { bin }
    }
}

/// Whether two edge coordinates agree within [`EDGE_TOLERANCE`].
pub fn edges_match(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    (a - b).abs() <= EDGE_TOLERANCE * (a + b).abs() * 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(edges: &[f64]) -> Axis {
        Axis::new(BinEdges::new(edges.to_vec()).unwrap())
    }

    #[test]
    fn test_find_fixed_bin() {
        let a = axis(&[0.0, 1.0, 2.0, 4.0]);
        assert_eq!(a.find_fixed_bin(-0.5), 0);
        assert_eq!(a.find_fixed_bin(0.0), 1);
        assert_eq!(a.find_fixed_bin(0.999), 1);
        assert_eq!(a.find_fixed_bin(1.0), 2);
        assert_eq!(a.find_fixed_bin(3.9), 3);
        assert_eq!(a.find_fixed_bin(4.0), 4);
        assert_eq!(a.find_fixed_bin(f64::INFINITY), 4);
        assert_eq!(a.find_fixed_bin(f64::NEG_INFINITY), 0);
    }

    #[test]
    fn test_flow_edges() {
        let a = axis(&[0.0, 1.0, 2.0]);
        assert_eq!(a.low_edge(0), f64::NEG_INFINITY);
        assert_eq!(a.up_edge(0), 0.0);
        assert_eq!(a.low_edge(1), 0.0);
        assert_eq!(a.up_edge(2), 2.0);
        assert_eq!(a.low_edge(3), 2.0);
        assert_eq!(a.up_edge(3), f64::INFINITY);
    }

    #[test]
    fn test_locate_snaps_to_next_bin() {
        let a = axis(&[0.0, 0.3, 1.0]);
        assert_eq!(a.locate(0.3 - 1e-12), 2);
        assert_eq!(a.locate(0.2999), 1);
        assert_eq!(a.locate(f64::NEG_INFINITY), 0);
    }

    #[test]
    fn test_edges_match() {
        assert!(edges_match(1.0, 1.0 + 1e-9));
        assert!(!edges_match(1.0, 1.001));
        assert!(edges_match(0.0, 0.0));
        assert!(edges_match(f64::INFINITY, f64::INFINITY));
        assert!(!edges_match(f64::INFINITY, 1.0));
    }
}
