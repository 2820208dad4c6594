//! 1-D and 2-D histograms with under/overflow bins.

use bo_core::{Error, Result};

use crate::axis::Axis;

/// A binned histogram with contents and variances for every bin, flow bins
/// included.
///
/// Global bin layout follows ROOT: `bin = ix + (nx + 2) * iy`, where `ix`
/// and `iy` run over `0..=n + 1` on their axis. A 1-D histogram has
/// `iy = 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// Histogram name.
    pub name: String,
    /// Histogram title.
    pub title: String,
    x: Axis,
    y: Option<Axis>,
    content: Vec<f64>,
    sumw2: Vec<f64>,
}

impl Histogram {
    /// Empty 1-D histogram.
    pub fn new_1d(name: impl Into<String>, title: impl Into<String>, x: Axis) -> Self {
        Self::empty(name.into(), title.into(), x, None)
    }

    /// Empty 2-D histogram.
    pub fn new_2d(name: impl Into<String>, title: impl Into<String>, x: Axis, y: Axis) -> Self {
        Self::empty(name.into(), title.into(), x, Some(y))
    }

    fn empty(name: String, title: String, x: Axis, y: Option<Axis>) -> Self {
        let n = cell_count(&x, y.as_ref());
        Self { name, title, x, y, content: vec![0.0; n], sumw2: vec![0.0; n] }
    }

    /// Histogram from explicit contents and variances (flow bins included).
    pub fn from_parts(
        name: impl Into<String>,
        title: impl Into<String>,
        x: Axis,
        y: Option<Axis>,
        content: Vec<f64>,
        sumw2: Vec<f64>,
    ) -> Result<Self> {
        let name = name.into();
        let n = cell_count(&x, y.as_ref());
        if content.len() != n || sumw2.len() != n {
            return Err(Error::HistogramMismatch(format!(
                "'{name}': expected {n} bins including flows, got content={} sumw2={}",
                content.len(),
                sumw2.len()
            )));
        }
        Ok(Self { name, title: title.into(), x, y, content, sumw2 })
    }

    /// Number of axes (1 or 2).
    pub fn dimension(&self) -> usize {
        if self.y.is_some() { 2 } else { 1 }
    }

    /// X axis.
    pub fn x_axis(&self) -> &Axis {
        &self.x
    }

    /// Y axis, for 2-D histograms.
    pub fn y_axis(&self) -> Option<&Axis> {
        self.y.as_ref()
    }

    /// Total number of bins including flows.
    pub fn n_cells(&self) -> usize {
        self.content.len()
    }

    /// Global bin index for axis bins `(ix, iy)`.
    pub fn global_bin(&self, ix: usize, iy: usize) -> usize {
        ix + (self.x.n_bins() + 2) * iy
    }

    /// Bin content.
    pub fn content(&self, bin: usize) -> f64 {
        self.content[bin]
    }

    /// Bin error, `sqrt(sumw2)`.
    pub fn error(&self, bin: usize) -> f64 {
        self.sumw2[bin].sqrt()
    }

    /// Bin variance.
    pub fn sumw2(&self, bin: usize) -> f64 {
        self.sumw2[bin]
    }

    /// All bin contents, flows included.
    pub fn contents(&self) -> &[f64] {
        &self.content
    }

    /// All bin variances, flows included.
    pub fn variances(&self) -> &[f64] {
        &self.sumw2
    }

    /// Set bin content.
    pub fn set_content(&mut self, bin: usize, value: f64) {
        self.content[bin] = value;
    }

    /// Set bin error (stored as its square).
    pub fn set_error(&mut self, bin: usize, error: f64) {
        self.sumw2[bin] = error * error;
    }

    /// Accumulate content and variance into `bin`.
    pub fn add_to_bin(&mut self, bin: usize, content: f64, sumw2: f64) {
        self.content[bin] += content;
        self.sumw2[bin] += sumw2;
    }

    /// Global indices of the in-range (non-flow) bins.
    pub fn in_range_bins(&self) -> Vec<usize> {
        let nx = self.x.n_bins();
        match &self.y {
            None => (1..=nx).collect(),
            Some(y) => (1..=y.n_bins())
                .flat_map(|iy| (1..=nx).map(move |ix| ix + (nx + 2) * iy))
                .collect(),
        }
    }

    /// Sum of in-range contents (flow bins excluded).
    pub fn integral(&self) -> f64 {
        self.in_range_bins().into_iter().map(|b| self.content[b]).sum()
    }

    /// Sum of all contents, flow bins included.
    pub fn total_with_flows(&self) -> f64 {
        self.content.iter().sum()
    }

    /// Multiply every bin by `factor`; variances scale by `factor²`.
    pub fn scale(&mut self, factor: f64) {
        let f2 = factor * factor;
        for (c, w2) in self.content.iter_mut().zip(self.sumw2.iter_mut()) {
            *c *= factor;
            *w2 *= f2;
        }
    }
}

fn cell_count(x: &Axis, y: Option<&Axis>) -> usize {
    (x.n_bins() + 2) * y.map_or(1, |y| y.n_bins() + 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bo_core::BinEdges;

    fn axis(edges: &[f64]) -> Axis {
        Axis::new(BinEdges::new(edges.to_vec()).unwrap())
    }

    #[test]
    fn test_layout_1d() {
        let mut h = Histogram::new_1d("h", "", axis(&[0.0, 1.0, 2.0]));
        assert_eq!(h.n_cells(), 4);
        assert_eq!(h.in_range_bins(), vec![1, 2]);
        h.set_content(0, 5.0);
        h.set_content(1, 1.0);
        h.set_content(2, 2.0);
        assert_eq!(h.integral(), 3.0);
        assert_eq!(h.total_with_flows(), 8.0);
    }

    #[test]
    fn test_layout_2d() {
        let h = Histogram::new_2d("h", "", axis(&[0.0, 1.0, 2.0]), axis(&[0.0, 1.0]));
        assert_eq!(h.n_cells(), 4 * 3);
        assert_eq!(h.global_bin(1, 1), 5);
        assert_eq!(h.in_range_bins(), vec![5, 6]);
        assert_eq!(h.dimension(), 2);
    }

    #[test]
    fn test_from_parts_length_check() {
        let r = Histogram::from_parts("h", "", axis(&[0.0, 1.0]), None, vec![0.0; 2], vec![0.0; 3]);
        assert!(matches!(r, Err(Error::HistogramMismatch(_))));
    }

    #[test]
    fn test_scale_and_error() {
        let mut h = Histogram::new_1d("h", "", axis(&[0.0, 1.0]));
        h.set_content(1, 4.0);
        h.set_error(1, 2.0);
        h.scale(0.5);
        assert_eq!(h.content(1), 2.0);
        assert_eq!(h.error(1), 1.0);
    }
}
