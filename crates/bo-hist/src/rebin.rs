//! Rebinning onto a coarser set of bin edges.
//!
//! The new edges must be a coarsening of the old ones: every old bin,
//! including the two flow bins per axis, must fall entirely into one new bin.

use bo_core::{BinEdges, Error, Result};

use crate::axis::{Axis, edges_match};
use crate::histogram::Histogram;

/// Rebin a 1-D histogram onto `new_x`.
pub fn rebin(old: &Histogram, new_x: &BinEdges) -> Result<Histogram> {
    rebin_axes(old, new_x, None)
}

/// Rebin a 2-D histogram onto `new_x` × `new_y`.
pub fn rebin_2d(old: &Histogram, new_x: &BinEdges, new_y: &BinEdges) -> Result<Histogram> {
    rebin_axes(old, new_x, Some(new_y))
}

/// Rebin `old` onto the given per-axis edges. The number of edge sets must
/// match the histogram dimension.
pub fn rebin_axes(old: &Histogram, new_x: &BinEdges, new_y: Option<&BinEdges>) -> Result<Histogram> {
    let requested = if new_y.is_some() { 2 } else { 1 };
    if old.dimension() != requested {
        return Err(Error::UnsupportedDimension(format!(
            "histogram '{}' has {} dimension(s) but {requested} axis binning(s) were requested",
            old.name,
            old.dimension()
        )));
    }

    let x = Axis::new(new_x.clone());
    let x_map = bin_map("x", old.x_axis(), &x)?;

    let new = match (old.y_axis(), new_y) {
        (Some(old_y), Some(new_y)) => {
            let y = Axis::new(new_y.clone());
            let y_map = bin_map("y", old_y, &y)?;
            let mut new = Histogram::new_2d(old.name.clone(), old.title.clone(), x, y);
            for (iy_old, &iy_new) in y_map.iter().enumerate() {
                for (ix_old, &ix_new) in x_map.iter().enumerate() {
                    let src = old.global_bin(ix_old, iy_old);
                    let dst = new.global_bin(ix_new, iy_new);
                    new.add_to_bin(dst, old.content(src), old.sumw2(src));
                }
            }
            new
        }
        _ => {
            let mut new = Histogram::new_1d(old.name.clone(), old.title.clone(), x);
            for (ix_old, &ix_new) in x_map.iter().enumerate() {
                new.add_to_bin(ix_new, old.content(ix_old), old.sumw2(ix_old));
            }
            new
        }
    };

    report_bad_values(&new);
    Ok(new)
}

/// Map every old bin (flows included) to the new bin that contains it.
fn bin_map(axis: &'static str, old: &Axis, new: &Axis) -> Result<Vec<usize>> {
    if !(new.min() <= old.min() && old.max() <= new.max()) {
        return Err(Error::IncompatibleRange {
            axis,
            old_min: old.min(),
            old_max: old.max(),
            new_min: new.min(),
            new_max: new.max(),
        });
    }

    (0..old.n_bins() + 2)
        .map(|bin| {
            let old_low = old.low_edge(bin);
            let old_high = old.up_edge(bin);
            let new_low_bin = new.locate(old_low);
            let new_high_bin = new.locate(old_high);
            if new_low_bin != new_high_bin && !edges_match(old_high, new.up_edge(new_low_bin)) {
                log::debug!("old {axis} bins: {}", old.edges());
                return Err(Error::IncompatibleBinEdges { axis, old_low, old_high });
            }
            Ok(new_low_bin)
        })
        .collect()
}

/// Kinds of suspicious bin contents found in a histogram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BadValues {
    /// Some bin is NaN.
    pub nan: bool,
    /// Some bin is infinite.
    pub infinite: bool,
    /// Some bin is negative.
    pub negative: bool,
}

impl BadValues {
    /// Scan every bin of `hist`, flows included.
    pub fn scan(hist: &Histogram) -> Self {
        let values = hist.contents();
        Self {
            nan: values.iter().any(|v| v.is_nan()),
            infinite: values.iter().any(|v| v.is_infinite()),
            negative: values.iter().any(|&v| v < 0.0),
        }
    }

    /// Whether nothing suspicious was found.
    pub fn is_clean(&self) -> bool {
        !(self.nan || self.infinite || self.negative)
    }
}

fn report_bad_values(hist: &Histogram) {
    let found = BadValues::scan(hist);
    if found.nan {
        log::warn!("NaN found in rebinned histogram '{}'", hist.name);
    }
    if found.infinite {
        log::warn!("Inf found in rebinned histogram '{}'", hist.name);
    }
    if found.negative {
        log::warn!("Negative values found in rebinned histogram '{}'", hist.name);
    }
}
