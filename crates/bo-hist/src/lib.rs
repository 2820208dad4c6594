//! # bo-hist
//!
//! Histograms for binning optimization.
//!
//! Provides 1-D/2-D histograms with under/overflow bins, rebinning onto a
//! coarser set of edges, repair of negative bin contents, and the JSON shape
//! store read and written next to each datacard.
//!
//! ## Example
//!
//! ```no_run
//! use bo_core::BinEdges;
//! use bo_hist::{ShapeFile, rebin, repair_negative_bins};
//!
//! let shapes = ShapeFile::read("card.input.json".as_ref()).unwrap();
//! let edges = BinEdges::new(vec![0.0, 0.5, 1.0]).unwrap();
//! for h in shapes.iter() {
//!     let mut coarse = rebin(h, &edges).unwrap();
//!     let usable = repair_negative_bins(&mut coarse);
//!     println!("{}: usable={}", coarse.name, usable);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod axis;
pub mod histogram;
pub mod rebin;
pub mod repair;
pub mod shapes;

pub use axis::{Axis, EDGE_TOLERANCE};
pub use histogram::Histogram;
pub use rebin::{BadValues, rebin, rebin_2d, rebin_axes};
pub use repair::{MIN_USABLE_INTEGRAL, NEGATIVE_BIN_FLOOR, repair_negative_bins};
pub use shapes::ShapeFile;
