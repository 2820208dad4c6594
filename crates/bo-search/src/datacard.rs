//! Datacard naming conventions and shape-name classification.

use std::fmt;
use std::path::{Path, PathBuf};

use bo_core::{Error, Result};
use regex::Regex;

/// Prefix that starts every nuisance name in a systematic-variation shape.
pub const DEFAULT_NUISANCE_PREFIX: &str = "CMS_";

/// Datacard file name pattern inside the input directory.
pub const DEFAULT_CARD_PATTERN: &str = "{category}_{channel}.txt";

/// Suffix of the shape store that accompanies a datacard.
pub const SHAPES_SUFFIX: &str = ".input.json";

/// Datacard file name for `category` / `channel`.
pub fn card_file_name(pattern: &str, category: &str, channel: &str) -> String {
    pattern.replace("{category}", category).replace("{channel}", channel)
}

/// Shape store next to `card`: `<dir>/<stem>.input.json`.
pub fn shapes_path(card: &Path) -> Result<PathBuf> {
    let stem = card_stem(card)?;
    Ok(card.with_file_name(format!("{stem}{SHAPES_SUFFIX}")))
}

/// File stem of a datacard path.
pub fn card_stem(card: &Path) -> Result<&str> {
    card.file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Validation(format!("invalid datacard path '{}'", card.display())))
}

/// Direction of a systematic variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `...Up`
    Up,
    /// `...Down`
    Down,
}

/// What a histogram in the shape store represents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeKind {
    /// Nominal shape of a process.
    Central {
        /// Process name.
        process: String,
    },
    /// Shifted shape of a process for one nuisance.
    Variation {
        /// Process name.
        process: String,
        /// Nuisance name (starts with the configured prefix).
        nuisance: String,
        /// Shift direction.
        direction: Direction,
    },
}

impl ShapeKind {
    /// Process the shape belongs to.
    pub fn process(&self) -> &str {
        match self {
            ShapeKind::Central { process } | ShapeKind::Variation { process, .. } => process,
        }
    }
}

/// Splits shape names of the form `<process>_<nuisance>(Up|Down)`.
#[derive(Debug, Clone)]
pub struct ShapeClassifier {
    pattern: Regex,
}

impl ShapeClassifier {
    /// Classifier for nuisances starting with `prefix`.
    pub fn new(prefix: &str) -> Result<Self> {
        let pattern = Regex::new(&format!("^(.*)_({}.*)(Up|Down)$", regex::escape(prefix)))
            .map_err(|e| Error::Validation(format!("invalid nuisance prefix '{prefix}': {e}")))?;
        Ok(Self { pattern })
    }

    /// Classify one histogram name. Names that do not match the variation
    /// pattern are central shapes.
    pub fn classify(&self, name: &str) -> ShapeKind {
        match self.pattern.captures(name) {
            Some(c) => ShapeKind::Variation {
                process: c[1].to_string(),
                nuisance: c[2].to_string(),
                direction: if &c[3] == "Up" { Direction::Up } else { Direction::Down },
            },
            None => ShapeKind::Central { process: name.to_string() },
        }
    }
}

/// A `(process, nuisance)` pair removed from a datacard. Displays as the
/// `*,<process>,<nuisance>` spec understood by the parameter-removal helper.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NuisanceRef {
    /// Process name.
    pub process: String,
    /// Nuisance name.
    pub nuisance: String,
}

impl fmt::Display for NuisanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "*,{},{}", self.process, self.nuisance)
    }
}
