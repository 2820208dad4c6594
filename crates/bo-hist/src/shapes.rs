//! Shape store: the set of named histograms that accompanies a datacard.
//!
//! On disk this is a JSON document
//!
//! ```json
//! { "histograms": { "<name>": { "title": "", "axes": [[0, 1, 2]],
//!                               "content": [..], "sumw2": [..] } } }
//! ```
//!
//! with `content` / `sumw2` covering every bin including the flow bins in
//! global-bin order. A missing `sumw2` defaults to `|content|`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use bo_core::{BinEdges, Error, Result};
use serde::{Deserialize, Serialize};

use crate::axis::Axis;
use crate::histogram::Histogram;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HistogramRecord {
    #[serde(default)]
    title: String,
    axes: Vec<BinEdges>,
    content: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sumw2: Option<Vec<f64>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ShapeDocument {
    histograms: BTreeMap<String, HistogramRecord>,
}

impl HistogramRecord {
    fn into_histogram(self, name: &str) -> Result<Histogram> {
        let mut axes = self.axes.into_iter().map(Axis::new);
        let (x, y) = match (axes.next(), axes.next(), axes.next()) {
            (Some(x), y, None) => (x, y),
            _ => {
                return Err(Error::UnsupportedDimension(format!(
                    "stored histogram '{name}' must have 1 or 2 axes"
                )));
            }
        };
        let sumw2 = self.sumw2.unwrap_or_else(|| self.content.iter().map(|c| c.abs()).collect());
        Histogram::from_parts(name, self.title, x, y, self.content, sumw2)
    }

    fn from_histogram(h: &Histogram) -> Self {
        let mut axes = vec![h.x_axis().edges().clone()];
        if let Some(y) = h.y_axis() {
            axes.push(y.edges().clone());
        }
        Self {
            title: h.title.clone(),
            axes,
            content: h.contents().to_vec(),
            sumw2: Some(h.variances().to_vec()),
        }
    }
}

/// Named histograms, iterated in name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeFile {
    histograms: BTreeMap<String, Histogram>,
}

impl ShapeFile {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a shape store from disk.
    pub fn read(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let doc: ShapeDocument = serde_json::from_reader(reader)?;
        let histograms = doc
            .histograms
            .into_iter()
            .map(|(name, rec)| rec.into_histogram(&name).map(|h| (name, h)))
            .collect::<Result<_>>()?;
        Ok(Self { histograms })
    }

    /// Write the store to disk, replacing any existing file.
    pub fn write(&self, path: &Path) -> Result<()> {
        let doc = ShapeDocument {
            histograms: self
                .histograms
                .iter()
                .map(|(name, h)| (name.clone(), HistogramRecord::from_histogram(h)))
                .collect(),
        };
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, &doc)?;
        writer.flush()?;
        Ok(())
    }

    /// Insert or replace a histogram under its own name.
    pub fn insert(&mut self, hist: Histogram) {
        self.histograms.insert(hist.name.clone(), hist);
    }

    /// Histogram by name.
    pub fn get(&self, name: &str) -> Option<&Histogram> {
        self.histograms.get(name)
    }

    /// Whether a histogram with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.histograms.contains_key(name)
    }

    /// Histogram names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.histograms.keys().map(String::as_str)
    }

    /// Histograms in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Histogram> {
        self.histograms.values()
    }

    /// Number of histograms.
    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shapes.input.json");
        let x = Axis::new(BinEdges::new(vec![0.0, 0.5, 1.0]).unwrap());
        let h = Histogram::from_parts("sig", "signal", x, None, vec![0.0, 1.0, 2.0, 0.5], vec![0.0, 1.0, 2.0, 0.5])
            .unwrap();
        let mut store = ShapeFile::new();
        store.insert(h.clone());
        store.write(&path).unwrap();

        let back = ShapeFile::read(&path).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.get("sig"), Some(&h));
    }

    #[test]
    fn test_default_sumw2_and_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(
            &path,
            r#"{"histograms": {
                "b": {"axes": [[0, 1]], "content": [0, -2, 0]},
                "a": {"axes": [[0, 1]], "content": [0, 3, 0]}
            }}"#,
        )
        .unwrap();
        let store = ShapeFile::read(&path).unwrap();
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(store.get("b").unwrap().sumw2(1), 2.0);
        assert_eq!(store.get("a").unwrap().name, "a");
    }

    #[test]
    fn test_three_axes_are_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(
            &path,
            r#"{"histograms": {"h": {"axes": [[0, 1], [0, 1], [0, 1]], "content": []}}}"#,
        )
        .unwrap();
        assert!(matches!(ShapeFile::read(&path), Err(Error::UnsupportedDimension(_))));
    }

    #[test]
    fn test_content_length_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(&path, r#"{"histograms": {"h": {"axes": [[0, 1]], "content": [1]}}}"#).unwrap();
        assert!(matches!(ShapeFile::read(&path), Err(Error::HistogramMismatch(_))));
    }
}
