//! Seed binnings supplied from outside the search (e.g. previous rounds).

use std::collections::BTreeMap;
use std::path::Path;

use bo_core::{BinEdges, Error, Result};
use serde_json::Value;

/// One suggestion entry as found in a suggestion file.
#[derive(Debug, Clone, PartialEq)]
pub enum Suggestion {
    /// A flat array of numbers.
    SingleBinning(BinEdges),
    /// An array of arrays of numbers.
    MultiBinning(Vec<BinEdges>),
    /// An object carrying a `bin_edges` field (a registry or log record).
    LegacyRecord(BinEdges),
}

impl Suggestion {
    /// Parse one `channel → category → entry` value.
    pub fn parse(value: &Value, source_file: &Path, category: &str) -> Result<Self> {
        let unrecognized = || Error::UnrecognizedSuggestionFormat {
            source_file: source_file.to_path_buf(),
            category: category.to_string(),
        };
        match value {
            Value::Array(items) if items.first().is_some_and(Value::is_array) => items
                .iter()
                .map(|item| edges_from_value(item).ok_or_else(unrecognized)?)
                .collect::<Result<Vec<_>>>()
                .map(Suggestion::MultiBinning),
            Value::Array(items) if items.is_empty() => Ok(Suggestion::MultiBinning(Vec::new())),
            Value::Array(_) => {
                edges_from_value(value).ok_or_else(unrecognized)?.map(Suggestion::SingleBinning)
            }
            Value::Object(fields) => fields
                .get("bin_edges")
                .and_then(edges_from_value)
                .ok_or_else(unrecognized)?
                .map(Suggestion::LegacyRecord),
            _ => Err(unrecognized()),
        }
    }

    /// Flatten into a list of binnings.
    pub fn into_binnings(self) -> Vec<BinEdges> {
        match self {
            Suggestion::SingleBinning(e) | Suggestion::LegacyRecord(e) => vec![e],
            Suggestion::MultiBinning(v) => v,
        }
    }
}

/// `None` when `value` is not an array of numbers; otherwise the validated
/// edges.
fn edges_from_value(value: &Value) -> Option<Result<BinEdges>> {
    let edges = value.as_array()?.iter().map(Value::as_f64).collect::<Option<Vec<_>>>()?;
    Some(BinEdges::new(edges))
}

/// Suggested binnings per category for one channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSuggestions {
    by_category: BTreeMap<String, Vec<BinEdges>>,
}

impl CandidateSuggestions {
    /// Empty set of suggestions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the suggestions for `channel` from every file in `paths`.
    pub fn from_files<P: AsRef<Path>>(paths: &[P], channel: &str) -> Result<Self> {
        let mut out = Self::new();
        for path in paths {
            let path = path.as_ref();
            let doc: Value = serde_json::from_slice(&std::fs::read(path)?)?;
            out.add_document(&doc, path, channel)?;
        }
        Ok(out)
    }

    /// Merge the `channel` section of one parsed suggestion document.
    pub fn add_document(&mut self, doc: &Value, source_file: &Path, channel: &str) -> Result<()> {
        let Some(section) = doc.get(channel) else {
            return Ok(());
        };
        let Some(categories) = section.as_object() else {
            return Err(Error::UnrecognizedSuggestionFormat {
                source_file: source_file.to_path_buf(),
                category: String::new(),
            });
        };
        for (category, entry) in categories {
            let binnings = Suggestion::parse(entry, source_file, category)?.into_binnings();
            self.by_category.entry(category.clone()).or_default().extend(binnings);
        }
        Ok(())
    }

    /// Add one binning for `category`.
    pub fn push(&mut self, category: &str, edges: BinEdges) {
        self.by_category.entry(category.to_string()).or_default().push(edges);
    }

    /// Suggestions for `category` (empty if none).
    pub fn for_category(&self, category: &str) -> &[BinEdges] {
        self.by_category.get(category).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether there is at least one suggestion entry for `category`.
    pub fn has_category(&self, category: &str) -> bool {
        self.by_category.contains_key(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn src() -> &'static Path {
        Path::new("suggest.json")
    }

    #[test]
    fn test_parse_variants() {
        let s = Suggestion::parse(&json!([0.0, 0.5, 1.0]), src(), "c").unwrap();
        assert!(matches!(s, Suggestion::SingleBinning(ref e) if e.n_bins() == 2));

        let s = Suggestion::parse(&json!([[0, 1], [0, 0.5, 1]]), src(), "c").unwrap();
        assert_eq!(s.into_binnings().len(), 2);

        let s = Suggestion::parse(&json!({"bin_edges": [0, 1], "exp_limit": 2.0}), src(), "c").unwrap();
        assert!(matches!(s, Suggestion::LegacyRecord(_)));

        let s = Suggestion::parse(&json!([]), src(), "c").unwrap();
        assert!(s.into_binnings().is_empty());
    }

    #[test]
    fn test_unrecognized_formats() {
        for bad in [json!("0,1"), json!(3), json!({"edges": [0, 1]}), json!([[0, 1], 2]), json!([0, "x"])] {
            let err = Suggestion::parse(&bad, src(), "cat").unwrap_err();
            assert!(
                matches!(err, Error::UnrecognizedSuggestionFormat { ref category, .. } if category == "cat"),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn test_unsorted_edges_are_invalid() {
        let err = Suggestion::parse(&json!([1, 0]), src(), "c").unwrap_err();
        assert!(matches!(err, Error::InvalidBinEdges(_)));
    }

    #[test]
    fn test_documents_merge_per_channel() {
        let mut s = CandidateSuggestions::new();
        let a = json!({"eTau_2018": {"res2b": [0, 0.5, 1], "boosted": {"bin_edges": [0, 1]}},
                       "muTau_2018": {"res2b": [0, 1]}});
        let b = json!({"eTau_2018": {"res2b": [[0, 0.25, 1], [0, 0.75, 1]]}});
        s.add_document(&a, src(), "eTau_2018").unwrap();
        s.add_document(&b, src(), "eTau_2018").unwrap();
        assert_eq!(s.for_category("res2b").len(), 3);
        assert_eq!(s.for_category("boosted").len(), 1);
        assert!(s.for_category("res1b").is_empty());
        assert!(!s.has_category("res1b"));
    }

    #[test]
    fn test_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best.json");
        std::fs::write(&path, r#"{"ch": {"cat": {"bin_edges": [0, 0.3, 1], "exp_limit": 1.2, "poi": "r"}}}"#)
            .unwrap();
        let s = CandidateSuggestions::from_files(&[&path], "ch").unwrap();
        assert_eq!(s.for_category("cat")[0].as_slice(), &[0.0, 0.3, 1.0]);
        let s = CandidateSuggestions::from_files(&[&path], "other").unwrap();
        assert_eq!(s, CandidateSuggestions::new());
    }
}
