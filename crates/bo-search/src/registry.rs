//! Best binning per category, checkpointed after each category.

use std::path::Path;

use bo_core::{Error, EvaluationResult, Result};
use serde_json::{Map, Value};

/// Ordered `category → best result` map of one channel.
///
/// File layout: `{ "<channel>": { "<category>": { "bin_edges": [..],
/// "exp_limit": .., "poi": ".." }, .. } }`, categories in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct BestBinningRegistry {
    channel: String,
    entries: Vec<(String, EvaluationResult)>,
}

impl BestBinningRegistry {
    /// Empty registry for `channel`.
    pub fn new(channel: impl Into<String>) -> Self {
        Self { channel: channel.into(), entries: Vec::new() }
    }

    /// Load the registry from `path`, or start an empty one if the file does
    /// not exist. Other channels in the file are ignored.
    pub fn load_or_new(path: &Path, channel: &str) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(channel));
        }
        let doc: Value = serde_json::from_slice(&std::fs::read(path)?)?;
        let mut registry = Self::new(channel);
        let Some(section) = doc.get(channel) else {
            return Ok(registry);
        };
        let categories = section.as_object().ok_or_else(|| {
            Error::Validation(format!(
                "{}: entry for channel '{channel}' must be an object",
                path.display()
            ))
        })?;
        for (category, value) in categories {
            let result: EvaluationResult = serde_json::from_value(value.clone())?;
            registry.entries.push((category.clone(), result));
        }
        Ok(registry)
    }

    /// Channel name.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Whether `category` already has a selected binning.
    pub fn contains(&self, category: &str) -> bool {
        self.get(category).is_some()
    }

    /// Selected binning of `category`.
    pub fn get(&self, category: &str) -> Option<&EvaluationResult> {
        self.entries.iter().find(|(c, _)| c == category).map(|(_, r)| r)
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &EvaluationResult)> {
        self.entries.iter().map(|(c, r)| (c.as_str(), r))
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no category has been finalized.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record the selection for a new category. A category is never
    /// overwritten once selected.
    pub fn insert(&mut self, category: impl Into<String>, result: EvaluationResult) -> Result<()> {
        let category = category.into();
        if self.contains(&category) {
            return Err(Error::Validation(format!(
                "category '{category}' already has a selected binning"
            )));
        }
        self.entries.push((category, result));
        Ok(())
    }

    /// JSON document for this registry.
    pub fn to_json(&self) -> Result<Value> {
        let mut categories = Map::new();
        for (category, result) in &self.entries {
            categories.insert(category.clone(), serde_json::to_value(result)?);
        }
        let mut doc = Map::new();
        doc.insert(self.channel.clone(), Value::Object(categories));
        Ok(Value::Object(doc))
    }

    /// Replace `path` with the current registry. The document is written to
    /// a sibling temporary file first and then renamed over `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);
        let mut text = serde_json::to_string_pretty(&self.to_json()?)?;
        text.push('\n');
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bo_core::BinEdges;

    fn res(limit: f64, edges: &[f64], poi: &str) -> EvaluationResult {
        EvaluationResult::new(BinEdges::new(edges.to_vec()).unwrap(), limit, poi)
    }

    #[test]
    fn test_save_and_load_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best.json");
        let mut reg = BestBinningRegistry::new("tauTau_2018");
        reg.insert("res2b", res(1.0, &[0.0, 1.0], "r")).unwrap();
        reg.insert("boosted", res(2.0, &[0.0, 0.5, 1.0], "r_qqhh")).unwrap();
        reg.save(&path).unwrap();
        assert!(!dir.path().join("best.json.tmp").exists());

        let back = BestBinningRegistry::load_or_new(&path, "tauTau_2018").unwrap();
        assert_eq!(back, reg);
        let order: Vec<_> = back.entries().map(|(c, _)| c).collect();
        assert_eq!(order, vec!["res2b", "boosted"]);
        assert_eq!(back.get("boosted").unwrap().poi, "r_qqhh");
    }

    #[test]
    fn test_missing_file_and_other_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best.json");
        assert!(BestBinningRegistry::load_or_new(&path, "a").unwrap().is_empty());

        let mut reg = BestBinningRegistry::new("a");
        reg.insert("c", res(1.0, &[0.0, 1.0], "r")).unwrap();
        reg.save(&path).unwrap();
        assert!(BestBinningRegistry::load_or_new(&path, "b").unwrap().is_empty());
    }

    #[test]
    fn test_insert_never_overwrites() {
        let mut reg = BestBinningRegistry::new("a");
        reg.insert("c", res(1.0, &[0.0, 1.0], "r")).unwrap();
        assert!(reg.insert("c", res(0.5, &[0.0, 1.0], "r")).is_err());
        assert_eq!(reg.get("c").unwrap().exp_limit, 1.0);
        assert_eq!(reg.len(), 1);
    }
}
