//! Optional run configuration (`--config`).

use std::path::Path;

use anyhow::Result;
use bo_search::evaluator::DEFAULT_SCAN_PARAMETERS;
use bo_search::{EditorConfig, EvaluatorOptions, SolverConfig};
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub solver: SolverSection,
    pub editor: EditorConfig,
    pub nuisance_prefix: Option<String>,
    pub card_pattern: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SolverSection {
    #[serde(flatten)]
    pub command: SolverConfig,
    pub scan_parameters: Option<String>,
}

impl RunConfig {
    pub fn evaluator_options(&self) -> EvaluatorOptions {
        let mut options = EvaluatorOptions::default();
        if let Some(prefix) = &self.nuisance_prefix {
            options.nuisance_prefix = prefix.clone();
        }
        options.scan_parameters =
            self.solver.scan_parameters.clone().unwrap_or_else(|| DEFAULT_SCAN_PARAMETERS.to_string());
        options
    }
}

pub fn read_run_config(path: Option<&Path>) -> Result<RunConfig> {
    let Some(path) = path else {
        return Ok(RunConfig::default());
    };
    let bytes = std::fs::read(path)?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    let cfg: RunConfig = if ext == "json" {
        serde_json::from_slice(&bytes)?
    } else {
        serde_yaml_ng::from_slice(&bytes)?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(
            &path,
            "solver:\n  program: /opt/law\n  scan_parameters: kl,-5,5,11\nnuisance_prefix: sys_\n",
        )
        .unwrap();
        let cfg = read_run_config(Some(&path)).unwrap();
        assert_eq!(cfg.solver.command.program, "/opt/law");
        assert_eq!(cfg.solver.command.task, "UpperLimits");
        assert_eq!(cfg.editor, EditorConfig::default());
        let options = cfg.evaluator_options();
        assert_eq!(options.nuisance_prefix, "sys_");
        assert_eq!(options.scan_parameters, "kl,-5,5,11");
    }

    #[test]
    fn test_json_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, r#"{"card_pattern": "hh_{category}_{channel}.txt"}"#).unwrap();
        let cfg = read_run_config(Some(&path)).unwrap();
        assert_eq!(cfg.card_pattern.as_deref(), Some("hh_{category}_{channel}.txt"));
        assert_eq!(read_run_config(None).unwrap().evaluator_options(), EvaluatorOptions::default());
    }
}
