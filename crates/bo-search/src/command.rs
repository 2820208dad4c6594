//! Command-line backends for the solver and datacard editor seams.

use std::path::{Path, PathBuf};
use std::process::Command;

use bo_core::{CardEditor, Error, Result, Solver, SolverRun};
use serde::{Deserialize, Serialize};

/// How the limit-setting task is invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Program to run.
    pub program: String,
    /// Task name passed after `run`.
    pub task: String,
    /// Physics model passed with `--hh-model`.
    pub model: String,
    /// Extra arguments appended to every invocation.
    pub extra_args: Vec<String>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            program: "law".to_string(),
            task: "UpperLimits".to_string(),
            model: "hh_model.model_default".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// [`Solver`] that shells out to the configured task runner.
#[derive(Debug, Clone)]
pub struct CommandSolver {
    config: SolverConfig,
    working_dir: Option<PathBuf>,
}

impl CommandSolver {
    /// Create a solver running in the current directory.
    pub fn new(config: SolverConfig) -> Self {
        Self { config, working_dir: None }
    }

    /// Run every invocation inside `dir`.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Arguments of the main invocation.
    pub fn run_args(&self, run: &SolverRun) -> Vec<String> {
        let datacards =
            run.datacards.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(",");
        let mut args = vec![
            "run".to_string(),
            self.config.task.clone(),
            "--version".to_string(),
            run.run_id.clone(),
            "--hh-model".to_string(),
            self.config.model.clone(),
            "--datacards".to_string(),
            datacards,
            "--pois".to_string(),
            run.poi.clone(),
            "--scan-parameters".to_string(),
            run.scan.clone(),
        ];
        args.extend(self.config.extra_args.iter().cloned());
        args
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(args);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl Solver for CommandSolver {
    fn run(&self, run: &SolverRun) -> Result<String> {
        let args = self.run_args(run);
        log::debug!(">> {} {}", self.config.program, args.join(" "));
        run_captured(&mut self.command(&args), &self.config.program)
    }

    fn cleanup(&self, run: &SolverRun) -> Result<()> {
        let mut args = self.run_args(run);
        args.push("--remove-output".to_string());
        args.push("2,a".to_string());
        log::debug!(">> {} {}", self.config.program, args.join(" "));
        run_captured(&mut self.command(&args), &self.config.program).map(drop)
    }
}

/// Programs implementing the datacard transforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// `<program> <card> <process>...`
    pub remove_processes: String,
    /// `<program> <card> <*,process,nuisance>...`
    pub remove_parameters: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            remove_processes: "remove_processes.py".to_string(),
            remove_parameters: "remove_parameters.py".to_string(),
        }
    }
}

/// [`CardEditor`] that shells out to the removal helpers.
#[derive(Debug, Clone, Default)]
pub struct CommandCardEditor {
    config: EditorConfig,
}

impl CommandCardEditor {
    /// Create an editor from its configuration.
    pub fn new(config: EditorConfig) -> Self {
        Self { config }
    }

    fn invoke(program: &str, card: &Path, items: &[String]) -> Result<()> {
        log::debug!(">> {program} {} {}", card.display(), items.join(" "));
        let mut cmd = Command::new(program);
        cmd.arg(card).args(items);
        run_captured(&mut cmd, program).map(drop)
    }
}

impl CardEditor for CommandCardEditor {
    fn remove_processes(&self, card: &Path, processes: &[String]) -> Result<()> {
        Self::invoke(&self.config.remove_processes, card, processes)
    }

    fn remove_nuisances(&self, card: &Path, specs: &[String]) -> Result<()> {
        Self::invoke(&self.config.remove_parameters, card, specs)
    }
}

/// Run `cmd` to completion and return stdout followed by stderr.
fn run_captured(cmd: &mut Command, tool: &str) -> Result<String> {
    let output = cmd.output().map_err(|e| Error::ExternalToolFailure {
        tool: tool.to_string(),
        message: format!("failed to start: {e}"),
    })?;
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    for line in text.lines() {
        log::trace!("{tool}: {line}");
    }
    if !output.status.success() {
        return Err(Error::ExternalToolFailure {
            tool: tool.to_string(),
            message: format!("exited with {}", output.status),
        });
    }
    Ok(text)
}
