//! Consolidated public types for the corrcomp crate
//!
//! This module contains the command, execution, stage and configuration
//! types shared across the pipeline.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use crate::error::{CorrError, Result};

// ============================================================================
// Command Types
// ============================================================================

/// One external program invocation: the program followed by its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl ToolCommand {
    #[must_use]
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    #[must_use]
    pub fn program(&self) -> &OsStr {
        &self.program
    }

    #[must_use]
    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Program name as display text
    #[must_use]
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Render as a single line, quoting tokens the shell would split
    #[must_use]
    pub fn render(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|token| quote_token(&token.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn quote_token(token: &str) -> String {
    let plain = !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        token.to_string()
    } else {
        format!("'{}'", token.replace('\'', r"'\''"))
    }
}

/// Append a literal suffix to a path without touching its extension
#[must_use]
pub fn suffixed(prefix: &Path, suffix: &str) -> PathBuf {
    let mut joined = prefix.as_os_str().to_os_string();
    joined.push(suffix);
    PathBuf::from(joined)
}

/// Float text as the reference tool prints it: `2.0`, `0.25`, `1.23e-05`,
/// `1e+16`, `nan`, `-inf`
#[must_use]
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let text = format!("{value:?}");
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}

// ============================================================================
// Execution Types
// ============================================================================

/// Options shared by every external tool invocation in a run
///
/// Whether command lines log at DEBUG or INFO is decided by the
/// `LogContext` the runner is given.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Log commands without spawning anything
    pub dry_run: bool,
    /// Extra environment variables layered over the inherited environment
    pub env: Vec<(String, String)>,
    /// Run through `sh -c`; stdout is not captured in this mode
    pub shell: bool,
    /// Kill a tool that runs longer than this
    pub timeout: Option<Duration>,
}

/// Result of executing one `ToolCommand`
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub stdout_path: Option<PathBuf>,
    pub stderr_path: Option<PathBuf>,
    pub log_path: PathBuf,
}

impl ExecutionResult {
    /// Synthetic success returned by dry runs
    #[must_use]
    pub fn dry_run(log_path: &Path) -> Self {
        Self {
            exit_code: 0,
            stdout: None,
            stderr: None,
            stdout_path: None,
            stderr_path: None,
            log_path: log_path.to_path_buf(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A tool that ran but exited non-zero
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    pub program: String,
    pub exit_code: i32,
    pub command: String,
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} exited with code {}", self.program, self.exit_code)
    }
}

/// Output of a pipeline component together with any tool failures it saw
#[derive(Debug, Clone)]
pub struct StageOutcome<T> {
    pub output: T,
    pub failures: Vec<ToolFailure>,
}

impl<T> StageOutcome<T> {
    #[must_use]
    pub fn new(output: T) -> Self {
        Self {
            output,
            failures: Vec::new(),
        }
    }

    /// Record `result` as a failure if the tool exited non-zero
    pub fn record(&mut self, command: &ToolCommand, result: &ExecutionResult) {
        if !result.is_success() {
            self.failures.push(ToolFailure {
                program: command.program_name(),
                exit_code: result.exit_code,
                command: command.render(),
            });
        }
    }

    /// Take over the failures of a nested step, returning its output
    pub fn absorb<U>(&mut self, nested: StageOutcome<U>) -> U {
        self.failures.extend(nested.failures);
        nested.output
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ============================================================================
// Pipeline Types
// ============================================================================

/// Orchestrator states, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PathResolution,
    WorkspaceCreation,
    SeedExtraction,
    StatExtraction,
    Correlation,
    ResultPersistence,
    Cleanup,
    Done,
}

impl Stage {
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::PathResolution => "path-resolution",
            Self::WorkspaceCreation => "workspace-creation",
            Self::SeedExtraction => "seed-extraction",
            Self::StatExtraction => "stat-extraction",
            Self::Correlation => "correlation",
            Self::ResultPersistence => "result-persistence",
            Self::Cleanup => "cleanup",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A tool failure attributed to the stage it happened in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: Stage,
    pub failure: ToolFailure,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.failure)
    }
}

/// What to do once a tool exits non-zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log it and let the final coefficient reflect the damage
    #[default]
    Continue,
    /// Stop after the stage that saw the failure
    FailFast,
}

/// Names of the three external programs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Connectome Workbench, used for `-cifti-convert -to-nifti`
    pub converter: String,
    /// FSL `cluster`
    pub cluster: String,
    /// FSL `fslmeants`
    pub meants: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            converter: "wb_command".to_string(),
            cluster: "cluster".to_string(),
            meants: "fslmeants".to_string(),
        }
    }
}

/// Everything one orchestrator run needs
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// CIFTI dense timeseries
    pub input: PathBuf,
    pub seed_mask: PathBuf,
    pub stat_mask: PathBuf,
    /// `<out_prefix>.pear_corr.txt` receives the coefficient
    pub out_prefix: PathBuf,
    /// Cluster threshold applied to the stat mask only
    pub threshold: f64,
    pub keep_tmp: bool,
    /// Pass `--verbose` to the FSL tools
    pub verbose: bool,
    pub policy: FailurePolicy,
    pub exec: ExecOptions,
    pub tools: Toolchain,
}

impl PipelineConfig {
    pub const DEFAULT_THRESHOLD: f64 = 1.77;

    #[must_use]
    pub fn new(
        input: impl Into<PathBuf>,
        seed_mask: impl Into<PathBuf>,
        stat_mask: impl Into<PathBuf>,
        out_prefix: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input: input.into(),
            seed_mask: seed_mask.into(),
            stat_mask: stat_mask.into(),
            out_prefix: out_prefix.into(),
            threshold: Self::DEFAULT_THRESHOLD,
            keep_tmp: false,
            verbose: false,
            policy: FailurePolicy::default(),
            exec: ExecOptions::default(),
            tools: Toolchain::default(),
        }
    }
}

/// Final artifact of a run
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationResult {
    pub coefficient: f64,
    pub output_path: PathBuf,
}

/// Everything a caller needs to judge a run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// `None` on dry runs
    pub result: Option<CorrelationResult>,
    pub failures: Vec<StageFailure>,
    pub workspace: PathBuf,
    pub workspace_kept: bool,
}

impl PipelineReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ============================================================================
// Stats Types
// ============================================================================

/// Descriptive statistics for one scalar timeseries
#[derive(Debug, Clone)]
pub struct SeriesSummary {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl SeriesSummary {
    /// A constant series has no variance to correlate against
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_constant(&self) -> bool {
        self.std_dev == 0.0
    }

    /// Format as a summary string
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "n={}, mean={:.4}, std={:.4}, min={:.4}, max={:.4}",
            self.count, self.mean, self.std_dev, self.min, self.max
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_quotes_only_when_needed() {
        let cmd = ToolCommand::new("wb_command")
            .args(["-cifti-convert", "-to-nifti"])
            .arg("/data/my file.dtseries.nii")
            .arg("--thresh=1.77");

        assert_eq!(
            cmd.render(),
            "wb_command -cifti-convert -to-nifti '/data/my file.dtseries.nii' --thresh=1.77"
        );
    }

    #[test]
    fn test_render_escapes_single_quotes() {
        let cmd = ToolCommand::new("echo").arg("it's");
        assert_eq!(cmd.render(), r"echo 'it'\''s'");
    }

    #[test]
    fn test_suffixed_keeps_dots() {
        let p = suffixed(Path::new("/tmp/ws/mask.seed"), ".mask.nii.gz");
        assert_eq!(p, PathBuf::from("/tmp/ws/mask.seed.mask.nii.gz"));
    }

    #[test]
    fn test_format_float_pads_exponent() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(1.77), "1.77");
        assert_eq!(format_float(1.23e-5), "1.23e-05");
        assert_eq!(format_float(-0.00005), "-5e-05");
        assert_eq!(format_float(1e16), "1e+16");
        assert_eq!(format_float(1.5e-300), "1.5e-300");
        assert_eq!(format_float(f64::NAN), "nan");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn test_stage_outcome_records_only_failures() {
        let cmd = ToolCommand::new("cluster").arg("--no_table");
        let mut outcome = StageOutcome::new(());

        let ok = ExecutionResult::dry_run(Path::new("x.log"));
        outcome.record(&cmd, &ok);
        assert!(outcome.is_clean());

        let failed = ExecutionResult {
            exit_code: 2,
            ..ok
        };
        outcome.record(&cmd, &failed);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].to_string(), "cluster exited with code 2");
    }

    #[test]
    fn test_absorb_moves_failures_up() {
        let mut outer = StageOutcome::new(1);
        let mut inner = StageOutcome::new("inner");
        inner.failures.push(ToolFailure {
            program: "fslmeants".into(),
            exit_code: 1,
            command: "fslmeants -i a".into(),
        });

        let value = outer.absorb(inner);
        assert_eq!(value, "inner");
        assert_eq!(outer.failures.len(), 1);
    }
}
