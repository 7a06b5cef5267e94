//! Top-level run: resolve paths, extract both regions, correlate, clean up
//!
//! Stages run strictly in order; later stages read files written by
//! earlier ones. The workspace is torn down on every exit path.

use super::output::{format_coefficient, result_path, write_coefficient};
use super::region::extract_region;
use super::workspace::Workspace;
use crate::logging::LogContext;
use crate::runner::CommandRunner;
use crate::stats::correlation::correlate;
use crate::structs::{
    CorrError, CorrelationResult, FailurePolicy, PipelineConfig, PipelineReport, Result, Stage,
    StageFailure, StageOutcome,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn};

const SEED_PREFIX: &str = "mask.seed";
const STAT_PREFIX: &str = "mask.stat";

/// Absolute forms of every caller-supplied path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub input: PathBuf,
    pub seed_mask: PathBuf,
    pub stat_mask: PathBuf,
    pub out_dir: PathBuf,
    pub out_prefix: PathBuf,
}

/// Make every input path absolute before anything else happens
///
/// # Errors
/// Returns error if the output prefix has no file name, the threshold is
/// not finite, or the current directory cannot be read
pub fn resolve(config: &PipelineConfig) -> Result<ResolvedPaths> {
    if !config.threshold.is_finite() {
        return Err(CorrError::Config(format!(
            "threshold must be a finite number, got {}",
            config.threshold
        )));
    }

    let name = config.out_prefix.file_name().ok_or_else(|| {
        CorrError::Config(format!(
            "output prefix has no file name: {}",
            config.out_prefix.display()
        ))
    })?;
    let out_dir = match config.out_prefix.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::path::absolute(parent)?,
        _ => std::env::current_dir()?,
    };

    Ok(ResolvedPaths {
        input: std::path::absolute(&config.input)?,
        seed_mask: std::path::absolute(&config.seed_mask)?,
        stat_mask: std::path::absolute(&config.stat_mask)?,
        out_prefix: out_dir.join(name),
        out_dir,
    })
}

/// Collects tool failures per stage and applies the failure policy
struct FailureLog {
    policy: FailurePolicy,
    failures: Vec<StageFailure>,
}

impl FailureLog {
    fn new(policy: FailurePolicy) -> Self {
        Self {
            policy,
            failures: Vec::new(),
        }
    }

    fn absorb<T>(&mut self, stage: Stage, outcome: StageOutcome<T>) -> Result<T> {
        let fresh = outcome.failures.len();
        self.failures.extend(
            outcome
                .failures
                .into_iter()
                .map(|failure| StageFailure { stage, failure }),
        );

        if fresh > 0 {
            warn!("{stage}: {fresh} tool invocation(s) failed");
            if self.policy == FailurePolicy::FailFast {
                return Err(self.to_error(None));
            }
        }
        Ok(outcome.output)
    }

    fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    fn to_error(&self, cause: Option<&CorrError>) -> CorrError {
        use std::fmt::Write as _;

        let mut summary = self
            .failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        if let Some(cause) = cause {
            let _ = write!(summary, "; then {cause}");
        }
        CorrError::ToolFailures {
            count: self.failures.len(),
            summary,
        }
    }
}

/// Run the whole pipeline for one input and one seed/stat mask pair
///
/// Tool failures do not abort the run under `FailurePolicy::Continue`;
/// they are listed in the report and usually leave their mark on the
/// coefficient. The workspace is removed whether the run succeeds or not,
/// unless `keep_tmp` is set.
///
/// # Errors
/// Returns error on missing tools, timeouts, I/O failures, unreadable
/// timeseries, or tool failures under `FailurePolicy::FailFast`
pub fn run_pipeline(config: &PipelineConfig, log: &LogContext) -> Result<PipelineReport> {
    let span = info_span!("corr_comp", prefix = %config.out_prefix.display());
    let _entered = span.enter();

    debug!(stage = %Stage::PathResolution);
    let paths = resolve(config)?;
    info!(
        "Processing: {}, seed mask: {}, stat mask: {}",
        file_name(&paths.input),
        file_name(&paths.seed_mask),
        file_name(&paths.stat_mask)
    );

    debug!(stage = %Stage::WorkspaceCreation);
    let workspace = if config.exec.dry_run {
        Workspace::plan(&paths.out_dir)
    } else {
        Workspace::create(&paths.out_dir, config.keep_tmp)?
    };
    let workspace_path = workspace.path().to_path_buf();
    let workspace_kept = workspace.is_kept() && !config.exec.dry_run;

    let mut failures = FailureLog::new(config.policy);
    let staged = run_stages(config, log, &paths, &workspace_path, &mut failures);

    debug!(stage = %Stage::Cleanup);
    let result = match (staged, workspace.close()) {
        (Ok(result), Ok(())) => result,
        (Ok(_), Err(e)) => return Err(e),
        (Err(e), cleanup) => {
            if let Err(cleanup) = cleanup {
                warn!("cleanup after failed run also failed: {cleanup}");
            }
            return Err(e);
        }
    };

    debug!(stage = %Stage::Done);
    Ok(PipelineReport {
        result,
        failures: failures.failures,
        workspace: workspace_path,
        workspace_kept,
    })
}

fn run_stages(
    config: &PipelineConfig,
    log: &LogContext,
    paths: &ResolvedPaths,
    workspace: &Path,
    failures: &mut FailureLog,
) -> Result<Option<CorrelationResult>> {
    let runner = CommandRunner::new(log, &config.exec).in_dir(workspace);

    info!(stage = %Stage::SeedExtraction, "Extracting seed mask timeseries");
    let seed = extract_region(
        &runner,
        &config.tools,
        &paths.input,
        &workspace.join(SEED_PREFIX),
        &paths.seed_mask,
        0.0,
        config.verbose,
    )?;
    let seed_matrix = failures.absorb(Stage::SeedExtraction, seed)?;

    info!(stage = %Stage::StatExtraction, "Extracting stat mask timeseries");
    let stat = extract_region(
        &runner,
        &config.tools,
        &paths.input,
        &workspace.join(STAT_PREFIX),
        &paths.stat_mask,
        config.threshold,
        config.verbose,
    )?;
    let stat_matrix = failures.absorb(Stage::StatExtraction, stat)?;

    if config.exec.dry_run {
        info!("Dry run: skipping correlation and result file");
        return Ok(None);
    }

    let coefficient = match correlate(&seed_matrix, &stat_matrix) {
        Ok(coefficient) => coefficient,
        Err(e) if !failures.is_empty() => return Err(failures.to_error(Some(&e))),
        Err(e) => return Err(e),
    };
    info!(
        stage = %Stage::Correlation,
        "Pearson correlation coefficient: {}",
        format_coefficient(coefficient)
    );

    let output_path = write_coefficient(&result_path(&paths.out_prefix), coefficient)?;
    info!(stage = %Stage::ResultPersistence, "Wrote {}", output_path.display());

    Ok(Some(CorrelationResult {
        coefficient,
        output_path,
    }))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_bare_prefix_uses_current_dir() {
        let config = PipelineConfig::new("in.dtseries.nii", "seed.nii", "stat.nii", "sub-01");
        let paths = resolve(&config).expect("resolve");
        let cwd = std::env::current_dir().expect("cwd");

        assert_eq!(paths.out_dir, cwd);
        assert_eq!(paths.out_prefix, cwd.join("sub-01"));
        assert_eq!(paths.input, cwd.join("in.dtseries.nii"));
        assert!(paths.seed_mask.is_absolute());
    }

    #[test]
    fn test_resolve_keeps_absolute_prefix() {
        let config = PipelineConfig::new("/d/in.nii", "/d/seed.nii", "/d/stat.nii", "/out/run/sub-01");
        let paths = resolve(&config).expect("resolve");
        assert_eq!(paths.out_dir, PathBuf::from("/out/run"));
        assert_eq!(paths.out_prefix, PathBuf::from("/out/run/sub-01"));
    }

    #[test]
    fn test_resolve_rejects_non_finite_threshold() {
        let mut config = PipelineConfig::new("a", "b", "c", "d");
        config.threshold = f64::NAN;
        assert!(matches!(resolve(&config), Err(CorrError::Config(_))));
    }

    #[test]
    fn test_fail_fast_log_stops_on_first_failure() {
        let mut log = FailureLog::new(FailurePolicy::FailFast);
        let mut outcome = StageOutcome::new(());
        outcome.failures.push(crate::structs::ToolFailure {
            program: "cluster".into(),
            exit_code: 1,
            command: "cluster --no_table".into(),
        });

        let err = log.absorb(Stage::StatExtraction, outcome).expect_err("fail fast");
        assert!(
            matches!(err, CorrError::ToolFailures { count: 1, ref summary } if summary.contains("stat-extraction"))
        );
    }

    #[test]
    fn test_continue_log_keeps_going() {
        let mut log = FailureLog::new(FailurePolicy::Continue);
        let mut outcome = StageOutcome::new(7);
        outcome.failures.push(crate::structs::ToolFailure {
            program: "fslmeants".into(),
            exit_code: 255,
            command: "fslmeants -i x".into(),
        });

        assert_eq!(log.absorb(Stage::SeedExtraction, outcome).expect("continue"), 7);
        assert!(!log.is_empty());
    }
}
