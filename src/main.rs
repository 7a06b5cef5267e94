#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::uninlined_format_args)]

mod error;
mod logging;
mod matrix_reader;
mod pipeline;
mod runner;
mod stats;
mod structs;
#[cfg(all(test, unix))]
mod test_support;
mod tools;

use clap::Parser;
use logging::LogContext;
use pipeline::orchestrator::run_pipeline;
use pipeline::output::format_coefficient;
use std::path::PathBuf;
use std::time::Duration;
use structs::{
    CorrError, ExecOptions, FailurePolicy, PipelineConfig, PipelineReport, Result, Toolchain,
};
use tracing::{error, info, warn};

/// Computes the Pearson correlation coefficient between two masks (one
/// being a seed mask and the other a statistics mask). The coefficient is
/// written to a file ending in '.pear_corr.txt'.
#[derive(Parser, Debug)]
#[command(name = "corrcomp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CIFTI-2 dense timeseries file (e.g. a subject's fMRI timeseries mapped to a surface)
    #[arg(short = 'i', long = "input", value_name = "CIFTI.dtseries.nii")]
    input: PathBuf,

    /// CIFTI-2 dense scalar file used as a seed/mask in a previous analysis
    #[arg(short = 's', long = "seed-mask", value_name = "CIFTI.dscalar.nii")]
    seed_mask: PathBuf,

    /// CIFTI-2 dense scalar statistics file from a previous analysis, to be thresholded
    #[arg(short = 'a', long = "stat-mask", value_name = "CIFTI.dscalar.nii")]
    stat_mask: PathBuf,

    /// Output prefix; the coefficient goes to <PREFIX>.pear_corr.txt
    #[arg(short = 'o', long = "output-prefix", value_name = "PREFIX")]
    out_prefix: PathBuf,

    /// Cluster threshold applied to the statistics mask
    #[arg(short = 't', long, value_name = "FLOAT", default_value_t = PipelineConfig::DEFAULT_THRESHOLD)]
    thresh: f64,

    /// Log file name
    #[arg(short = 'l', long, value_name = "LOG", default_value = "log_file.log")]
    log_file: PathBuf,

    /// Enables diagnostic log messages
    #[arg(long)]
    debug: bool,

    /// Log the commands without running them (no files are created)
    #[arg(long)]
    dry_run: bool,

    /// Pass --verbose to the FSL tools
    #[arg(short, long)]
    verbose: bool,

    /// Keep the temporary working directory
    #[arg(long)]
    keep_tmp: bool,

    /// Stop after the first stage in which an external tool fails
    #[arg(long)]
    fail_fast: bool,

    /// Kill any external tool running longer than this many seconds (0 = no limit)
    #[arg(long, value_name = "SECS", default_value = "0")]
    timeout: u64,

    /// Extra environment variable for the external tools (repeatable)
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,

    /// Connectome Workbench executable
    #[arg(long, env = "CORRCOMP_WB_COMMAND", default_value = "wb_command")]
    wb_command: String,

    /// FSL cluster executable
    #[arg(long, env = "CORRCOMP_CLUSTER", default_value = "cluster")]
    cluster: String,

    /// FSL fslmeants executable
    #[arg(long, env = "CORRCOMP_FSLMEANTS", default_value = "fslmeants")]
    fslmeants: String,
}

impl Args {
    fn into_config(self) -> PipelineConfig {
        let mut config = PipelineConfig::new(self.input, self.seed_mask, self.stat_mask, self.out_prefix);
        config.threshold = self.thresh;
        config.keep_tmp = self.keep_tmp;
        config.verbose = self.verbose;
        config.policy = if self.fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::Continue
        };
        config.exec = ExecOptions {
            dry_run: self.dry_run,
            env: self.env,
            shell: false,
            timeout: (self.timeout > 0).then(|| Duration::from_secs(self.timeout)),
        };
        config.tools = Toolchain {
            converter: self.wb_command,
            cluster: self.cluster,
            meants: self.fslmeants,
        };
        config
    }
}

fn parse_env_pair(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let args = Args::parse();

    if cfg!(windows) {
        return Err(CorrError::Config(
            "the required software (FSL) is not installable on Windows platforms".into(),
        ));
    }

    let mut log = LogContext::new(&args.log_file, args.debug);
    log.install()?;
    info!(version = env!("CARGO_PKG_VERSION"), "corrcomp starting");

    let config = args.into_config();
    if !config.exec.dry_run {
        let missing = config.tools.missing_programs();
        if !missing.is_empty() {
            return Err(CorrError::Config(format!(
                "required programs are not installed or not on PATH: {}",
                missing.join(", ")
            )));
        }
    }

    let report = run_pipeline(&config, &log)?;
    Ok(exit_code(&report))
}

/// A result file on disk is the only unambiguous success signal
fn exit_code(report: &PipelineReport) -> i32 {
    for failure in &report.failures {
        warn!("{failure}");
    }
    if report.workspace_kept {
        info!("Temporary files kept in {}", report.workspace.display());
    }

    match &report.result {
        None => 0,
        Some(result) if result.output_path.is_file() => {
            println!("{}", format_coefficient(result.coefficient));
            0
        }
        Some(result) => {
            error!("result file missing: {}", result.output_path.display());
            1
        }
    }
}
