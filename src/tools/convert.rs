//! CIFTI to NIFTI conversion via `wb_command -cifti-convert -to-nifti`

use crate::runner::CommandRunner;
use crate::structs::{Result, StageOutcome, ToolCommand, Toolchain};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Intermediate path the converter writes before the optional threshold pass
///
/// `out.nii.gz` becomes `out.tmp.nii.gz`, `out.nii` becomes `out.tmp.nii`,
/// anything else gets `.tmp` appended.
#[must_use]
pub fn temp_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let tmp = if let Some(stem) = name.strip_suffix(".nii.gz") {
        format!("{stem}.tmp.nii.gz")
    } else if let Some(stem) = name.strip_suffix(".nii") {
        format!("{stem}.tmp.nii")
    } else {
        format!("{name}.tmp")
    };
    output.with_file_name(tmp)
}

#[must_use]
pub fn convert_command(tools: &Toolchain, native: &Path, raster_out: &Path) -> ToolCommand {
    ToolCommand::new(&tools.converter)
        .args(["-cifti-convert", "-to-nifti"])
        .arg(native)
        .arg(raster_out)
}

/// Convert `native` to a raster at `output`, thresholding it when
/// `threshold` is non-zero.
///
/// With a zero threshold the converted file is renamed into place; with a
/// non-zero one the cluster tool reads the intermediate file and writes
/// `output`. The intermediate file is left to the workspace cleanup.
///
/// # Errors
/// Returns error if a tool cannot be run or the rename fails
#[allow(clippy::float_cmp)]
pub fn convert(
    runner: &CommandRunner,
    tools: &Toolchain,
    native: &Path,
    output: &Path,
    threshold: f64,
    verbose: bool,
) -> Result<StageOutcome<PathBuf>> {
    let tmp = temp_path(output);
    let command = convert_command(tools, native, &tmp);
    let result = runner.run(&command, None)?;

    let mut outcome = StageOutcome::new(output.to_path_buf());
    outcome.record(&command, &result);

    if threshold != 0.0 {
        let thresholded =
            super::threshold::threshold(runner, tools, &tmp, output, threshold, verbose)?;
        outcome.absorb(thresholded);
    } else if runner.is_dry_run() {
        info!("Dry run: would rename {} to {}", tmp.display(), output.display());
    } else if !result.is_success() && !tmp.exists() {
        warn!(
            "conversion of {} produced no output, skipping rename",
            native.display()
        );
    } else {
        fs::rename(&tmp, output)?;
    }

    Ok(outcome)
}
