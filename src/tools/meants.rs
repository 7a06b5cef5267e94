//! Mean timeseries extraction with FSL `fslmeants`

use crate::runner::CommandRunner;
use crate::structs::{Result, StageOutcome, ToolCommand, Toolchain};
use std::path::{Path, PathBuf};

#[must_use]
pub fn meants_command(
    tools: &Toolchain,
    raster: &Path,
    mask: &Path,
    matrix_out: &Path,
    verbose: bool,
) -> ToolCommand {
    let cmd = ToolCommand::new(&tools.meants)
        .arg("-i")
        .arg(raster)
        .arg("-o")
        .arg(matrix_out)
        .arg("-m")
        .arg(mask);
    if verbose {
        cmd.arg("--verbose")
    } else {
        cmd
    }
}

/// Write the mean signal inside `mask` for every volume of `raster`
///
/// Raster and mask must share spatial dimensions. That is not checked
/// here; a mismatch shows up as a non-zero exit from the tool.
///
/// # Errors
/// Returns error if `fslmeants` cannot be run
pub fn extract(
    runner: &CommandRunner,
    tools: &Toolchain,
    raster: &Path,
    mask: &Path,
    matrix_out: &Path,
    verbose: bool,
) -> Result<StageOutcome<PathBuf>> {
    let command = meants_command(tools, raster, mask, matrix_out, verbose);
    let result = runner.run(&command, None)?;

    let mut outcome = StageOutcome::new(matrix_out.to_path_buf());
    outcome.record(&command, &result);
    Ok(outcome)
}
