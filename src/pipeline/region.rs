//! One mask in, one scalar timeseries out

use crate::runner::CommandRunner;
use crate::structs::{suffixed, Result, StageOutcome, Toolchain};
use crate::tools::{convert, meants};
use std::path::{Path, PathBuf};

/// Intermediate files of one region, all sharing `prefix`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionPaths {
    pub raster: PathBuf,
    pub mask: PathBuf,
    pub matrix: PathBuf,
}

impl RegionPaths {
    #[must_use]
    pub fn new(prefix: &Path) -> Self {
        Self {
            raster: suffixed(prefix, ".nii.gz"),
            mask: suffixed(prefix, ".mask.nii.gz"),
            matrix: suffixed(prefix, ".mat.txt"),
        }
    }
}

/// Mean timeseries of `native` inside `mask`
///
/// The signal is converted without thresholding; the mask is converted
/// with `threshold` (zero skips the cluster pass). Every intermediate path
/// is derived from `prefix`.
///
/// # Errors
/// Returns error if a tool cannot be run or an intermediate rename fails
pub fn extract_region(
    runner: &CommandRunner,
    tools: &Toolchain,
    native: &Path,
    prefix: &Path,
    mask: &Path,
    threshold: f64,
    verbose: bool,
) -> Result<StageOutcome<PathBuf>> {
    let paths = RegionPaths::new(prefix);
    let mut outcome = StageOutcome::new(paths.matrix.clone());

    let raster = outcome.absorb(convert::convert(
        runner,
        tools,
        native,
        &paths.raster,
        0.0,
        verbose,
    )?);
    let mask_raster = outcome.absorb(convert::convert(
        runner,
        tools,
        mask,
        &paths.mask,
        threshold,
        verbose,
    )?);
    outcome.absorb(meants::extract(
        runner,
        tools,
        &raster,
        &mask_raster,
        &paths.matrix,
        verbose,
    )?);

    Ok(outcome)
}
