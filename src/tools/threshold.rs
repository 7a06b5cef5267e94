//! FSL `cluster` thresholding

use crate::runner::CommandRunner;
use crate::structs::{format_float, Result, StageOutcome, ToolCommand, Toolchain};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Build the `cluster` invocation that zeroes everything below `cutoff`
#[must_use]
pub fn cluster_command(
    tools: &Toolchain,
    raster_in: &Path,
    raster_out: &Path,
    cutoff: f64,
    verbose: bool,
) -> ToolCommand {
    let cmd = ToolCommand::new(&tools.cluster)
        .arg(path_flag("--in=", raster_in))
        .arg(format!("--thresh={}", format_float(cutoff)))
        .arg(path_flag("--oindex=", raster_out))
        .arg("--no_table");
    if verbose {
        cmd.arg("--verbose")
    } else {
        cmd
    }
}

/// Where the cluster tool's console output is kept: `<stem>.cluster.txt`
#[must_use]
pub fn cluster_table_path(raster_out: &Path) -> PathBuf {
    let name = raster_out
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name
        .strip_suffix(".nii.gz")
        .or_else(|| name.strip_suffix(".nii"))
        .unwrap_or(&name);
    raster_out.with_file_name(format!("{stem}.cluster.txt"))
}

/// Threshold `raster_in` into `raster_out`
///
/// Zeroing sub-threshold voxels is the tool's job; the output is not
/// re-checked here.
///
/// # Errors
/// Returns error if `cluster` cannot be run
pub fn threshold(
    runner: &CommandRunner,
    tools: &Toolchain,
    raster_in: &Path,
    raster_out: &Path,
    cutoff: f64,
    verbose: bool,
) -> Result<StageOutcome<PathBuf>> {
    let command = cluster_command(tools, raster_in, raster_out, cutoff, verbose);
    let table = cluster_table_path(raster_out);
    let result = runner.run(&command, Some(&table))?;

    let mut outcome = StageOutcome::new(raster_out.to_path_buf());
    outcome.record(&command, &result);
    Ok(outcome)
}

fn path_flag(flag: &str, path: &Path) -> OsString {
    let mut joined = OsString::from(flag);
    joined.push(path);
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_command_layout() {
        let cmd = cluster_command(
            &Toolchain::default(),
            Path::new("/ws/mask.stat.mask.tmp.nii.gz"),
            Path::new("/ws/mask.stat.mask.nii.gz"),
            1.77,
            false,
        );
        assert_eq!(
            cmd.render(),
            "cluster --in=/ws/mask.stat.mask.tmp.nii.gz --thresh=1.77 \
             --oindex=/ws/mask.stat.mask.nii.gz --no_table"
        );
    }

    #[test]
    fn test_whole_number_cutoff_keeps_decimal_point() {
        let cmd = cluster_command(
            &Toolchain::default(),
            Path::new("a.nii"),
            Path::new("b.nii"),
            2.0,
            false,
        );
        assert_eq!(cmd.render(), "cluster --in=a.nii --thresh=2.0 --oindex=b.nii --no_table");
    }

    #[test]
    fn test_cluster_command_verbose() {
        let cmd = cluster_command(
            &Toolchain::default(),
            Path::new("in.nii"),
            Path::new("out.nii"),
            2.5,
            true,
        );
        assert_eq!(
            cmd.arguments().last().map(|a| a.to_string_lossy().into_owned()),
            Some("--verbose".to_string())
        );
    }

    #[test]
    fn test_cluster_table_path() {
        assert_eq!(
            cluster_table_path(Path::new("/ws/mask.stat.mask.nii.gz")),
            PathBuf::from("/ws/mask.stat.mask.cluster.txt")
        );
        assert_eq!(
            cluster_table_path(Path::new("out.nii")),
            PathBuf::from("out.cluster.txt")
        );
        assert_eq!(
            cluster_table_path(Path::new("out.dat")),
            PathBuf::from("out.dat.cluster.txt")
        );
    }
}
