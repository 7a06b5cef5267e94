//! Result file writer

use crate::structs::{format_float, suffixed, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const RESULT_SUFFIX: &str = ".pear_corr.txt";

/// `<out_prefix>.pear_corr.txt`
#[must_use]
pub fn result_path(out_prefix: &Path) -> PathBuf {
    suffixed(out_prefix, RESULT_SUFFIX)
}

/// Text form of a coefficient: `-1.0`, `0.25`, `1.23e-05`, `nan`
#[must_use]
pub fn format_coefficient(value: f64) -> String {
    format_float(value)
}

/// Write the coefficient followed by a newline
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_coefficient(path: &Path, value: f64) -> Result<PathBuf> {
    fs::write(path, format!("{}\n", format_coefficient(value)))?;
    Ok(path.to_path_buf())
}
