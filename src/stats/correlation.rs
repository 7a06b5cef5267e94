//! Pearson correlation between two scalar timeseries

use crate::matrix_reader::read_scalar_series;
use crate::structs::{CorrError, Result, SeriesSummary};
use ndarray::Array2;
use std::path::Path;
use tracing::{info, warn};

/// Correlation matrix between the rows of `data` (one variable per row)
///
/// A zero-variance row yields NaN wherever it takes part.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn correlation_matrix(data: &Array2<f64>) -> Array2<f64> {
    let n_vars = data.nrows();
    let n = data.ncols() as f64;

    let centered: Vec<Vec<f64>> = data
        .rows()
        .into_iter()
        .map(|row| {
            let mean = row.iter().sum::<f64>() / n;
            row.iter().map(|x| x - mean).collect()
        })
        .collect();

    // Unscaled co-moments; the 1/n factors cancel in the ratio
    let moment = |i: usize, j: usize| -> f64 {
        centered[i]
            .iter()
            .zip(&centered[j])
            .map(|(a, b)| a * b)
            .sum()
    };

    let variances: Vec<f64> = (0..n_vars).map(|i| moment(i, i)).collect();
    Array2::from_shape_fn((n_vars, n_vars), |(i, j)| {
        let r = moment(i, j) / (variances[i] * variances[j]).sqrt();
        r.clamp(-1.0, 1.0)
    })
}

/// Entries strictly below the main diagonal, row by row
#[must_use]
pub fn lower_off_diagonal(matrix: &Array2<f64>) -> Vec<f64> {
    matrix
        .indexed_iter()
        .filter(|((i, j), _)| j < i)
        .map(|(_, &v)| v)
        .collect()
}

/// Pearson correlation coefficient between `a` and `b`
///
/// # Errors
/// Returns error if the series differ in length
pub fn pearson(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(CorrError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let stacked = Array2::from_shape_vec((2, a.len()), a.iter().chain(b).copied().collect())
        .map_err(|e| CorrError::Matrix(e.to_string()))?;
    let matrix = correlation_matrix(&stacked);

    Ok(lower_off_diagonal(&matrix)
        .first()
        .copied()
        .unwrap_or(f64::NAN))
}

/// Load two scalar timeseries files and correlate them
///
/// # Errors
/// Returns error if either file cannot be read or the lengths differ
pub fn correlate(matrix_a: &Path, matrix_b: &Path) -> Result<f64> {
    info!("Computing Pearson correlation");

    let a = read_scalar_series(matrix_a)?;
    let b = read_scalar_series(matrix_b)?;
    describe(matrix_a, &a);
    describe(matrix_b, &b);

    pearson(&a, &b)
}

fn describe(path: &Path, values: &[f64]) {
    let name = path.file_name().unwrap_or(path.as_os_str()).to_string_lossy();
    match SeriesSummary::calculate(values) {
        Some(summary) if summary.is_constant() => {
            warn!("{name}: {} (constant signal, coefficient will be NaN)", summary.summary());
        }
        Some(summary) => info!("{name}: {}", summary.summary()),
        None => warn!("{name}: empty timeseries"),
    }
}
