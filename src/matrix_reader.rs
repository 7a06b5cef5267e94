use crate::structs::{CorrError, Result};
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

/// Read a whitespace-separated numeric text matrix as one flat series
///
/// Rows are concatenated in file order, so an N x 1 column and a 1 x N
/// row both yield N values. Blank lines and `#` comments are skipped.
///
/// # Errors
/// Returns error if the file cannot be opened or holds a non-numeric token
pub fn read_scalar_series(path: &Path) -> Result<Vec<f64>> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(Trim::All)
        .from_reader(file);

    let mut values = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, csv::Position::line);
        for token in record.iter().flat_map(str::split_whitespace) {
            let value = token.parse::<f64>().map_err(|_| {
                CorrError::Matrix(format!(
                    "{}:{line}: not a number: {token:?}",
                    path.display()
                ))
            })?;
            values.push(value);
        }
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_matrix(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_column_matrix() {
        let file = create_matrix("1.5 \n2.5 \n-3.0 \n");
        let values = read_scalar_series(file.path()).unwrap();
        assert_eq!(values, vec![1.5, 2.5, -3.0]);
    }

    #[test]
    fn test_row_matrix() {
        let file = create_matrix("1  2\t3   4\n");
        let values = read_scalar_series(file.path()).unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_blank_lines_and_comments() {
        let file = create_matrix("# fslmeants\n\n1\n   \n2\n");
        let values = read_scalar_series(file.path()).unwrap();
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_empty_file() {
        let file = create_matrix("");
        assert!(read_scalar_series(file.path()).unwrap().is_empty());
    }

    #[test]
    fn test_nan_token() {
        let file = create_matrix("nan\n1\n");
        let values = read_scalar_series(file.path()).unwrap();
        assert!(values[0].is_nan());
    }

    #[test]
    fn test_bad_token_names_file_and_line() {
        let file = create_matrix("1\nvoxels\n");
        let err = read_scalar_series(file.path()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains(":2:"), "{message}");
        assert!(message.contains("voxels"), "{message}");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_scalar_series(Path::new("/nonexistent/corrcomp.mat.txt")).unwrap_err();
        assert!(matches!(err, CorrError::Io(_)));
    }
}
