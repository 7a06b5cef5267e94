use thiserror::Error;

#[derive(Error, Debug)]
pub enum CorrError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Matrix parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("External program not found on PATH: {program}")]
    ToolNotFound { program: String },

    #[error("External program {program} did not finish within {seconds}s")]
    ToolTimeout { program: String, seconds: u64 },

    #[error("{count} external tool invocation(s) failed: {summary}")]
    ToolFailures { count: usize, summary: String },

    #[error("Timeseries lengths differ: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("Matrix error: {0}")]
    Matrix(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Logging error: {0}")]
    Logging(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CorrError>;
