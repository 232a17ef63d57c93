use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the analysis library.
///
/// The binary wraps these in `anyhow` at the command boundary; everything
/// below `main.rs` returns `Result<T, AnalysisError>`.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The header row names the same column twice.
    #[error("duplicate column '{0}' in header")]
    DuplicateColumn(String),

    /// The tokenizer could not produce a row.
    #[error("malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    /// A component asked for a column the header does not have.
    #[error("column '{0}' not found in dataset")]
    MissingColumn(String),

    /// An operation that needs at least one row got none.
    #[error("dataset is empty")]
    EmptyDataset,

    /// A coordinate or timestamp cell is not a number.
    #[error("row {row}: column '{column}' is not numeric ('{value}')")]
    NonNumeric {
        row: usize,
        column: String,
        value: String,
    },

    #[error("unsupported file extension: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("logger: {0}")]
    Logger(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
