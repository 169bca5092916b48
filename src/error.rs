//! Error types for campyon.
//!
//! Errors fall in two groups: configuration errors, which abort a run
//! before any row is processed, and processing errors, which stop the
//! file currently being read. Dropping a column from the running sums
//! after a non-numeric value is ordinary behaviour and not an error.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CampyonError>;

#[derive(Error, Debug)]
pub enum CampyonError {
    /// A column specification resolved outside `[1, field_count]`.
    #[error("Specified column {index} is out of range (1..={field_count})")]
    ColumnOutOfRange { index: i64, field_count: usize },

    /// A named column reference did not match the header.
    #[error("Column {name} not found")]
    UnknownColumnName { name: String },

    #[error("No such file: {}", path.display())]
    MissingInput { path: PathBuf },

    /// Placeholder (`#N`) and function (`c()`, `C()`...) predicate forms mixed.
    #[error("Invalid predicate: {0}")]
    InvalidPredicateMode(String),

    #[error("Configuration error: {0}")]
    InvalidConfiguration(String),

    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),

    /// A data line split into a different number of fields than the first line.
    #[error(
        "Number of columns in line {line} of {file} deviates, expected {expected}, got {found}"
    )]
    FieldCountMismatch {
        file: String,
        line: usize,
        expected: usize,
        found: usize,
    },

    /// The select expression is syntactically invalid.
    #[error("Select expression error at offset {offset}: {message}")]
    SelectionParse { offset: usize, message: String },

    /// The select expression failed while evaluating a row.
    #[error("Select expression failed on line {line}: {message}")]
    SelectionEval { line: usize, message: String },

    #[error("Can not plot non-numeric value in column {column}: {value}")]
    NonNumericPlotValue { column: usize, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CampyonError {
    /// True for errors that are detected before any row is processed.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CampyonError::ColumnOutOfRange { .. }
                | CampyonError::UnknownColumnName { .. }
                | CampyonError::MissingInput { .. }
                | CampyonError::InvalidPredicateMode(_)
                | CampyonError::InvalidConfiguration(_)
                | CampyonError::UnknownEncoding(_)
                | CampyonError::SelectionParse { .. }
        )
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CampyonError::ColumnOutOfRange { .. } => 4,
            e if e.is_configuration() => 2,
            _ => 1,
        }
    }
}
