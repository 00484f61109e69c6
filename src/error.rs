use std::time::Duration;

use thiserror::Error;

use crate::types::ColumnType;

/// Convenience result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Error type returned by sources, iterators and the streaming adapter.
///
/// One enum is shared by every source kind. Conversion failures are only surfaced here in
/// strict mode; lenient sources absorb them through the column's error policy.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Underlying I/O error (file not found, read failure, ...). Always propagated.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "excel")]
    /// Spreadsheet decoding error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// JSON decoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The tokenizer could not form a record (e.g. a quote left open at end of input).
    #[error("malformed record at line {line}: {message}")]
    MalformedRecord { line: usize, message: String },

    /// A cell could not be converted to its column type (strict mode only).
    #[error(
        "cannot convert value at line {line} column {column} ('{name}') to {target}: {message} (raw='{raw}')"
    )]
    Conversion {
        line: usize,
        /// 1-based column position.
        column: usize,
        name: String,
        raw: String,
        target: ColumnType,
        message: String,
    },

    /// Two columns resolved to the same (case-insensitive) name in strict mode.
    #[error("duplicate column name '{name}'")]
    DuplicateColumnName { name: String },

    /// The input does not have the expected shape (missing table, missing sheet, ...).
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// The caller used a source in a way it does not support.
    #[error("usage error: {message}")]
    Usage { message: String },

    /// A streaming worker did not stop within the close timeout.
    #[error("streaming worker did not terminate within {waited:?}")]
    WorkerLeak { waited: Duration },

    /// A streaming worker stopped without reporting completion.
    #[error("streaming worker failed: {message}")]
    StreamingWorker { message: String },
}
