//! `tabular-ingest` reads heterogeneous tabular inputs through one lazily-evaluated row
//! interface, with column types inferred from a bounded sample and per-column missing-value
//! and error handling.
//!
//! The primary entrypoints are [`ingestion::RowSource`] and [`ingestion::load_from_path`],
//! which can auto-detect the format from the file extension (or you can force a format via
//! [`ingestion::IngestionOptions`]).
//!
//! ## What you can ingest
//!
//! **File formats (auto-detected by extension):**
//!
//! - **Delimited text**: `.csv` (comma), `.tsv` / `.tab` / `.txt` (tab)
//! - **JSON**: `.json` / `.ndjson` (array-of-objects, NDJSON, or a `metaData` + `rows` document)
//! - **FASTA**: `.fasta`, `.fa`, `.faa`, `.fna`, `.fas`
//! - **HTML tables** (Cargo feature `markup`, on by default): `.html`, `.htm`
//! - **Excel/workbooks** (requires the Cargo feature `excel`): `.xlsx`, `.xls`, `.xlsm`, `.xlsb`, `.ods`
//!
//! **Column types:**
//!
//! Every column gets exactly one [`types::ColumnType`], tried in this order until one accepts
//! every sampled cell:
//!
//! - [`types::ColumnType::Date`]
//! - [`types::ColumnType::Integer`]
//! - [`types::ColumnType::Double`]
//! - [`types::ColumnType::TimeOfDay`]
//! - [`types::ColumnType::Boolean`]
//! - [`types::ColumnType::String`]
//!
//! Empty cells map to [`types::Value::Null`] (or the column's missing default).
//!
//! ## Quick example
//!
//! ```rust
//! use tabular_ingest::ingestion::{RowSource, SourceOptions};
//! use tabular_ingest::types::{ColumnType, Value};
//!
//! # fn main() -> Result<(), tabular_ingest::IngestionError> {
//! let mut source = RowSource::delimited_text("id,label\n1,a\n2,b\n", SourceOptions::csv());
//! let columns = source.columns()?;
//! assert_eq!(columns.get(0).map(|c| c.column_type), Some(ColumnType::Integer));
//!
//! let rows = source.load()?;
//! assert_eq!(rows[1].value("ID"), Some(&Value::Integer(2)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Missing values
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use tabular_ingest::ingestion::{RowSource, SourceOptions, StaticIndicators};
//!
//! # fn main() -> Result<(), tabular_ingest::IngestionError> {
//! let mut source = RowSource::delimited_text("score\n1.5\nQ\n2.0\n", SourceOptions::csv())
//!     .with_indicators(Arc::new(StaticIndicators::standard()));
//! let rows = source.load()?;
//! assert_eq!(rows[1].get("score").and_then(|c| c.indicator()), Some("Q"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: sources, tokenizer, inference, row pipeline and the streaming adapter
//! - [`types`]: column metadata, raw records and typed rows
//! - [`error`]: error types used across ingestion

pub mod error;
pub mod ingestion;
pub mod types;

pub use error::{IngestionError, IngestionResult};
