//! Ingestion entrypoints and implementations.
//!
//! Most callers should use [`RowSource`] (one source, lazy rows) or [`load_from_path`] (from
//! [`unified`]) which:
//!
//! - auto-detects format by file extension (or you can override via [`IngestionOptions`])
//! - infers column names and types from a bounded sample
//! - optionally reports success/failure/alerts to an [`IngestionObserver`]
//!
//! The building blocks are public as well:
//! - [`tokenizer`]: delimited-text records
//! - [`inference`]: column type inference over a sample
//! - [`pipeline`]: typed-row conversion
//! - [`streaming`]: push-decoder bridge with a bounded queue

pub mod convert;
pub mod delimited;
#[cfg(feature = "excel")]
pub mod excel;
pub mod fasta;
pub mod inference;
pub mod json;
#[cfg(feature = "markup")]
pub mod markup;
pub mod missing;
pub mod observability;
pub mod options;
pub mod pipeline;
pub mod source;
pub mod streaming;
pub mod tokenizer;
pub mod unified;

pub use inference::{InferenceOutcome, InferenceSample, KnownType, TypeInferenceEngine};
pub use missing::{MissingValueIndicators, StaticIndicators, MV_INDICATOR_SUFFIX};
pub use observability::{
    CompositeObserver, FileObserver, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats,
    StdErrObserver, TracingObserver,
};
pub use options::{HeaderHint, SourceOptions};
pub use pipeline::{PipelineState, RecordSupplier, RowPipeline};
pub use source::{ColumnOverrides, RowSource, SourceKind};
pub use streaming::{CancellationToken, PushDecoder, RowSink, StreamingConfig, StreamingSession};
pub use tokenizer::Tokenizer;
pub use unified::{
    load_from_path, open_path, ExcelSheetSelection, IngestedTable, IngestionFormat, IngestionOptions, IngestionRequest,
    SpreadsheetMode,
};
