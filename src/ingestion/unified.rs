//! Path-based entrypoint.
//!
//! [`open_path`] builds a lazy [`RowSource`] for a file; [`load_from_path`] drains one into an
//! [`IngestedTable`] and reports the outcome to the configured observer. The format comes from
//! [`IngestionOptions::format`] or, when unset, from the file extension.

use std::collections::{BTreeMap, HashMap};
use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{ColumnSet, TypedRow};

use super::inference::KnownType;
use super::missing::MissingValueIndicators;
use super::observability::{IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats};
use super::options::SourceOptions;
use super::source::RowSource;

/// File formats reachable through [`open_path`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionFormat {
    Csv,
    Tsv,
    /// Workbooks; needs the `excel` feature.
    Excel,
    /// One `<table>` of an HTML page; needs the `markup` feature.
    Html,
    /// Array of objects, NDJSON, or a `metaData` + `rows` document.
    Json,
    Fasta,
}

impl IngestionFormat {
    /// Case-insensitive extension lookup.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let format = match ext.to_ascii_lowercase().as_str() {
            "csv" => Self::Csv,
            "tsv" | "tab" | "txt" => Self::Tsv,
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Self::Excel,
            "html" | "htm" => Self::Html,
            "json" | "ndjson" => Self::Json,
            "fasta" | "fa" | "faa" | "fna" | "fas" => Self::Fasta,
            _ => return None,
        };
        Some(format)
    }

    /// Explicit format if given, else the one named by `path`'s extension.
    fn resolve(explicit: Option<Self>, path: &Path) -> IngestionResult<Self> {
        if let Some(format) = explicit {
            return Ok(format);
        }
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            return Err(IngestionError::SchemaMismatch {
                message: format!("{}: no extension to pick a format from", path.display()),
            });
        };
        Self::from_extension(ext).ok_or_else(|| IngestionError::SchemaMismatch {
            message: format!("{}: unrecognized extension '{ext}'", path.display()),
        })
    }

    /// Source options used when [`IngestionOptions::source`] is unset.
    pub fn default_source_options(self) -> SourceOptions {
        match self {
            Self::Csv => SourceOptions::csv(),
            _ => SourceOptions::tsv(),
        }
    }
}

/// Sheet to read from a workbook.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExcelSheetSelection {
    #[default]
    First,
    Sheet(String),
}

/// How spreadsheet cells are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpreadsheetMode {
    /// Load the sheet's cell range up front.
    #[default]
    Eager,
    /// Decode `.xlsx`/`.xlsm` cell by cell on a background worker.
    Streaming,
}

/// Everything [`open_path`] and [`load_from_path`] need beyond the path.
#[derive(Clone)]
pub struct IngestionOptions {
    /// `None` picks the format from the extension.
    pub format: Option<IngestionFormat>,
    /// `None` uses [`IngestionFormat::default_source_options`].
    pub source: Option<SourceOptions>,
    pub excel_sheet_selection: ExcelSheetSelection,
    pub spreadsheet_mode: SpreadsheetMode,
    /// Which `<table>` of an HTML document to read (0-based).
    pub table_index: usize,
    pub known_types: HashMap<String, KnownType>,
    pub indicators: Option<Arc<dyn MissingValueIndicators>>,
    pub observer: Option<Arc<dyn IngestionObserver>>,
    /// Failures at or above this severity are also sent to `on_alert`.
    pub alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for IngestionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionOptions")
            .field("format", &self.format)
            .field("source", &self.source)
            .field("sheet", &self.excel_sheet_selection)
            .field("spreadsheet_mode", &self.spreadsheet_mode)
            .field("table_index", &self.table_index)
            .field("known_types", &self.known_types)
            .field("has_indicators", &self.indicators.is_some())
            .field("has_observer", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            format: None,
            source: None,
            excel_sheet_selection: ExcelSheetSelection::First,
            spreadsheet_mode: SpreadsheetMode::Eager,
            table_index: 0,
            known_types: HashMap::new(),
            indicators: None,
            observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

/// A fully loaded source.
#[derive(Debug, Clone)]
pub struct IngestedTable {
    pub columns: Arc<ColumnSet>,
    pub rows: Vec<TypedRow>,
    /// `#key=value` preamble metadata (delimited text only).
    pub comments: BTreeMap<String, String>,
}

impl IngestedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Build a [`RowSource`] for `path`. Nothing is read until the source is used.
///
/// ```no_run
/// use tabular_ingest::ingestion::{open_path, IngestionOptions};
///
/// # fn main() -> Result<(), tabular_ingest::IngestionError> {
/// let mut source = open_path("assay.tsv", &IngestionOptions::default())?;
/// let first = source.rows()?.next().transpose()?;
/// println!("{first:?}");
/// # Ok(())
/// # }
/// ```
pub fn open_path(path: impl AsRef<Path>, options: &IngestionOptions) -> IngestionResult<RowSource> {
    let path = path.as_ref();
    let format = IngestionFormat::resolve(options.format, path)?;
    let source_options = options
        .source
        .clone()
        .unwrap_or_else(|| format.default_source_options());

    let source = match format {
        IngestionFormat::Csv | IngestionFormat::Tsv => RowSource::delimited_path(path, source_options),
        IngestionFormat::Json => RowSource::json_path(path, source_options),
        IngestionFormat::Fasta => RowSource::sequence_path(path, source_options),
        IngestionFormat::Excel => open_excel(path, options, source_options)?,
        IngestionFormat::Html => open_html(path, options, source_options)?,
    };

    let source = source.with_known_types(options.known_types.clone());
    Ok(match options.indicators.clone() {
        Some(indicators) => source.with_indicators(indicators),
        None => source,
    })
}

/// Read every row of `path`.
///
/// With an observer configured, each call ends in exactly one `on_success` (row and column
/// counts) or one `on_failure` (with [`severity_for_error`]), plus `on_alert` when that
/// severity reaches [`IngestionOptions::alert_at_or_above`]. A path whose format cannot be
/// determined fails before any callback.
///
/// ```no_run
/// use std::sync::Arc;
///
/// use tabular_ingest::ingestion::{load_from_path, IngestionFormat, IngestionOptions, StdErrObserver};
///
/// let opts = IngestionOptions {
///     format: Some(IngestionFormat::Tsv),
///     observer: Some(Arc::new(StdErrObserver)),
///     ..Default::default()
/// };
///
/// // A missing file is Critical, the default alert threshold.
/// let err = load_from_path("plate-7.export", &opts).unwrap_err();
/// println!("{err}");
/// ```
pub fn load_from_path(path: impl AsRef<Path>, options: &IngestionOptions) -> IngestionResult<IngestedTable> {
    let path = path.as_ref();
    let format = IngestionFormat::resolve(options.format, path)?;
    let result = load_table(path, format, options);

    if let Some(observer) = &options.observer {
        let ctx = IngestionContext {
            path: path.to_path_buf(),
            format,
        };
        report(observer.as_ref(), &ctx, &result, options.alert_at_or_above);
    }
    result
}

fn report(
    observer: &dyn IngestionObserver,
    ctx: &IngestionContext,
    result: &IngestionResult<IngestedTable>,
    alert_at_or_above: IngestionSeverity,
) {
    match result {
        Ok(table) => observer.on_success(
            ctx,
            IngestionStats {
                rows: table.row_count(),
                columns: table.columns.len(),
            },
        ),
        Err(e) => {
            let severity = severity_for_error(e);
            observer.on_failure(ctx, severity, e);
            if severity >= alert_at_or_above {
                observer.on_alert(ctx, severity, e);
            }
        }
    }
}

fn load_table(path: &Path, format: IngestionFormat, options: &IngestionOptions) -> IngestionResult<IngestedTable> {
    let resolved = IngestionOptions {
        format: Some(format),
        ..options.clone()
    };
    let mut source = open_path(path, &resolved)?;
    let columns = source.columns()?;
    let rows = source.load()?;
    let comments = source.comments()?.clone();
    Ok(IngestedTable {
        columns,
        rows,
        comments,
    })
}

/// Infrastructure failures (I/O anywhere in the error chain, worker trouble) are Critical;
/// problems with the input itself are Error.
pub fn severity_for_error(e: &IngestionError) -> IngestionSeverity {
    let io_caused = match e {
        IngestionError::Io(_) | IngestionError::WorkerLeak { .. } | IngestionError::StreamingWorker { .. } => true,
        IngestionError::Json(err) => caused_by_io(err),
        #[cfg(feature = "excel")]
        IngestionError::Excel(err) => caused_by_io(err),
        IngestionError::MalformedRecord { .. }
        | IngestionError::Conversion { .. }
        | IngestionError::DuplicateColumnName { .. }
        | IngestionError::SchemaMismatch { .. }
        | IngestionError::Usage { .. } => false,
    };
    if io_caused {
        IngestionSeverity::Critical
    } else {
        IngestionSeverity::Error
    }
}

fn caused_by_io(e: &(dyn StdError + 'static)) -> bool {
    std::iter::successors(Some(e), |&err| err.source()).any(|err| err.is::<std::io::Error>())
}

fn open_excel(path: &Path, options: &IngestionOptions, source_options: SourceOptions) -> IngestionResult<RowSource> {
    #[cfg(feature = "excel")]
    {
        Ok(RowSource::spreadsheet(
            path,
            options.excel_sheet_selection.clone(),
            options.spreadsheet_mode,
            source_options,
        ))
    }

    #[cfg(not(feature = "excel"))]
    {
        let _ = (options, source_options);
        Err(IngestionError::SchemaMismatch {
            message: format!("{}: spreadsheet support needs the 'excel' feature", path.display()),
        })
    }
}

fn open_html(path: &Path, options: &IngestionOptions, source_options: SourceOptions) -> IngestionResult<RowSource> {
    #[cfg(feature = "markup")]
    {
        Ok(RowSource::markup_path(path, options.table_index, source_options))
    }

    #[cfg(not(feature = "markup"))]
    {
        let _ = (options, source_options);
        Err(IngestionError::SchemaMismatch {
            message: format!("{}: HTML support needs the 'markup' feature", path.display()),
        })
    }
}

/// An owned path + options pair, for handing loads to a job queue.
#[derive(Debug, Clone)]
pub struct IngestionRequest {
    pub path: PathBuf,
    pub options: IngestionOptions,
}

impl IngestionRequest {
    pub fn run(&self) -> IngestionResult<IngestedTable> {
        load_from_path(&self.path, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_map_to_formats() {
        assert_eq!(IngestionFormat::from_extension("CSV"), Some(IngestionFormat::Csv));
        assert_eq!(IngestionFormat::from_extension("txt"), Some(IngestionFormat::Tsv));
        assert_eq!(IngestionFormat::from_extension("htm"), Some(IngestionFormat::Html));
        assert_eq!(IngestionFormat::from_extension("fa"), Some(IngestionFormat::Fasta));
        assert_eq!(IngestionFormat::from_extension("parquet"), None);
    }

    #[test]
    fn explicit_format_wins_over_extension() {
        let path = Path::new("export.dat");
        assert!(IngestionFormat::resolve(None, path).is_err());
        assert_eq!(
            IngestionFormat::resolve(Some(IngestionFormat::Json), path).unwrap(),
            IngestionFormat::Json
        );
    }

    #[test]
    fn csv_defaults_differ_from_tsv() {
        assert_eq!(IngestionFormat::Csv.default_source_options().delimiter, ',');
        assert_eq!(IngestionFormat::Json.default_source_options().delimiter, '\t');
    }

    #[test]
    fn severities() {
        let io = IngestionError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(severity_for_error(&io), IngestionSeverity::Critical);
        let usage = IngestionError::Usage {
            message: "again".into(),
        };
        assert_eq!(severity_for_error(&usage), IngestionSeverity::Error);
        let json = IngestionError::Json(serde_json::from_str::<serde_json::Value>("{").unwrap_err());
        assert_eq!(severity_for_error(&json), IngestionSeverity::Error);
    }

    struct BrokenPipe;

    impl std::io::Read for BrokenPipe {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "reader went away"))
        }
    }

    #[test]
    fn json_error_caused_by_io_is_critical() {
        let err = serde_json::from_reader::<_, serde_json::Value>(BrokenPipe).unwrap_err();
        assert!(err.is_io());
        assert_eq!(severity_for_error(&IngestionError::Json(err)), IngestionSeverity::Critical);
    }
}
