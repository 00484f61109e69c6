//! [`RowSource`]: one row interface over every supported input kind.
//!
//! A source infers its [`ColumnSet`] once, from a bounded sample, and hands out lazy
//! [`RowPipeline`]s over the same column set. Scrollable sources (in-memory text, files,
//! in-memory records, decoder factories) re-open their input for every iteration. A
//! single-pass source (an arbitrary reader) keeps the inference sample and replays it to
//! its one and only iterator.
//!
//! ```no_run
//! use tabular_ingest::ingestion::{RowSource, SourceOptions};
//!
//! # fn main() -> Result<(), tabular_ingest::IngestionError> {
//! let mut source = RowSource::delimited_path("measurements.csv", SourceOptions::csv());
//! for col in source.columns()?.iter() {
//!     println!("{}: {}", col.name, col.column_type);
//! }
//! for row in source.rows()? {
//!     let row = row?;
//!     println!("line {}: {:?}", row.line(), row.values());
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::io::Read;
use std::path::Path;
#[cfg(feature = "excel")]
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{ColumnDescriptor, ColumnSet, ErrorPolicy, RawRecord, TypedRow, Value};

use super::delimited::{open_delimited, TextInput};
use super::fasta::{fasta_columns, FastaRecords};
use super::inference::{InferenceSample, KnownType, TypeInferenceEngine};
use super::json::parse_json_document;
use super::missing::{MissingValueIndicators, StaticIndicators};
use super::options::{HeaderHint, SourceOptions};
use super::pipeline::{BufferedRecords, RecordSupplier, ReplayRecords, RowPipeline};
use super::streaming::{PushDecoder, StreamingConfig, StreamingSession};
#[cfg(feature = "excel")]
use super::unified::{ExcelSheetSelection, SpreadsheetMode};

/// The input variant behind a [`RowSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    DelimitedText,
    Spreadsheet,
    Markup,
    StructuredJson,
    Sequence,
    InMemoryRows,
    /// Records produced by a caller-supplied [`PushDecoder`].
    Custom,
}

type DecoderFactory = Box<dyn Fn() -> Box<dyn PushDecoder> + Send + Sync>;

enum Backing {
    Delimited(TextInput),
    #[cfg(feature = "excel")]
    Spreadsheet {
        path: PathBuf,
        sheet: ExcelSheetSelection,
        mode: SpreadsheetMode,
    },
    #[cfg(feature = "markup")]
    Markup { input: TextInput, table_index: usize },
    Json(TextInput),
    Sequence(TextInput),
    InMemory(Arc<[RawRecord]>),
    Custom(DecoderFactory),
}

impl Backing {
    fn is_scrollable(&self) -> bool {
        match self {
            Backing::Delimited(input) | Backing::Json(input) | Backing::Sequence(input) => input.is_scrollable(),
            #[cfg(feature = "markup")]
            Backing::Markup { input, .. } => input.is_scrollable(),
            #[cfg(feature = "excel")]
            Backing::Spreadsheet { .. } => true,
            Backing::InMemory(_) | Backing::Custom(_) => true,
        }
    }
}

/// A freshly opened input.
struct Opened {
    supplier: Box<dyn RecordSupplier>,
    /// Columns the input declares itself, with the number of header records to skip.
    declared: Option<(ColumnSet, usize)>,
    /// Header decision forced by the input's structure.
    header: Option<HeaderHint>,
}

impl Opened {
    fn plain(supplier: Box<dyn RecordSupplier>) -> Self {
        Self {
            supplier,
            declared: None,
            header: None,
        }
    }
}

/// Renames and skips applied to one iteration without touching the published column set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnOverrides {
    renames: HashMap<String, String>,
    skipped: HashSet<String>,
}

impl ColumnOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rename column `from` (case-insensitive) to `to`.
    pub fn rename(mut self, from: impl AsRef<str>, to: impl Into<String>) -> Self {
        self.renames.insert(from.as_ref().to_lowercase(), to.into());
        self
    }

    /// Do not load column `name` (case-insensitive).
    pub fn skip(mut self, name: impl AsRef<str>) -> Self {
        self.skipped.insert(name.as_ref().to_lowercase());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty() && self.skipped.is_empty()
    }

    /// Copy of `columns` with the overrides applied. Indicator links follow renamed data columns.
    /// With `strict`, a rename onto an existing name is a [`IngestionError::DuplicateColumnName`].
    pub fn apply(&self, columns: &ColumnSet, strict: bool) -> IngestionResult<ColumnSet> {
        let adjusted = columns
            .iter()
            .map(|c| {
                let mut c = c.clone();
                let key = c.name.to_lowercase();
                if self.skipped.contains(&key) {
                    c.load = false;
                }
                if let Some(new_name) = self.renames.get(&key) {
                    c.name = new_name.clone();
                }
                if let Some(target) = c.mv_indicator_of.as_mut() {
                    if let Some(new_name) = self.renames.get(&target.to_lowercase()) {
                        *target = new_name.clone();
                    }
                }
                c
            })
            .collect();
        ColumnSet::try_new(adjusted, strict)
    }
}

/// A tabular input with memoized column inference and lazy typed rows.
pub struct RowSource {
    kind: SourceKind,
    backing: Backing,
    options: SourceOptions,
    known_types: HashMap<String, KnownType>,
    indicators: Arc<dyn MissingValueIndicators>,
    default_error_policy: Option<ErrorPolicy>,
    column_error_policies: HashMap<String, ErrorPolicy>,
    missing_defaults: HashMap<String, Value>,
    bindings: HashMap<String, String>,
    explicit_columns: Option<ColumnSet>,

    columns: Option<Arc<ColumnSet>>,
    header_rows: usize,
    comments: BTreeMap<String, String>,
    pending: Option<Box<dyn RecordSupplier>>,
    iterated: bool,
    open_count: usize,
}

impl RowSource {
    fn with_backing(kind: SourceKind, backing: Backing, options: SourceOptions) -> Self {
        Self {
            kind,
            backing,
            options,
            known_types: HashMap::new(),
            indicators: Arc::new(StaticIndicators::none()),
            default_error_policy: None,
            column_error_policies: HashMap::new(),
            missing_defaults: HashMap::new(),
            bindings: HashMap::new(),
            explicit_columns: None,
            columns: None,
            header_rows: 0,
            comments: BTreeMap::new(),
            pending: None,
            iterated: false,
            open_count: 0,
        }
    }

    pub fn delimited_text(text: impl Into<String>, options: SourceOptions) -> Self {
        Self::with_backing(SourceKind::DelimitedText, Backing::Delimited(TextInput::text(text)), options)
    }

    pub fn delimited_path(path: impl AsRef<Path>, options: SourceOptions) -> Self {
        Self::with_backing(SourceKind::DelimitedText, Backing::Delimited(TextInput::path(path)), options)
    }

    /// Delimited text from a reader. The source is single-pass.
    pub fn delimited_reader(reader: impl Read + Send + 'static, options: SourceOptions) -> Self {
        Self::with_backing(
            SourceKind::DelimitedText,
            Backing::Delimited(TextInput::reader(reader)),
            options,
        )
    }

    #[cfg(feature = "excel")]
    pub fn spreadsheet(
        path: impl AsRef<Path>,
        sheet: ExcelSheetSelection,
        mode: SpreadsheetMode,
        options: SourceOptions,
    ) -> Self {
        Self::with_backing(
            SourceKind::Spreadsheet,
            Backing::Spreadsheet {
                path: path.as_ref().to_path_buf(),
                sheet,
                mode,
            },
            options,
        )
    }

    /// The `table_index`-th `<table>` of an HTML document.
    #[cfg(feature = "markup")]
    pub fn markup_str(html: impl Into<String>, table_index: usize, options: SourceOptions) -> Self {
        Self::with_backing(
            SourceKind::Markup,
            Backing::Markup {
                input: TextInput::text(html),
                table_index,
            },
            options,
        )
    }

    #[cfg(feature = "markup")]
    pub fn markup_path(path: impl AsRef<Path>, table_index: usize, options: SourceOptions) -> Self {
        Self::with_backing(
            SourceKind::Markup,
            Backing::Markup {
                input: TextInput::path(path),
                table_index,
            },
            options,
        )
    }

    pub fn json_str(json: impl Into<String>, options: SourceOptions) -> Self {
        Self::with_backing(SourceKind::StructuredJson, Backing::Json(TextInput::text(json)), options)
    }

    pub fn json_path(path: impl AsRef<Path>, options: SourceOptions) -> Self {
        Self::with_backing(SourceKind::StructuredJson, Backing::Json(TextInput::path(path)), options)
    }

    /// FASTA text.
    pub fn sequence_text(text: impl Into<String>, options: SourceOptions) -> Self {
        Self::with_backing(SourceKind::Sequence, Backing::Sequence(TextInput::text(text)), options)
    }

    pub fn sequence_path(path: impl AsRef<Path>, options: SourceOptions) -> Self {
        Self::with_backing(SourceKind::Sequence, Backing::Sequence(TextInput::path(path)), options)
    }

    pub fn in_memory(records: Vec<RawRecord>, options: SourceOptions) -> Self {
        Self::with_backing(SourceKind::InMemoryRows, Backing::InMemory(records.into()), options)
    }

    /// Records pushed by a decoder running on a background worker.
    ///
    /// `factory` is called once per opened iteration (and once for inference).
    pub fn from_decoder<F>(factory: F, options: SourceOptions) -> Self
    where
        F: Fn() -> Box<dyn PushDecoder> + Send + Sync + 'static,
    {
        Self::with_backing(SourceKind::Custom, Backing::Custom(Box::new(factory)), options)
    }

    pub fn with_known_types(mut self, known: HashMap<String, KnownType>) -> Self {
        self.known_types = known;
        self
    }

    pub fn with_known_type(mut self, name: impl Into<String>, known: impl Into<KnownType>) -> Self {
        self.known_types.insert(name.into(), known.into());
        self
    }

    pub fn with_indicators(mut self, indicators: Arc<dyn MissingValueIndicators>) -> Self {
        self.indicators = indicators;
        self
    }

    /// Error policy for every column without a column-specific one.
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.default_error_policy = Some(policy);
        self
    }

    pub fn with_column_error_policy(mut self, column: impl AsRef<str>, policy: ErrorPolicy) -> Self {
        self.column_error_policies
            .insert(column.as_ref().to_lowercase(), policy);
        self
    }

    /// Value used for empty cells of `column`.
    pub fn with_missing_default(mut self, column: impl AsRef<str>, value: Value) -> Self {
        self.missing_defaults.insert(column.as_ref().to_lowercase(), value);
        self
    }

    /// Attach an external-schema binding token to `column`.
    pub fn with_binding(mut self, column: impl AsRef<str>, token: impl Into<String>) -> Self {
        self.bindings.insert(column.as_ref().to_lowercase(), token.into());
        self
    }

    /// Use `columns` as-is instead of inferring them.
    pub fn with_columns(mut self, columns: ColumnSet) -> Self {
        self.explicit_columns = Some(columns);
        self
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn options(&self) -> &SourceOptions {
        &self.options
    }

    /// Whether more than one iterator can be opened.
    pub fn is_scrollable(&self) -> bool {
        self.backing.is_scrollable()
    }

    /// How many times the underlying input has been opened.
    pub fn open_count(&self) -> usize {
        self.open_count
    }

    /// The finalized column set. Computed on first call; later calls return the same `Arc`.
    pub fn columns(&mut self) -> IngestionResult<Arc<ColumnSet>> {
        if let Some(columns) = &self.columns {
            return Ok(columns.clone());
        }

        let Opened {
            mut supplier,
            declared,
            header,
        } = self.open()?;
        let sample = match InferenceSample::collect(supplier.as_mut(), self.options.inference_sample_size.max(1)) {
            Ok(sample) => sample,
            Err(e) => {
                if let Err(close_err) = supplier.close() {
                    tracing::warn!(error = %close_err, "failed to release source after sampling error");
                }
                return Err(e);
            }
        };
        if let Some(comments) = supplier.comments() {
            self.comments = comments.clone();
        }

        let hint = header.unwrap_or(self.options.has_header);
        let (columns, header_rows) = match (self.explicit_columns.clone(), declared) {
            (Some(explicit), declared) => {
                let header_rows = declared
                    .map(|(_, n)| n)
                    .unwrap_or(usize::from(hint == HeaderHint::Present));
                (explicit, header_rows)
            }
            (None, Some(declared)) => declared,
            (None, None) => {
                let outcome = TypeInferenceEngine::from_options(&self.options)
                    .with_known_types(&self.known_types)
                    .with_indicators(self.indicators.clone())
                    .infer(&sample, hint)?;
                (outcome.columns, outcome.header_rows)
            }
        };
        let columns = self.configure(columns)?;

        if self.is_scrollable() {
            supplier.close()?;
        } else {
            let rest = if sample.is_exhausted() {
                supplier.close()?;
                None
            } else {
                Some(supplier)
            };
            self.pending = Some(Box::new(ReplayRecords::new(sample.into_records(), rest)));
        }

        tracing::debug!(
            kind = ?self.kind,
            columns = columns.len(),
            header_rows,
            "column set published"
        );
        let columns = Arc::new(columns);
        self.columns = Some(columns.clone());
        self.header_rows = header_rows;
        Ok(columns)
    }

    /// `#key=value` metadata found before the first record.
    pub fn comments(&mut self) -> IngestionResult<&BTreeMap<String, String>> {
        self.columns()?;
        Ok(&self.comments)
    }

    /// A lazy iterator over typed rows.
    pub fn rows(&mut self) -> IngestionResult<RowPipeline> {
        self.rows_with(&ColumnOverrides::default())
    }

    /// Like [`Self::rows`], with renames and skips applied to this iteration only.
    pub fn rows_with(&mut self, overrides: &ColumnOverrides) -> IngestionResult<RowPipeline> {
        let columns = self.columns()?;
        let columns = if overrides.is_empty() {
            columns
        } else {
            Arc::new(overrides.apply(&columns, self.options.strict_errors)?)
        };

        let supplier = if self.is_scrollable() {
            self.open()?.supplier
        } else {
            if self.iterated {
                return Err(IngestionError::Usage {
                    message: format!("{:?} source is single-pass and was already iterated", self.kind),
                });
            }
            self.pending.take().ok_or_else(|| IngestionError::Usage {
                message: "single-pass input was already consumed".to_string(),
            })?
        };
        self.iterated = true;

        Ok(RowPipeline::new(supplier, columns, &self.options)
            .with_indicators(self.indicators.clone())
            .skip_records(self.header_rows))
    }

    /// Read every row. The first error ends the load.
    pub fn load(&mut self) -> IngestionResult<Vec<TypedRow>> {
        self.rows()?.collect()
    }

    fn configure(&self, columns: ColumnSet) -> IngestionResult<ColumnSet> {
        let configured = columns
            .into_vec()
            .into_iter()
            .map(|mut c: ColumnDescriptor| {
                let key = c.name.to_lowercase();
                if let Some(policy) = self
                    .column_error_policies
                    .get(&key)
                    .or(self.default_error_policy.as_ref())
                {
                    c.error_policy = policy.clone();
                }
                if let Some(value) = self.missing_defaults.get(&key) {
                    c.missing_default = Some(value.clone());
                }
                if let Some(token) = self.bindings.get(&key) {
                    c.binding = Some(token.clone());
                }
                c
            })
            .collect();
        ColumnSet::try_new(configured, self.options.strict_errors)
    }

    fn open(&mut self) -> IngestionResult<Opened> {
        let opened = match &mut self.backing {
            Backing::Delimited(input) => Opened::plain(Box::new(open_delimited(input, &self.options)?)),
            #[cfg(feature = "excel")]
            Backing::Spreadsheet { path, sheet, mode } => match mode {
                SpreadsheetMode::Eager => {
                    let records = super::excel::read_sheet_records(path.as_path(), sheet)?;
                    Opened::plain(Box::new(BufferedRecords::new(records)))
                }
                SpreadsheetMode::Streaming => {
                    let decoder = super::excel::XlsxStreamDecoder::new(path.as_path(), sheet.clone());
                    Opened::plain(Box::new(StreamingSession::start(
                        Box::new(decoder),
                        StreamingConfig::from(&self.options),
                    )?))
                }
            },
            #[cfg(feature = "markup")]
            Backing::Markup { input, table_index } => {
                let table = super::markup::parse_html_table(&input.read_to_string()?, *table_index)?;
                Opened {
                    supplier: Box::new(BufferedRecords::new(table.records)),
                    declared: None,
                    header: table.header_present.then_some(HeaderHint::Present),
                }
            }
            Backing::Json(input) => {
                let doc = parse_json_document(&input.read_to_string()?)?;
                Opened {
                    supplier: Box::new(BufferedRecords::new(doc.records)),
                    declared: doc.declared.map(|c| (c, 1)),
                    header: Some(HeaderHint::Present),
                }
            }
            Backing::Sequence(input) => Opened {
                supplier: Box::new(FastaRecords::new(input.open()?)),
                declared: Some((fasta_columns(), 0)),
                header: None,
            },
            Backing::InMemory(records) => Opened::plain(Box::new(BufferedRecords::new(records.iter().cloned()))),
            Backing::Custom(factory) => Opened::plain(Box::new(StreamingSession::start(
                factory(),
                StreamingConfig::from(&self.options),
            )?)),
        };
        self.open_count += 1;
        Ok(opened)
    }
}

impl fmt::Debug for RowSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowSource")
            .field("kind", &self.kind)
            .field("scrollable", &self.is_scrollable())
            .field("options", &self.options)
            .field("columns", &self.columns.as_ref().map(|c| c.len()))
            .field("open_count", &self.open_count)
            .finish()
    }
}
