//! Core data model: column metadata, raw records and typed rows.
//!
//! A source publishes a [`ColumnSet`] once (usually after type inference) and then yields
//! [`TypedRow`]s whose cells line up with that column set.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{IngestionError, IngestionResult};

/// Logical type of a column.
///
/// Declaration order is also the inference order: a column is first tried as a date, then as
/// an integer, and so on until [`ColumnType::String`], which accepts everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Date,
    Integer,
    Double,
    TimeOfDay,
    Boolean,
    String,
}

impl ColumnType {
    /// Candidate types in the order inference tries them.
    pub const INFERENCE_ORDER: [ColumnType; 6] = [
        ColumnType::Date,
        ColumnType::Integer,
        ColumnType::Double,
        ColumnType::TimeOfDay,
        ColumnType::Boolean,
        ColumnType::String,
    ];

    /// Map a loosely-named type (as found in JSON metadata) to a column type.
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "date" | "datetime" | "timestamp" => Some(Self::Date),
            "int" | "integer" | "long" | "bigint" => Some(Self::Integer),
            "float" | "double" | "number" | "real" => Some(Self::Double),
            "time" | "timeofday" => Some(Self::TimeOfDay),
            "boolean" | "bool" => Some(Self::Boolean),
            "string" | "text" | "varchar" => Some(Self::String),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnType::Date => "Date",
            ColumnType::Integer => "Integer",
            ColumnType::Double => "Double",
            ColumnType::TimeOfDay => "TimeOfDay",
            ColumnType::Boolean => "Boolean",
            ColumnType::String => "String",
        };
        f.write_str(s)
    }
}

/// A single typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// Calendar date (date-only inputs are stored at midnight).
    Date(NaiveDateTime),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Double(f64),
    /// Time of day without a date.
    TimeOfDay(NaiveTime),
    /// Boolean.
    Boolean(bool),
    /// UTF-8 string.
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The column type this value belongs to, or `None` for [`Value::Null`].
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Date(_) => Some(ColumnType::Date),
            Value::Integer(_) => Some(ColumnType::Integer),
            Value::Double(_) => Some(ColumnType::Double),
            Value::TimeOfDay(_) => Some(ColumnType::TimeOfDay),
            Value::Boolean(_) => Some(ColumnType::Boolean),
            Value::String(_) => Some(ColumnType::String),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Date(d) => {
                if d.time() == NaiveTime::MIN {
                    write!(f, "{}", d.date())
                } else {
                    write!(f, "{d}")
                }
            }
            Value::Integer(i) => write!(f, "{i}"),
            Value::Double(x) => write!(f, "{x}"),
            Value::TimeOfDay(t) => write!(f, "{t}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::String(s) => f.write_str(s),
        }
    }
}

/// A value from a missing-value-enabled column, optionally carrying an indicator code.
///
/// When the source cell held a valid indicator token (for example `Q`), `value` is
/// [`Value::Null`] and `indicator` is the token.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingValueCell {
    pub value: Value,
    pub indicator: Option<String>,
}

impl MissingValueCell {
    pub fn new(value: Value) -> Self {
        Self { value, indicator: None }
    }

    pub fn indicated(indicator: impl Into<String>) -> Self {
        Self {
            value: Value::Null,
            indicator: Some(indicator.into()),
        }
    }
}

/// One cell of a [`TypedRow`].
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Value(Value),
    Missing(MissingValueCell),
}

impl Cell {
    /// The underlying value, unwrapping missing-value wrappers.
    pub fn value(&self) -> &Value {
        match self {
            Cell::Value(v) => v,
            Cell::Missing(mv) => &mv.value,
        }
    }

    pub fn indicator(&self) -> Option<&str> {
        match self {
            Cell::Value(_) => None,
            Cell::Missing(mv) => mv.indicator.as_deref(),
        }
    }
}

impl From<Value> for Cell {
    fn from(v: Value) -> Self {
        Cell::Value(v)
    }
}

/// A field as produced by a tokenizer or decoder, before conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    /// Absent or empty field (including the `\N` sentinel).
    Empty,
    /// Text field. A quoted `""` arrives as `Text("")`.
    Text(String),
    /// Already-typed value from a typed decoder (spreadsheets, JSON).
    Typed(Value),
}

impl RawCell {
    pub fn is_blank(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(s) => s.trim().is_empty(),
            RawCell::Typed(v) => v.is_null(),
        }
    }

    /// Text form used for header names and `UseOriginal` error recovery.
    pub fn to_text(&self) -> String {
        match self {
            RawCell::Empty => String::new(),
            RawCell::Text(s) => s.clone(),
            RawCell::Typed(v) => v.to_string(),
        }
    }
}

impl From<&str> for RawCell {
    fn from(s: &str) -> Self {
        if s.is_empty() { RawCell::Empty } else { RawCell::Text(s.to_string()) }
    }
}

static EMPTY_CELL: RawCell = RawCell::Empty;

/// One logical record: ordered raw cells plus the physical line it started on (1-based).
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub line: usize,
    pub cells: Vec<RawCell>,
}

impl RawRecord {
    pub fn new(line: usize, cells: Vec<RawCell>) -> Self {
        Self { line, cells }
    }

    /// Build a record from text fields; empty strings become [`RawCell::Empty`].
    pub fn from_texts<I, S>(line: usize, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            line,
            cells: texts.into_iter().map(|s| RawCell::from(s.as_ref())).collect(),
        }
    }

    /// Cell at `index`; short records read as empty.
    pub fn get(&self, index: usize) -> &RawCell {
        self.cells.get(index).unwrap_or(&EMPTY_CELL)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// What to produce when a non-empty cell fails to convert to its column type.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ErrorPolicy {
    /// Replace with null.
    #[default]
    Discard,
    /// Keep the raw text as a [`Value::String`].
    UseOriginal,
    /// Replace with a fixed value.
    FixedSentinel(Value),
}

/// Scope passed to the missing-value collaborator (e.g. a container or project id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MvScope(pub String);

impl MvScope {
    pub fn new(scope: impl Into<String>) -> Self {
        Self(scope.into())
    }
}

/// Per-column metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub column_type: ColumnType,
    /// Columns with `load == false` are skipped during conversion.
    pub load: bool,
    /// Value used for empty cells (null when `None`).
    pub missing_default: Option<Value>,
    pub error_policy: ErrorPolicy,
    /// Values of this column are wrapped in [`MissingValueCell`].
    pub mv_enabled: bool,
    pub mv_scope: Option<MvScope>,
    /// Set on an indicator column: name of the data column it annotates.
    pub mv_indicator_of: Option<String>,
    /// Kept as raw text without inference or conversion.
    pub passthrough: bool,
    /// Opaque token linking the column to an external schema.
    pub binding: Option<String>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            load: true,
            missing_default: None,
            error_policy: ErrorPolicy::default(),
            mv_enabled: false,
            mv_scope: None,
            mv_indicator_of: None,
            passthrough: false,
            binding: None,
        }
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    pub fn with_missing_default(mut self, value: Value) -> Self {
        self.missing_default = Some(value);
        self
    }

    pub fn mv_enabled(mut self, scope: Option<MvScope>) -> Self {
        self.mv_enabled = true;
        self.mv_scope = scope;
        self
    }

    pub fn skipped(mut self) -> Self {
        self.load = false;
        self
    }

    pub fn is_indicator(&self) -> bool {
        self.mv_indicator_of.is_some()
    }
}

/// Ordered, immutable list of column descriptors for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSet {
    columns: Vec<ColumnDescriptor>,
}

impl ColumnSet {
    /// Build a column set, rejecting case-insensitive duplicate names when `strict`.
    pub fn try_new(columns: Vec<ColumnDescriptor>, strict: bool) -> IngestionResult<Self> {
        if strict {
            let mut seen = HashSet::with_capacity(columns.len());
            for c in &columns {
                if !seen.insert(c.name.to_lowercase()) {
                    return Err(IngestionError::DuplicateColumnName { name: c.name.clone() });
                }
            }
        }
        Ok(Self { columns })
    }

    /// Build a column set without the duplicate-name check.
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ColumnDescriptor> {
        self.columns.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter()
    }

    pub fn as_slice(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Case-insensitive lookup; the first match wins when duplicates were tolerated.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn by_name(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.index_of(name).and_then(|i| self.columns.get(i))
    }

    pub fn into_vec(self) -> Vec<ColumnDescriptor> {
        self.columns
    }
}

impl<'a> IntoIterator for &'a ColumnSet {
    type Item = &'a ColumnDescriptor;
    type IntoIter = std::slice::Iter<'a, ColumnDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

/// A converted row. Only loaded columns are present, in column-set order.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedRow {
    names: Arc<[String]>,
    cells: Vec<Cell>,
    line: usize,
}

impl TypedRow {
    pub fn new(names: Arc<[String]>, cells: Vec<Cell>, line: usize) -> Self {
        debug_assert_eq!(names.len(), cells.len());
        Self { names, cells, line }
    }

    /// Physical line (or spreadsheet row) the record started on.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Case-insensitive cell lookup.
    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .and_then(|i| self.cells.get(i))
    }

    /// Case-insensitive lookup of the underlying value.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).map(Cell::value)
    }

    /// Underlying values in column order.
    pub fn values(&self) -> Vec<Value> {
        self.cells.iter().map(|c| c.value().clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.names.iter().map(String::as_str).zip(self.cells.iter())
    }
}
