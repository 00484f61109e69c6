//! Per-source configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::IngestionResult;
use crate::types::MvScope;

/// Whether the first record is a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HeaderHint {
    Present,
    Absent,
    /// Decide from the data: the first record is a header unless it converts cleanly to the
    /// types inferred from the records after it.
    #[default]
    Unknown,
}

impl From<bool> for HeaderHint {
    fn from(present: bool) -> Self {
        if present { HeaderHint::Present } else { HeaderHint::Absent }
    }
}

/// Options shared by every source kind.
///
/// Tokenizer fields only matter for delimited text. Use [`SourceOptions::csv`] or
/// [`SourceOptions::tsv`] for the common cases; [`Default`] is tab-delimited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOptions {
    pub delimiter: char,
    pub quote: char,
    /// Honor quoting. When false, the quote character is ordinary text.
    pub parse_quotes: bool,
    /// Decode `\n`, `\t`, `\uXXXX`, ... in field text.
    pub escape_backslashes: bool,
    /// Lines starting with this character are comments.
    pub comment_marker: Option<char>,
    /// Maximum number of records read ahead for type inference.
    pub inference_sample_size: usize,
    pub has_header: HeaderHint,
    /// Yield blank rows as all-null rows instead of skipping them.
    pub include_blank_lines: bool,
    /// Surface conversion errors and duplicate column names instead of absorbing them.
    pub strict_errors: bool,
    /// Keep an explicit empty string (quoted `""`) as `""` in String columns.
    pub preserve_empty_string: bool,
    /// When false every column is String unless a known type says otherwise.
    pub infer_types: bool,
    pub mv_scope: Option<MvScope>,
    /// Rows buffered between a streaming worker and the consumer.
    pub queue_capacity: usize,
    pub poll_interval_ms: u64,
    /// Upper bound on how long closing a streaming iterator waits for its worker.
    pub close_timeout_ms: u64,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            delimiter: '\t',
            quote: '"',
            parse_quotes: true,
            escape_backslashes: true,
            comment_marker: Some('#'),
            inference_sample_size: 7500,
            has_header: HeaderHint::Unknown,
            include_blank_lines: false,
            strict_errors: false,
            preserve_empty_string: false,
            infer_types: true,
            mv_scope: None,
            queue_capacity: 4,
            poll_interval_ms: 25,
            close_timeout_ms: 5_000,
        }
    }
}

impl SourceOptions {
    /// Comma-delimited; backslashes are literal.
    pub fn csv() -> Self {
        Self {
            delimiter: ',',
            escape_backslashes: false,
            ..Self::default()
        }
    }

    /// Tab-delimited (same as [`Default`]).
    pub fn tsv() -> Self {
        Self::default()
    }

    /// Parse options from JSON; absent fields take their defaults.
    pub fn from_json_str(input: &str) -> IngestionResult<Self> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn with_header(mut self, hint: impl Into<HeaderHint>) -> Self {
        self.has_header = hint.into();
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict_errors = true;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}
