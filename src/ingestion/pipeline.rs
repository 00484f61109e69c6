//! Row conversion over a finalized [`ColumnSet`].
//!
//! [`RowPipeline`] pulls [`RawRecord`]s from a [`RecordSupplier`], converts every loaded
//! column, applies missing-value wrapping and the column's error policy, and yields
//! [`TypedRow`]s one at a time.

use std::collections::{BTreeMap, VecDeque};
use std::io::BufRead;
use std::sync::Arc;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{
    Cell, ColumnDescriptor, ColumnSet, ColumnType, ErrorPolicy, MissingValueCell, RawCell, RawRecord, TypedRow,
    Value,
};

use super::convert::convert_cell;
use super::missing::{MissingValueIndicators, StaticIndicators};
use super::options::SourceOptions;
use super::tokenizer::Tokenizer;

/// Pull contract between a decoder and the pipeline.
pub trait RecordSupplier: Send {
    /// Next record, or `None` at end of input.
    fn next_record(&mut self) -> IngestionResult<Option<RawRecord>>;

    /// Release upstream resources. Called once, on exhaustion, error, close or drop.
    fn close(&mut self) -> IngestionResult<()> {
        Ok(())
    }

    /// Metadata gathered from the input so far (e.g. `#key=value` preamble comments).
    fn comments(&self) -> Option<&BTreeMap<String, String>> {
        None
    }
}

impl<R: BufRead + Send> RecordSupplier for Tokenizer<R> {
    fn next_record(&mut self) -> IngestionResult<Option<RawRecord>> {
        Tokenizer::next_record(self)
    }

    fn comments(&self) -> Option<&BTreeMap<String, String>> {
        Some(Tokenizer::comments(self))
    }
}

/// In-memory records.
#[derive(Debug, Clone, Default)]
pub struct BufferedRecords {
    records: VecDeque<RawRecord>,
}

impl BufferedRecords {
    pub fn new(records: impl IntoIterator<Item = RawRecord>) -> Self {
        Self {
            records: records.into_iter().collect(),
        }
    }
}

impl RecordSupplier for BufferedRecords {
    fn next_record(&mut self) -> IngestionResult<Option<RawRecord>> {
        Ok(self.records.pop_front())
    }
}

/// Replays already-read records, then continues with the rest of the input.
pub struct ReplayRecords {
    replay: VecDeque<RawRecord>,
    rest: Option<Box<dyn RecordSupplier>>,
}

impl ReplayRecords {
    pub fn new(replay: Vec<RawRecord>, rest: Option<Box<dyn RecordSupplier>>) -> Self {
        Self {
            replay: replay.into(),
            rest,
        }
    }
}

impl RecordSupplier for ReplayRecords {
    fn next_record(&mut self) -> IngestionResult<Option<RawRecord>> {
        if let Some(r) = self.replay.pop_front() {
            return Ok(Some(r));
        }
        match self.rest.as_mut() {
            Some(rest) => rest.next_record(),
            None => Ok(None),
        }
    }

    fn close(&mut self) -> IngestionResult<()> {
        self.replay.clear();
        match self.rest.take() {
            Some(mut rest) => rest.close(),
            None => Ok(()),
        }
    }

    fn comments(&self) -> Option<&BTreeMap<String, String>> {
        self.rest.as_ref().and_then(|r| r.comments())
    }
}

/// Lifecycle of a [`RowPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    NotStarted,
    HasRow,
    Exhausted,
    Closed,
}

#[derive(Debug, Clone, Copy)]
struct PipelineSettings {
    include_blank_lines: bool,
    strict: bool,
    preserve_empty_string: bool,
}

/// A loaded column and, for indicator columns, the position of its data column.
#[derive(Debug, Clone)]
struct LoadedColumn {
    index: usize,
    paired_data: Option<usize>,
}

/// Lazy typed-row iterator.
///
/// Errors are yielded in place of a row. Conversion errors (strict mode only) affect one row
/// and iteration can continue; I/O and malformed-record errors end the iteration.
pub struct RowPipeline {
    supplier: Option<Box<dyn RecordSupplier>>,
    columns: Arc<ColumnSet>,
    loaded: Vec<LoadedColumn>,
    names: Arc<[String]>,
    indicators: Arc<dyn MissingValueIndicators>,
    settings: PipelineSettings,
    state: PipelineState,
    current: Option<TypedRow>,
    header_rows_to_skip: usize,
    records_read: u64,
}

impl RowPipeline {
    pub fn new(supplier: Box<dyn RecordSupplier>, columns: Arc<ColumnSet>, options: &SourceOptions) -> Self {
        let loaded_positions: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.load)
            .map(|(i, _)| i)
            .collect();
        let names: Arc<[String]> = loaded_positions
            .iter()
            .filter_map(|&i| columns.get(i).map(|c| c.name.clone()))
            .collect();
        let loaded = loaded_positions
            .iter()
            .map(|&index| LoadedColumn {
                index,
                paired_data: columns
                    .get(index)
                    .and_then(|c| c.mv_indicator_of.as_deref())
                    .and_then(|data| names.iter().position(|n| n.eq_ignore_ascii_case(data))),
            })
            .collect();

        Self {
            supplier: Some(supplier),
            columns,
            loaded,
            names,
            indicators: Arc::new(StaticIndicators::none()),
            settings: PipelineSettings {
                include_blank_lines: options.include_blank_lines,
                strict: options.strict_errors,
                preserve_empty_string: options.preserve_empty_string,
            },
            state: PipelineState::NotStarted,
            current: None,
            header_rows_to_skip: 0,
            records_read: 0,
        }
    }

    pub fn with_indicators(mut self, indicators: Arc<dyn MissingValueIndicators>) -> Self {
        self.indicators = indicators;
        self
    }

    /// Skip the first `n` non-blank records (header rows).
    pub fn skip_records(mut self, n: usize) -> Self {
        self.header_rows_to_skip = n;
        self
    }

    pub fn columns(&self) -> &Arc<ColumnSet> {
        &self.columns
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Records pulled from upstream so far, including skipped header and blank records.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    pub fn current(&self) -> Option<&TypedRow> {
        self.current.as_ref()
    }

    pub fn take_current(&mut self) -> Option<TypedRow> {
        self.current.take()
    }

    /// Move to the next row. Returns `Ok(false)` once the input is exhausted or closed.
    pub fn advance(&mut self) -> IngestionResult<bool> {
        if matches!(self.state, PipelineState::Exhausted | PipelineState::Closed) {
            return Ok(false);
        }
        self.current = None;
        loop {
            let next = match self.supplier.as_mut() {
                Some(s) => s.next_record(),
                None => Ok(None),
            };
            let record = match next {
                Ok(Some(r)) => r,
                Ok(None) => {
                    self.state = PipelineState::Exhausted;
                    self.release()?;
                    return Ok(false);
                }
                Err(e) => {
                    self.state = PipelineState::Exhausted;
                    if let Err(close_err) = self.release() {
                        tracing::warn!(error = %close_err, "failed to release source after error");
                    }
                    return Err(e);
                }
            };
            self.records_read += 1;

            if self.header_rows_to_skip > 0 && !record.cells.iter().all(RawCell::is_blank) {
                self.header_rows_to_skip -= 1;
                continue;
            }

            let blank = self
                .loaded
                .iter()
                .all(|c| record.get(c.index).is_blank());
            if blank {
                if !self.settings.include_blank_lines {
                    continue;
                }
                let cells = vec![Cell::Value(Value::Null); self.loaded.len()];
                self.current = Some(TypedRow::new(self.names.clone(), cells, record.line));
                self.state = PipelineState::HasRow;
                return Ok(true);
            }

            self.state = PipelineState::HasRow;
            let row = self.convert_record(&record)?;
            self.current = Some(row);
            return Ok(true);
        }
    }

    /// Stop iterating and release upstream resources. Safe to call at any point.
    pub fn close(&mut self) -> IngestionResult<()> {
        if self.state == PipelineState::Closed {
            return Ok(());
        }
        self.state = PipelineState::Closed;
        self.current = None;
        self.release()
    }

    fn release(&mut self) -> IngestionResult<()> {
        let Some(mut supplier) = self.supplier.take() else {
            return Ok(());
        };
        match supplier.close() {
            // Still running: keep it so drop reports the leak instead of losing it.
            Err(e @ IngestionError::WorkerLeak { .. }) => {
                self.supplier = Some(supplier);
                Err(e)
            }
            other => other,
        }
    }

    fn convert_record(&self, record: &RawRecord) -> IngestionResult<TypedRow> {
        let mut cells = Vec::with_capacity(self.loaded.len());
        for lc in &self.loaded {
            let desc = self.descriptor(lc.index);
            if desc.is_indicator() {
                // Filled in once every data column is converted.
                cells.push(Cell::Value(Value::Null));
            } else {
                cells.push(self.convert_value(record, lc.index, desc)?);
            }
        }

        for (pos, lc) in self.loaded.iter().enumerate() {
            let desc = self.descriptor(lc.index);
            if !desc.is_indicator() {
                continue;
            }
            let raw = record.get(lc.index);
            let code = (!raw.is_blank()).then(|| raw.to_text().trim().to_string());
            let valid = code
                .as_deref()
                .is_some_and(|c| self.indicators.is_valid_indicator(c, desc.mv_scope.as_ref()));

            if let (Some(code), false) = (&code, valid) {
                if self.settings.strict {
                    return Err(self.conversion_error(record, lc.index, desc, raw, "not a valid missing value indicator"));
                }
                tracing::debug!(line = record.line, column = %desc.name, code = %code, "unknown missing value indicator");
            }

            let cell = match lc.paired_data {
                Some(data_pos) => {
                    // Unknown codes are kept too; only strict mode rejects them.
                    if let (Some(code), Cell::Missing(mv)) = (&code, &mut cells[data_pos]) {
                        mv.indicator = Some(code.clone());
                    }
                    cells[data_pos].clone()
                }
                None => Cell::Missing(match (code, valid) {
                    (Some(code), true) => MissingValueCell::indicated(code),
                    (Some(_), false) => MissingValueCell::new(apply_policy(&desc.error_policy, raw)),
                    (None, _) => MissingValueCell::new(Value::Null),
                }),
            };
            cells[pos] = cell;
        }

        Ok(TypedRow::new(self.names.clone(), cells, record.line))
    }

    fn convert_value(&self, record: &RawRecord, index: usize, desc: &ColumnDescriptor) -> IngestionResult<Cell> {
        let raw = record.get(index);

        if desc.mv_enabled {
            if let RawCell::Text(s) = raw {
                let token = s.trim();
                if self.indicators.is_valid_indicator(token, desc.mv_scope.as_ref()) {
                    return Ok(Cell::Missing(MissingValueCell::indicated(token)));
                }
            }
        }

        let value = if raw.is_blank() {
            match raw {
                RawCell::Text(s)
                    if s.is_empty()
                        && self.settings.preserve_empty_string
                        && desc.column_type == ColumnType::String =>
                {
                    Value::String(String::new())
                }
                _ => desc.missing_default.clone().unwrap_or(Value::Null),
            }
        } else if desc.passthrough {
            match raw {
                RawCell::Typed(v) => v.clone(),
                other => Value::String(other.to_text()),
            }
        } else {
            match convert_cell(raw, desc.column_type) {
                Ok(v) => v,
                Err(message) if self.settings.strict => {
                    return Err(self.conversion_error(record, index, desc, raw, &message));
                }
                Err(message) => {
                    tracing::debug!(
                        line = record.line,
                        column = %desc.name,
                        target = %desc.column_type,
                        %message,
                        "conversion failed; applying column error policy"
                    );
                    apply_policy(&desc.error_policy, raw)
                }
            }
        };

        Ok(if desc.mv_enabled {
            Cell::Missing(MissingValueCell::new(value))
        } else {
            Cell::Value(value)
        })
    }

    fn descriptor(&self, index: usize) -> &ColumnDescriptor {
        &self.columns.as_slice()[index]
    }

    fn conversion_error(
        &self,
        record: &RawRecord,
        index: usize,
        desc: &ColumnDescriptor,
        raw: &RawCell,
        message: &str,
    ) -> IngestionError {
        IngestionError::Conversion {
            line: record.line,
            column: index + 1,
            name: desc.name.clone(),
            raw: raw.to_text(),
            target: desc.column_type,
            message: message.to_string(),
        }
    }
}

fn apply_policy(policy: &ErrorPolicy, raw: &RawCell) -> Value {
    match policy {
        ErrorPolicy::Discard => Value::Null,
        ErrorPolicy::UseOriginal => Value::String(raw.to_text()),
        ErrorPolicy::FixedSentinel(v) => v.clone(),
    }
}

impl Iterator for RowPipeline {
    type Item = IngestionResult<TypedRow>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(true) => self.current.take().map(Ok),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl Drop for RowPipeline {
    fn drop(&mut self) {
        match self.release() {
            Ok(()) => {}
            Err(e @ IngestionError::WorkerLeak { .. }) if !std::thread::panicking() => {
                panic!("row iterator dropped with a leaked worker: {e}");
            }
            Err(e) => tracing::warn!(error = %e, "failed to release source on drop"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    fn rec(line: usize, texts: &[&str]) -> RawRecord {
        RawRecord::from_texts(line, texts.iter().copied())
    }

    fn pipeline(columns: Vec<ColumnDescriptor>, records: Vec<RawRecord>, options: &SourceOptions) -> RowPipeline {
        RowPipeline::new(
            Box::new(BufferedRecords::new(records)),
            Arc::new(ColumnSet::new(columns)),
            options,
        )
    }

    struct TrackedSupplier {
        inner: BufferedRecords,
        closed: Arc<AtomicBool>,
    }

    impl RecordSupplier for TrackedSupplier {
        fn next_record(&mut self) -> IngestionResult<Option<RawRecord>> {
            self.inner.next_record()
        }

        fn close(&mut self) -> IngestionResult<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn error_policies_replace_unconvertible_cells() {
        let cols = vec![
            ColumnDescriptor::new("a", ColumnType::Integer),
            ColumnDescriptor::new("b", ColumnType::Integer).with_error_policy(ErrorPolicy::UseOriginal),
            ColumnDescriptor::new("c", ColumnType::Integer)
                .with_error_policy(ErrorPolicy::FixedSentinel(Value::Integer(-1))),
        ];
        let rows: Vec<_> = pipeline(cols, vec![rec(1, &["x", "y", "z"])], &SourceOptions::default())
            .map(|r| r.unwrap().values())
            .collect();
        assert_eq!(
            rows,
            vec![vec![Value::Null, Value::String("y".into()), Value::Integer(-1)]]
        );
    }

    #[test]
    fn strict_conversion_error_aborts_only_that_row() {
        let cols = vec![ColumnDescriptor::new("n", ColumnType::Integer)];
        let records = vec![rec(1, &["1"]), rec(2, &["oops"]), rec(3, &["3"])];
        let results: Vec<_> = pipeline(cols, records, &SourceOptions::default().strict()).collect();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().values(), vec![Value::Integer(1)]);
        match &results[1] {
            Err(IngestionError::Conversion { line, column, name, raw, target, .. }) => {
                assert_eq!((*line, *column), (2, 1));
                assert_eq!(name, "n");
                assert_eq!(raw, "oops");
                assert_eq!(*target, ColumnType::Integer);
            }
            other => panic!("expected conversion error, got {other:?}"),
        }
        assert_eq!(results[2].as_ref().unwrap().values(), vec![Value::Integer(3)]);
    }

    #[test]
    fn missing_value_tokens_are_wrapped() {
        let cols = vec![ColumnDescriptor::new("score", ColumnType::Double).mv_enabled(None)];
        let rows: Vec<_> = pipeline(cols, vec![rec(1, &["Q"]), rec(2, &["1.5"])], &SourceOptions::default())
            .with_indicators(Arc::new(StaticIndicators::standard()))
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(
            rows[0].get("score"),
            Some(&Cell::Missing(MissingValueCell::indicated("Q")))
        );
        assert_eq!(
            rows[1].get("score"),
            Some(&Cell::Missing(MissingValueCell::new(Value::Double(1.5))))
        );
    }

    #[test]
    fn indicator_column_annotates_its_data_column() {
        let mut ind = ColumnDescriptor::new("score_MVIndicator", ColumnType::String);
        ind.mv_indicator_of = Some("score".into());
        let cols = vec![ColumnDescriptor::new("score", ColumnType::Integer).mv_enabled(None), ind];
        let rows: Vec<_> = pipeline(cols, vec![rec(1, &["5", "N"]), rec(2, &["6", ""])], &SourceOptions::default())
            .with_indicators(Arc::new(StaticIndicators::standard()))
            .map(|r| r.unwrap())
            .collect();

        let expected = Cell::Missing(MissingValueCell {
            value: Value::Integer(5),
            indicator: Some("N".into()),
        });
        assert_eq!(rows[0].get("score"), Some(&expected));
        assert_eq!(rows[0].get("score_MVIndicator"), Some(&expected));
        assert_eq!(rows[1].get("score").and_then(Cell::indicator), None);
    }

    #[test]
    fn unknown_paired_code_is_attached_when_lenient() {
        let mut ind = ColumnDescriptor::new("v_MVIndicator", ColumnType::String);
        ind.mv_indicator_of = Some("v".into());
        let cols = vec![ColumnDescriptor::new("v", ColumnType::Integer).mv_enabled(None), ind];
        let records = vec![rec(1, &["1", "X"]), rec(2, &["2", "Q"])];

        let rows: Vec<_> = pipeline(cols.clone(), records.clone(), &SourceOptions::default())
            .with_indicators(Arc::new(StaticIndicators::standard()))
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(
            rows[0].get("v"),
            Some(&Cell::Missing(MissingValueCell {
                value: Value::Integer(1),
                indicator: Some("X".into()),
            }))
        );
        assert_eq!(rows[1].get("v").and_then(Cell::indicator), Some("Q"));

        let strict: Vec<_> = pipeline(cols, records, &SourceOptions::default().strict())
            .with_indicators(Arc::new(StaticIndicators::standard()))
            .collect();
        assert!(matches!(strict[0], Err(IngestionError::Conversion { line: 1, column: 2, .. })));
        assert!(strict[1].is_ok());
    }

    #[test]
    fn orphan_indicator_column_stands_alone() {
        let mut ind = ColumnDescriptor::new("gone_MVIndicator", ColumnType::String);
        ind.mv_indicator_of = Some("gone".into());
        let cols = vec![ColumnDescriptor::new("gone", ColumnType::Integer).skipped(), ind];
        let mut p = pipeline(cols, vec![rec(1, &["1", "Q"]), rec(2, &["1", "bogus"])], &SourceOptions::default())
            .with_indicators(Arc::new(StaticIndicators::standard()));

        let first = p.next().unwrap().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first.cells()[0], Cell::Missing(MissingValueCell::indicated("Q")));
        let second = p.next().unwrap().unwrap();
        assert_eq!(second.cells()[0], Cell::Missing(MissingValueCell::new(Value::Null)));
    }

    #[test]
    fn blank_rows_skipped_or_yielded_as_nulls() {
        let cols = vec![
            ColumnDescriptor::new("a", ColumnType::Integer),
            ColumnDescriptor::new("b", ColumnType::String),
        ];
        let records = || vec![rec(1, &["1", "x"]), RawRecord::new(2, vec![]), rec(3, &["2", "y"])];

        let skipped = pipeline(cols.clone(), records(), &SourceOptions::default()).count();
        assert_eq!(skipped, 2);

        let opts = SourceOptions {
            include_blank_lines: true,
            ..SourceOptions::default()
        };
        let rows: Vec<_> = pipeline(cols, records(), &opts).map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].values(), vec![Value::Null, Value::Null]);
        assert_eq!(rows[1].line(), 2);
    }

    #[test]
    fn missing_default_and_preserved_empty_string() {
        let cols = vec![
            ColumnDescriptor::new("n", ColumnType::Integer).with_missing_default(Value::Integer(0)),
            ColumnDescriptor::new("s", ColumnType::String),
            ColumnDescriptor::new("t", ColumnType::String),
            ColumnDescriptor::new("z", ColumnType::String),
        ];
        let record = || {
            RawRecord::new(
                1,
                vec![
                    RawCell::Empty,
                    RawCell::Text(String::new()),
                    RawCell::Empty,
                    RawCell::Text("z".into()),
                ],
            )
        };

        let opts = SourceOptions {
            preserve_empty_string: true,
            ..SourceOptions::default()
        };
        let row = pipeline(cols.clone(), vec![record()], &opts).next().unwrap().unwrap();
        assert_eq!(
            row.values(),
            vec![
                Value::Integer(0),
                Value::String(String::new()),
                Value::Null,
                Value::String("z".into()),
            ]
        );

        let row = pipeline(cols, vec![record()], &SourceOptions::default())
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(row.value("s"), Some(&Value::Null));
    }

    #[test]
    fn header_rows_skip_and_counter_tracks_records() {
        let cols = vec![ColumnDescriptor::new("a", ColumnType::Integer)];
        let mut p = pipeline(cols, vec![rec(1, &["a"]), rec(2, &["1"]), rec(3, &["2"])], &SourceOptions::default())
            .skip_records(1);
        assert_eq!(p.state(), PipelineState::NotStarted);
        assert!(p.advance().unwrap());
        assert_eq!(p.state(), PipelineState::HasRow);
        assert_eq!(p.current().unwrap().value("a"), Some(&Value::Integer(1)));
        assert_eq!(p.records_read(), 2);
        assert!(p.advance().unwrap());
        assert!(!p.advance().unwrap());
        assert_eq!(p.state(), PipelineState::Exhausted);
        assert_eq!(p.records_read(), 3);
    }

    #[test]
    fn close_releases_supplier_once() {
        let closed = Arc::new(AtomicBool::new(false));
        let supplier = TrackedSupplier {
            inner: BufferedRecords::new(vec![rec(1, &["1"]), rec(2, &["2"])]),
            closed: closed.clone(),
        };
        let cols = Arc::new(ColumnSet::new(vec![ColumnDescriptor::new("a", ColumnType::Integer)]));
        let mut p = RowPipeline::new(Box::new(supplier), cols, &SourceOptions::default());
        assert!(p.advance().unwrap());
        assert!(!closed.load(Ordering::SeqCst));
        p.close().unwrap();
        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(p.state(), PipelineState::Closed);
        assert!(!p.advance().unwrap());
        assert!(p.next().is_none());
    }

    /// Reports a stuck worker on the first close, then exits cleanly.
    struct SlowToStop {
        closes: Arc<AtomicUsize>,
    }

    impl RecordSupplier for SlowToStop {
        fn next_record(&mut self) -> IngestionResult<Option<RawRecord>> {
            Ok(Some(rec(1, &["1"])))
        }

        fn close(&mut self) -> IngestionResult<()> {
            if self.closes.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(IngestionError::WorkerLeak {
                    waited: std::time::Duration::from_millis(1),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn leaked_supplier_is_closed_again_on_drop() {
        let closes = Arc::new(AtomicUsize::new(0));
        let cols = Arc::new(ColumnSet::new(vec![ColumnDescriptor::new("a", ColumnType::Integer)]));
        let mut p = RowPipeline::new(
            Box::new(SlowToStop { closes: closes.clone() }),
            cols,
            &SourceOptions::default(),
        );
        assert!(p.advance().unwrap());
        assert!(matches!(p.close(), Err(IngestionError::WorkerLeak { .. })));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        drop(p);
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn malformed_input_ends_iteration() {
        let tok = Tokenizer::new("1,2\n\"open,3\n".as_bytes(), &SourceOptions::csv());
        let cols = Arc::new(ColumnSet::new(vec![
            ColumnDescriptor::new("a", ColumnType::Integer),
            ColumnDescriptor::new("b", ColumnType::Integer),
        ]));
        let results: Vec<_> = RowPipeline::new(Box::new(tok), cols, &SourceOptions::csv()).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(IngestionError::MalformedRecord { .. })));
    }
}
