#![cfg(feature = "excel")]

//! Spreadsheet sources (`.xlsx`, `.xls`, `.ods`, ...).
//!
//! Cells keep their spreadsheet types: numbers, booleans and dates arrive as typed
//! [`RawCell`]s, so inference and conversion do not round-trip them through text. Record
//! lines are 1-based spreadsheet row numbers.

use std::fs::File;
use std::io::BufReader;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, open_workbook_auto, Data, DataRef, ExcelDateTime, Reader, Xlsx};
use chrono::Datelike;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{RawCell, RawRecord, Value};

use super::convert::parse_date;
use super::streaming::{PushDecoder, RowSink};
use super::unified::ExcelSheetSelection;

fn resolve_sheet(names: &[String], sel: &ExcelSheetSelection) -> IngestionResult<String> {
    match sel {
        ExcelSheetSelection::First => names.first().cloned().ok_or_else(|| IngestionError::SchemaMismatch {
            message: "workbook has no sheets".to_string(),
        }),
        ExcelSheetSelection::Sheet(name) => {
            if names.iter().any(|n| n == name) {
                Ok(name.clone())
            } else {
                Err(IngestionError::SchemaMismatch {
                    message: format!("sheet '{name}' not found. sheets={names:?}"),
                })
            }
        }
    }
}

/// Read one sheet eagerly into records.
pub fn read_sheet_records(path: impl AsRef<Path>, sel: &ExcelSheetSelection) -> IngestionResult<Vec<RawRecord>> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet = resolve_sheet(workbook.sheet_names().as_slice(), sel)?;
    let range = workbook.worksheet_range(&sheet)?;
    let (row0, col0) = range.start().unwrap_or((0, 0));

    let records = range
        .rows()
        .enumerate()
        .map(|(idx0, row)| {
            let mut cells = vec![RawCell::Empty; col0 as usize];
            cells.extend(row.iter().map(data_to_cell));
            RawRecord::new(row0 as usize + idx0 + 1, cells)
        })
        .collect();
    Ok(records)
}

fn data_to_cell(c: &Data) -> RawCell {
    match c {
        Data::Empty => RawCell::Empty,
        Data::String(s) => RawCell::Text(s.clone()),
        Data::Int(i) => RawCell::Typed(Value::Integer(*i)),
        Data::Float(f) => RawCell::Typed(Value::Double(*f)),
        Data::Bool(b) => RawCell::Typed(Value::Boolean(*b)),
        Data::DateTime(dt) => date_time_cell(dt),
        Data::DateTimeIso(s) => iso_cell(s),
        Data::DurationIso(s) => RawCell::Text(s.clone()),
        Data::Error(e) => RawCell::Text(e.to_string()),
    }
}

fn data_ref_to_cell(c: &DataRef<'_>) -> RawCell {
    match c {
        DataRef::Empty => RawCell::Empty,
        DataRef::String(s) => RawCell::Text(s.clone()),
        DataRef::SharedString(s) => RawCell::Text((*s).to_string()),
        DataRef::Int(i) => RawCell::Typed(Value::Integer(*i)),
        DataRef::Float(f) => RawCell::Typed(Value::Double(*f)),
        DataRef::Bool(b) => RawCell::Typed(Value::Boolean(*b)),
        DataRef::DateTime(dt) => date_time_cell(dt),
        DataRef::DateTimeIso(s) => iso_cell(s),
        DataRef::DurationIso(s) => RawCell::Text(s.clone()),
        DataRef::Error(e) => RawCell::Text(e.to_string()),
    }
}

fn date_time_cell(dt: &ExcelDateTime) -> RawCell {
    match dt.as_datetime() {
        // Serial values below 1 carry only a time of day.
        Some(ndt) if ndt.year() < 1900 => RawCell::Typed(Value::TimeOfDay(ndt.time())),
        Some(ndt) => RawCell::Typed(Value::Date(ndt)),
        None => RawCell::Typed(Value::Double(dt.as_f64())),
    }
}

fn iso_cell(s: &str) -> RawCell {
    match parse_date(s) {
        Some(ndt) => RawCell::Typed(Value::Date(ndt)),
        None => RawCell::Text(s.to_string()),
    }
}

/// Streams an `.xlsx`/`.xlsm` sheet cell by cell on a worker thread.
#[derive(Debug, Clone)]
pub struct XlsxStreamDecoder {
    path: PathBuf,
    sheet: ExcelSheetSelection,
}

impl XlsxStreamDecoder {
    pub fn new(path: impl AsRef<Path>, sheet: ExcelSheetSelection) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            sheet,
        }
    }
}

impl PushDecoder for XlsxStreamDecoder {
    fn decode(self: Box<Self>, sink: &mut dyn RowSink) -> IngestionResult<()> {
        let mut workbook: Xlsx<BufReader<File>> = open_workbook(&self.path).map_err(calamine::Error::from)?;
        let sheet = resolve_sheet(workbook.sheet_names().as_slice(), &self.sheet)?;
        let mut reader = workbook
            .worksheet_cells_reader(&sheet)
            .map_err(calamine::Error::from)?;

        let mut current_row: Option<u32> = None;
        let mut cells: Vec<RawCell> = Vec::new();
        while let Some(cell) = reader.next_cell().map_err(calamine::Error::from)? {
            if sink.is_cancelled() {
                return Ok(());
            }
            let (row, col) = cell.get_position();
            if current_row != Some(row) {
                if let Some(prev) = current_row {
                    let record = RawRecord::new(prev as usize + 1, std::mem::take(&mut cells));
                    if sink.push(record).is_break() {
                        return Ok(());
                    }
                    // Rows with no stored cells.
                    for gap in prev + 1..row {
                        if sink.push(RawRecord::new(gap as usize + 1, Vec::new())).is_break() {
                            return Ok(());
                        }
                    }
                }
                current_row = Some(row);
            }
            let col = col as usize;
            if cells.len() < col {
                cells.resize(col, RawCell::Empty);
            }
            let value = data_ref_to_cell(cell.get_value());
            if cells.len() == col {
                cells.push(value);
            } else {
                cells[col] = value;
            }
        }
        if let Some(prev) = current_row {
            if let ControlFlow::Break(()) = sink.push(RawRecord::new(prev as usize + 1, cells)) {
                return Ok(());
            }
        }
        Ok(())
    }
}
