//! FASTA sequence records as rows of `name`, `description`, `sequence`, `length`.
//!
//! ```text
//! >sp|P69905|HBA_HUMAN Hemoglobin subunit alpha
//! MVLSPADKTNVKAAWGKVGAHAGEYGAEALERMFLSFPTTKTYFPHF
//! DLSHGSAQVKGHGKKVADALTNAVAHVDDMPNALSALSDLHAHKL
//! ```
//!
//! Sequence lines are concatenated. Lines starting with `;` are comments.

use std::io::BufRead;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{ColumnDescriptor, ColumnSet, ColumnType, RawCell, RawRecord, Value};

use super::pipeline::RecordSupplier;

/// Fixed columns produced by [`FastaRecords`].
pub fn fasta_columns() -> ColumnSet {
    ColumnSet::new(vec![
        ColumnDescriptor::new("name", ColumnType::String),
        ColumnDescriptor::new("description", ColumnType::String),
        ColumnDescriptor::new("sequence", ColumnType::String),
        ColumnDescriptor::new("length", ColumnType::Integer),
    ])
}

struct Header {
    line: usize,
    text: String,
}

/// Lazy FASTA reader; one record per `>` header.
pub struct FastaRecords<R> {
    reader: R,
    line_number: usize,
    header: Option<Header>,
    sequence: String,
    buf: String,
    done: bool,
}

impl<R: BufRead> FastaRecords<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            header: None,
            sequence: String::new(),
            buf: String::new(),
            done: false,
        }
    }

    fn take_record(&mut self, next: Option<Header>) -> Option<RawRecord> {
        let header = std::mem::replace(&mut self.header, next)?;
        let sequence = std::mem::take(&mut self.sequence);
        let (name, description) = match header.text.split_once(char::is_whitespace) {
            Some((n, d)) => (n.to_string(), d.trim().to_string()),
            None => (header.text.clone(), String::new()),
        };
        let length = sequence.chars().count() as i64;
        Some(RawRecord::new(
            header.line,
            vec![
                RawCell::from(name.as_str()),
                RawCell::from(description.as_str()),
                RawCell::from(sequence.as_str()),
                RawCell::Typed(Value::Integer(length)),
            ],
        ))
    }
}

impl<R: BufRead + Send> RecordSupplier for FastaRecords<R> {
    fn next_record(&mut self) -> IngestionResult<Option<RawRecord>> {
        if self.done {
            return Ok(None);
        }
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                self.done = true;
                return Ok(self.take_record(None));
            }
            self.line_number += 1;
            let line = self.buf.trim();
            if line.is_empty() || line.starts_with(';') {
                continue;
            }
            if let Some(text) = line.strip_prefix('>') {
                let next = Header {
                    line: self.line_number,
                    text: text.trim().to_string(),
                };
                if self.header.is_none() {
                    self.header = Some(next);
                    continue;
                }
                return Ok(self.take_record(Some(next)));
            }
            if self.header.is_none() {
                self.done = true;
                return Err(IngestionError::MalformedRecord {
                    line: self.line_number,
                    message: "sequence data before the first '>' header".to_string(),
                });
            }
            self.sequence.push_str(line);
        }
    }
}
