//! Delimited-text tokenizer.
//!
//! Turns a line-oriented character stream into [`RawRecord`]s:
//!
//! - fields are split on a single delimiter character and trimmed
//! - a quoted field may contain delimiters and newlines; a doubled quote is a literal quote
//! - text after a closing quote is appended to the field (`"a b" c` reads as `a b c`)
//! - `\N` alone in a field is an empty cell
//! - backslash escapes, when enabled, are decoded in unquoted fields only
//! - comment lines are skipped; `#key=value` comments before the first record are kept as
//!   metadata (see [`Tokenizer::comments`])
//! - a quote left open at end of input is a [`IngestionError::MalformedRecord`]

use std::collections::BTreeMap;
use std::io::BufRead;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{RawCell, RawRecord};

use super::options::SourceOptions;

const BOM: char = '\u{feff}';

#[derive(Debug, Clone)]
struct TokenizerConfig {
    delimiter: char,
    quote: char,
    parse_quotes: bool,
    escape_backslashes: bool,
    comment_marker: Option<char>,
    skip_blank_lines: bool,
    strict: bool,
}

/// Pull-based record reader over any [`BufRead`].
pub struct Tokenizer<R> {
    reader: R,
    cfg: TokenizerConfig,
    line_number: usize,
    buf: String,
    in_preamble: bool,
    comments: BTreeMap<String, String>,
    done: bool,
}

impl<R: BufRead> Tokenizer<R> {
    pub fn new(reader: R, options: &SourceOptions) -> Self {
        Self {
            reader,
            cfg: TokenizerConfig {
                delimiter: options.delimiter,
                quote: options.quote,
                parse_quotes: options.parse_quotes,
                escape_backslashes: options.escape_backslashes,
                comment_marker: options.comment_marker,
                skip_blank_lines: !options.include_blank_lines,
                strict: options.strict_errors,
            },
            line_number: 0,
            buf: String::new(),
            in_preamble: true,
            comments: BTreeMap::new(),
            done: false,
        }
    }

    /// Physical lines consumed so far.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// `key=value` pairs from comment lines that preceded the first record.
    pub fn comments(&self) -> &BTreeMap<String, String> {
        &self.comments
    }

    /// Read the next logical record, or `None` at end of input.
    pub fn next_record(&mut self) -> IngestionResult<Option<RawRecord>> {
        if self.done {
            return Ok(None);
        }
        let result = self.read_record();
        if !matches!(result, Ok(Some(_))) {
            self.done = true;
        }
        result
    }

    fn read_record(&mut self) -> IngestionResult<Option<RawRecord>> {
        loop {
            let Some(line) = self.read_line()? else {
                return Ok(None);
            };
            let start = self.line_number;

            if let Some(marker) = self.cfg.comment_marker {
                if let Some(body) = line.strip_prefix(marker) {
                    if self.in_preamble {
                        self.capture_comment(body);
                    }
                    continue;
                }
            }

            if line.trim().is_empty() {
                if self.cfg.skip_blank_lines {
                    continue;
                }
                return Ok(Some(RawRecord::new(start, Vec::new())));
            }

            self.in_preamble = false;
            let cells = if self.cfg.parse_quotes && line.contains(self.cfg.quote) {
                self.split_quoted(line, start)?
            } else {
                self.split_plain(&line, start)?
            };
            return Ok(Some(RawRecord::new(start, cells)));
        }
    }

    fn read_line(&mut self) -> IngestionResult<Option<String>> {
        self.buf.clear();
        if self.reader.read_line(&mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        let mut line = std::mem::take(&mut self.buf);
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        if self.line_number == 1 && line.starts_with(BOM) {
            line.replace_range(..BOM.len_utf8(), "");
        }
        Ok(Some(line))
    }

    fn capture_comment(&mut self, body: &str) {
        if let Some((key, value)) = body.split_once('=') {
            let key = key.trim();
            if !key.is_empty() {
                self.comments.insert(key.to_string(), value.trim().to_string());
            }
        }
    }

    fn split_plain(&self, line: &str, line_no: usize) -> IngestionResult<Vec<RawCell>> {
        line.split(self.cfg.delimiter)
            .map(|raw| self.parse_value(raw, line_no))
            .collect()
    }

    fn split_quoted(&mut self, first: String, start: usize) -> IngestionResult<Vec<RawCell>> {
        let delim = self.cfg.delimiter;
        let quote = self.cfg.quote;
        let (dlen, qlen) = (delim.len_utf8(), quote.len_utf8());

        let mut cells = Vec::new();
        let mut line = first;
        let mut pos = 0usize;
        loop {
            let rest = &line[pos..];
            pos += rest.len() - rest.trim_start_matches(|c: char| c.is_whitespace() && c != delim).len();
            if pos == line.len() {
                // Trailing delimiter (or trailing whitespace after one).
                cells.push(RawCell::Empty);
                break;
            }

            if !line[pos..].starts_with(quote) {
                let end = line[pos..].find(delim).map(|off| pos + off);
                let raw = &line[pos..end.unwrap_or(line.len())];
                cells.push(self.parse_value(raw, self.line_number)?);
                match end {
                    Some(e) => pos = e + dlen,
                    None => break,
                }
                continue;
            }

            pos += qlen;
            let mut value = String::new();
            loop {
                match line[pos..].find(quote) {
                    Some(off) => {
                        value.push_str(&line[pos..pos + off]);
                        pos += off + qlen;
                        if line[pos..].starts_with(quote) {
                            value.push(quote);
                            pos += qlen;
                            continue;
                        }
                        break;
                    }
                    None => {
                        value.push_str(&line[pos..]);
                        match self.read_line()? {
                            Some(next) => {
                                value.push('\n');
                                line = next;
                                pos = 0;
                            }
                            None => {
                                return Err(IngestionError::MalformedRecord {
                                    line: start,
                                    message: "quoted field is not closed before end of input".to_string(),
                                });
                            }
                        }
                    }
                }
            }

            let end = line[pos..].find(delim).map(|off| pos + off);
            let tail = &line[pos..end.unwrap_or(line.len())];
            if !tail.trim().is_empty() {
                value.push_str(tail.trim_end());
            }
            // Quoted text is literal; escapes are only decoded in unquoted fields.
            cells.push(RawCell::Text(value));

            match end {
                Some(e) => pos = e + dlen,
                None => break,
            }
        }
        Ok(cells)
    }

    fn parse_value(&self, raw: &str, line_no: usize) -> IngestionResult<RawCell> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "\\N" {
            return Ok(RawCell::Empty);
        }
        if self.cfg.escape_backslashes && trimmed.contains('\\') {
            return Ok(RawCell::Text(self.unescape(trimmed, line_no)?));
        }
        Ok(RawCell::Text(trimmed.to_string()))
    }

    fn unescape(&self, s: &str, line_no: usize) -> IngestionResult<String> {
        let mut out = String::with_capacity(s.len());
        let mut chars = s.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            let Some(&next) = chars.peek() else {
                out.push('\\');
                break;
            };
            let decoded = match next {
                'n' => Some('\n'),
                't' => Some('\t'),
                'r' => Some('\r'),
                'b' => Some('\u{8}'),
                'f' => Some('\u{c}'),
                '0' => Some('\0'),
                '\\' | '\'' | '"' => Some(next),
                'u' => {
                    let hex: String = chars.clone().skip(1).take(4).collect();
                    let ch = (hex.len() == 4)
                        .then(|| u32::from_str_radix(&hex, 16).ok())
                        .flatten()
                        .and_then(char::from_u32);
                    if let Some(ch) = ch {
                        chars.nth(4);
                        out.push(ch);
                        continue;
                    }
                    None
                }
                _ => None,
            };
            match decoded {
                Some(ch) => {
                    chars.next();
                    out.push(ch);
                }
                None if self.cfg.strict => {
                    return Err(IngestionError::MalformedRecord {
                        line: line_no,
                        message: format!("invalid escape sequence in '{s}'"),
                    });
                }
                None => {
                    tracing::warn!(line = line_no, value = s, "invalid escape sequence kept verbatim");
                    out.push('\\');
                }
            }
        }
        Ok(out)
    }
}

impl<R: BufRead> Iterator for Tokenizer<R> {
    type Item = IngestionResult<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
