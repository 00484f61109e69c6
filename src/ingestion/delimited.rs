//! Text inputs shared by the delimited and sequence sources.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{IngestionError, IngestionResult};

use super::options::SourceOptions;
use super::tokenizer::Tokenizer;

/// Where text comes from. In-memory text and files can be re-opened; readers cannot.
pub enum TextInput {
    Bytes(Arc<[u8]>),
    Path(PathBuf),
    Reader(Option<Box<dyn Read + Send>>),
}

impl TextInput {
    pub fn text(text: impl Into<String>) -> Self {
        TextInput::Bytes(text.into().into_bytes().into())
    }

    pub fn path(path: impl AsRef<Path>) -> Self {
        TextInput::Path(path.as_ref().to_path_buf())
    }

    pub fn reader(reader: impl Read + Send + 'static) -> Self {
        TextInput::Reader(Some(Box::new(reader)))
    }

    pub fn is_scrollable(&self) -> bool {
        !matches!(self, TextInput::Reader(_))
    }

    /// Open a fresh buffered reader. A reader input can be opened once.
    pub fn open(&mut self) -> IngestionResult<Box<dyn BufRead + Send>> {
        match self {
            TextInput::Bytes(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            TextInput::Path(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
            TextInput::Reader(reader) => reader
                .take()
                .map(|r| Box::new(BufReader::new(r)) as Box<dyn BufRead + Send>)
                .ok_or_else(|| IngestionError::Usage {
                    message: "single-pass input was already consumed".to_string(),
                }),
        }
    }

    /// Read the whole input as UTF-8 text.
    pub fn read_to_string(&mut self) -> IngestionResult<String> {
        let mut text = String::new();
        self.open()?.read_to_string(&mut text)?;
        Ok(text)
    }

    pub fn path_hint(&self) -> Option<&Path> {
        match self {
            TextInput::Path(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Debug for TextInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextInput::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            TextInput::Path(p) => f.debug_tuple("Path").field(p).finish(),
            TextInput::Reader(r) => f.debug_tuple("Reader").field(&r.is_some()).finish(),
        }
    }
}

/// Open `input` as a delimited-text tokenizer.
pub fn open_delimited(
    input: &mut TextInput,
    options: &SourceOptions,
) -> IngestionResult<Tokenizer<Box<dyn BufRead + Send>>> {
    Ok(Tokenizer::new(input.open()?, options))
}
