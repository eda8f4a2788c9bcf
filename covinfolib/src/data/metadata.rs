//! Decoder for the compiler's per-object basic-block metadata (`.bb`) file.
//!
//! The file is a stream of little-endian 32-bit signed words. Two reserved
//! values act as markers:
//!
//! - `0x80000001` opens a filename record
//! - `0x80000002` opens a function-name record
//!
//! A record is a nul-padded string stored in 4-byte chunks and closed by the
//! same marker value again. The first positive word after a function-name
//! record is that function's starting line. Everything else (block
//! boundaries, per-block line numbers) is irrelevant for coverage extraction
//! and skipped.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::mem;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::CovinfoError;
use crate::path::{normalize, to_absolute};
use crate::Result;

/// Marker word introducing (and terminating) a filename record.
pub const FILENAME_MARKER: i32 = 0x8000_0001_u32 as i32;
/// Marker word introducing (and terminating) a function-name record.
pub const FUNCTION_MARKER: i32 = 0x8000_0002_u32 as i32;

/// A function declared in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionEntry {
    /// Function name as recorded by the compiler
    pub name: String,
    /// First line of the function
    pub line: u32,
}

impl FunctionEntry {
    pub fn new(name: impl Into<String>, line: u32) -> Self {
        Self {
            name: name.into(),
            line,
        }
    }
}

/// Source files referenced by one metadata file, with their functions.
///
/// Keys are absolute, normalized paths. Files without any function (for
/// example headers that only contribute inlined code) are still present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataMapping {
    files: BTreeMap<PathBuf, Vec<FunctionEntry>>,
}

impl MetadataMapping {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source file, keeping its functions if already present.
    pub fn insert_file(&mut self, path: impl Into<PathBuf>) {
        self.files.entry(path.into()).or_default();
    }

    /// Append a function to a source file's list, registering the file if needed.
    pub fn push_function(&mut self, path: impl Into<PathBuf>, function: FunctionEntry) {
        self.files.entry(path.into()).or_default().push(function);
    }

    /// Functions of a source file in declaration order.
    pub fn functions(&self, path: &Path) -> Option<&[FunctionEntry]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// All known source paths.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Read and decode the metadata file at `path`.
///
/// Relative source paths are resolved against the metadata file's directory.
pub fn read_metadata(path: impl AsRef<Path>) -> Result<MetadataMapping> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| CovinfoError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    MetadataReader::new(file, path, base_dir).decode()
}

/// Pending function state between a function-name record and its line number.
#[derive(Debug, Default)]
enum Pending {
    #[default]
    Idle,
    AwaitingLine(String),
}

/// Streaming decoder over any byte source.
pub struct MetadataReader<'a, R: Read> {
    reader: BufReader<R>,
    path: &'a Path,
    base_dir: &'a Path,
    pending: Pending,
    current_file: Option<PathBuf>,
    mapping: MetadataMapping,
}

impl<'a, R: Read> MetadataReader<'a, R> {
    /// `path` is only used in error messages; `base_dir` anchors relative source paths.
    pub fn new(source: R, path: &'a Path, base_dir: &'a Path) -> Self {
        Self {
            reader: BufReader::new(source),
            path,
            base_dir,
            pending: Pending::Idle,
            current_file: None,
            mapping: MetadataMapping::new(),
        }
    }

    /// Consume the stream and return the mapping.
    pub fn decode(mut self) -> Result<MetadataMapping> {
        while let Some(word) = self.next_word()? {
            match word {
                FILENAME_MARKER => {
                    let name = self.read_string(FILENAME_MARKER, "filename")?;
                    let file = normalize(to_absolute(&name, self.base_dir));
                    self.mapping.insert_file(file.clone());
                    self.current_file = Some(file);
                }
                FUNCTION_MARKER => {
                    let name = self.read_string(FUNCTION_MARKER, "function name")?;
                    if let Pending::AwaitingLine(previous) = &self.pending {
                        debug!("function '{previous}' has no line number, replaced by '{name}'");
                    }
                    self.pending = Pending::AwaitingLine(name);
                }
                line if line > 0 => self.accept_line(line as u32),
                _ => {}
            }
        }

        if self.mapping.is_empty() {
            return Err(CovinfoError::format(self.path, "no filenames found"));
        }
        Ok(self.mapping)
    }

    fn accept_line(&mut self, line: u32) {
        let Pending::AwaitingLine(name) = mem::take(&mut self.pending) else {
            return;
        };
        match &self.current_file {
            Some(file) => self
                .mapping
                .push_function(file.clone(), FunctionEntry::new(name, line)),
            None => debug!("function '{name}' declared before any filename, discarded"),
        }
    }

    /// Read a nul-padded string up to the closing `marker` word.
    fn read_string(&mut self, marker: i32, what: &str) -> Result<String> {
        let mut bytes = Vec::new();
        loop {
            match self.next_word()? {
                Some(word) if word == marker => break,
                Some(word) => bytes.extend_from_slice(&word.to_le_bytes()),
                None => {
                    return Err(CovinfoError::format(
                        self.path,
                        format!("incomplete {what} at end of file"),
                    ))
                }
            }
        }
        while bytes.last() == Some(&0) {
            bytes.pop();
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Next whole word, or `None` at end of stream. A trailing partial word counts as end.
    fn next_word(&mut self) -> Result<Option<i32>> {
        let mut buf = [0u8; 4];
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(CovinfoError::FileRead {
                        path: self.path.to_path_buf(),
                        source,
                    })
                }
            }
        }

        if filled < buf.len() {
            if filled > 0 {
                debug!("ignoring {filled} trailing bytes in {}", self.path.display());
            }
            return Ok(None);
        }
        Ok(Some(i32::from_le_bytes(buf)))
    }
}
