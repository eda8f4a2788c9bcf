//! Output: write coverage records as LCOV tracefile text.
//!
//! This module handles the last stage of the pipeline - streaming finished
//! records to their destination. Each record is serialized in full before it
//! is handed to the sink, so a destination only ever contains complete
//! records.

pub mod lcov;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::data::SourceFileRecord;
use crate::error::CovinfoError;
use crate::Result;

pub use lcov::{format_record, END_OF_RECORD};

/// Where the records of a run are written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputTarget {
    /// One `<raw data file>.info` next to each raw data file
    #[default]
    PerDataFile,
    /// One shared file for the whole run
    File(PathBuf),
    /// Standard output, shared for the whole run
    Stdout,
}

impl OutputTarget {
    /// Interpret a command-line value; `-` means standard output.
    pub fn from_arg(value: &str) -> Self {
        if value == "-" {
            OutputTarget::Stdout
        } else {
            OutputTarget::File(PathBuf::from(value))
        }
    }

    pub fn is_stdout(&self) -> bool {
        matches!(self, OutputTarget::Stdout)
    }
}

/// Path of the dedicated output for one raw data file.
pub fn per_data_file_output(data_file: &Path) -> PathBuf {
    let mut name = data_file.as_os_str().to_os_string();
    name.push(".info");
    PathBuf::from(name)
}

/// Streams records to a destination.
pub struct ReportWriter<W: Write> {
    sink: W,
    label: PathBuf,
    records: usize,
}

impl ReportWriter<Box<dyn Write>> {
    /// Create (or truncate) a file destination.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| CovinfoError::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(ReportWriter::new(
            Box::new(BufWriter::new(file)) as Box<dyn Write>,
            path,
        ))
    }

    /// Standard output destination.
    pub fn stdout() -> Self {
        ReportWriter::new(Box::new(io::stdout().lock()) as Box<dyn Write>, "<stdout>")
    }
}

impl<W: Write> ReportWriter<W> {
    /// Wrap any writer; `label` names the destination in error messages.
    pub fn new(sink: W, label: impl Into<PathBuf>) -> Self {
        Self {
            sink,
            label: label.into(),
            records: 0,
        }
    }

    /// Serialize and write one record.
    pub fn write_record(&mut self, record: &SourceFileRecord, test_name: &str) -> Result<()> {
        let text = format_record(record, test_name);
        self.sink
            .write_all(text.as_bytes())
            .map_err(|source| self.write_error(source))?;
        self.records += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush().map_err(|source| self.write_error(source))
    }

    /// Number of records written so far.
    pub fn records(&self) -> usize {
        self.records
    }

    pub fn label(&self) -> &Path {
        &self.label
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    fn write_error(&self, source: io::Error) -> CovinfoError {
        CovinfoError::FileWrite {
            path: self.label.clone(),
            source,
        }
    }
}
