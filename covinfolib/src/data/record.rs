//! Per-source-file coverage records.

use std::path::PathBuf;

use super::annotated::AnnotatedLine;
use super::metadata::FunctionEntry;

/// Execution count of one instrumented line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCount {
    /// 1-based source line number
    pub line: u32,
    /// Number of times the line was executed
    pub count: u64,
}

/// Aggregated coverage of one source file, as produced for one raw data file.
///
/// `lines` holds instrumented lines only, in ascending line order, so
/// `lines_found == lines.len()` and `lines_hit <= lines_found` always hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFileRecord {
    /// Absolute source path
    pub path: PathBuf,
    /// Functions declared in the file
    pub functions: Vec<FunctionEntry>,
    /// Per-line execution counts
    pub lines: Vec<LineCount>,
    /// Number of instrumented lines
    pub lines_found: usize,
    /// Number of instrumented lines executed at least once
    pub lines_hit: usize,
}

impl SourceFileRecord {
    /// Combine a file's functions with its annotated listing.
    ///
    /// Line `i` of `annotated` (0-based) is source line `i + 1`.
    pub fn aggregate(
        path: impl Into<PathBuf>,
        functions: &[FunctionEntry],
        annotated: &[AnnotatedLine],
    ) -> Self {
        let mut record = Self {
            path: path.into(),
            functions: functions.to_vec(),
            lines: Vec::new(),
            lines_found: 0,
            lines_hit: 0,
        };

        for (line, count) in (1u32..).zip(annotated.iter().map(|l| l.count)) {
            if let Some(count) = count {
                record.lines.push(LineCount { line, count });
                record.lines_found += 1;
                if count > 0 {
                    record.lines_hit += 1;
                }
            }
        }

        record
    }
}
