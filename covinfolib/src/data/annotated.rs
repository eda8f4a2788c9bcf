//! Parser for the annotated source listings written by the annotation tool.
//!
//! Every physical line of the listing corresponds to one source line:
//!
//! ```text
//! \t\tint x;                  uninstrumented
//!       ######    return 0;   instrumented, never executed
//!         5    foo();         instrumented, executed 5 times
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::CovinfoError;
use crate::Result;

/// Width of the execution count field, separator included.
pub const COUNT_FIELD_WIDTH: usize = 16;

/// Maximum number of separator spaces between the count and the source text.
const SEPARATOR_WIDTH: usize = 4;

/// One decoded source line.
///
/// `count` is `None` exactly when the line carries no instrumentation, so an
/// uninstrumented line can never be mistaken for one executed zero times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedLine {
    /// Execution count, if the line is instrumented
    pub count: Option<u64>,
    /// Source text
    pub text: String,
}

impl AnnotatedLine {
    pub fn instrumented(count: u64, text: impl Into<String>) -> Self {
        Self {
            count: Some(count),
            text: text.into(),
        }
    }

    pub fn uninstrumented(text: impl Into<String>) -> Self {
        Self {
            count: None,
            text: text.into(),
        }
    }

    pub fn is_instrumented(&self) -> bool {
        self.count.is_some()
    }

    /// Decode one physical line of an annotated listing.
    pub fn parse(line: &str) -> Self {
        if let Some(text) = line.strip_prefix("\t\t") {
            return Self::uninstrumented(text);
        }

        let field = line.trim_start_matches(' ');
        let token_len = field
            .find(|c: char| c != '#')
            .unwrap_or(field.len());
        let (count, token_len) = if token_len > 0 {
            (Some(0), token_len)
        } else {
            let digits = field
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(field.len());
            (field[..digits].parse::<u64>().ok(), digits)
        };

        match count {
            Some(count) => {
                let rest = &field[token_len..];
                let separator = rest
                    .bytes()
                    .take(SEPARATOR_WIDTH)
                    .take_while(|b| *b == b' ')
                    .count();
                Self::instrumented(count, &rest[separator..])
            }
            None => Self::uninstrumented(line),
        }
    }
}

/// Parse an annotated listing from disk.
///
/// Line numbers are implied by position: element `i` describes source line `i + 1`.
pub fn parse_annotated_file(path: impl AsRef<Path>) -> Result<Vec<AnnotatedLine>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| CovinfoError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_annotated(BufReader::new(file), path)
}

/// Parse an annotated listing from any buffered reader. `path` is used in error messages.
pub fn parse_annotated<R: BufRead>(reader: R, path: &Path) -> Result<Vec<AnnotatedLine>> {
    let mut lines = Vec::new();
    for line in reader.split(b'\n') {
        let line = line.map_err(|source| CovinfoError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let line = String::from_utf8_lossy(&line);
        lines.push(AnnotatedLine::parse(line.trim_end_matches('\r')));
    }
    Ok(lines)
}
