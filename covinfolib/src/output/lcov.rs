//! LCOV tracefile serialization.
//!
//! ```text
//! TN:<test name>
//! SF:<absolute source path>
//! FN:<line>,<function name>
//! DA:<line>,<execution count>
//! LF:<lines found>
//! LH:<lines hit>
//! end_of_record
//! ```

use std::fmt::Write;

use crate::data::SourceFileRecord;

/// Separator closing every record.
pub const END_OF_RECORD: &str = "end_of_record";

/// Serialize one record, separator included.
pub fn format_record(record: &SourceFileRecord, test_name: &str) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "TN:{test_name}");
    let _ = writeln!(output, "SF:{}", record.path.display());

    for function in &record.functions {
        let _ = writeln!(output, "FN:{},{}", function.line, function.name);
    }

    for line in &record.lines {
        let _ = writeln!(output, "DA:{},{}", line.line, line.count);
    }

    let _ = writeln!(output, "LF:{}", record.lines_found);
    let _ = writeln!(output, "LH:{}", record.lines_hit);
    output.push_str(END_OF_RECORD);
    output.push('\n');

    output
}
