//! # covinfolib
//!
//! Extract code coverage data written by a compiler's instrumentation runtime
//! and turn it into a single LCOV tracefile.
//!
//! ## Overview
//!
//! An instrumented build leaves two artifacts per object file: a raw data
//! file (`.da`, written when the program runs) and a basic-block metadata
//! file (`.bb`, written by the compiler). This library:
//!
//! - **Discovers** raw data files below one or more build directories
//! - **Decodes** the binary metadata into source files and their functions
//! - **Annotates** each raw data file with `gcov` and parses the listings
//! - **Reconciles** listing names with the source paths from the metadata
//! - **Aggregates** per-line counts into `SF:`/`FN:`/`DA:` records
//! - **Streams** the records into per-data-file or shared tracefiles
//!
//! ## Example
//!
//! ```rust,no_run
//! use covinfolib::{Driver, ExtractOptions, GcovAnnotator, OutputTarget};
//!
//! let options = ExtractOptions::new()
//!     .test_name("unit_tests")
//!     .output(OutputTarget::File("app.info".into()));
//!
//! let summary = Driver::new(GcovAnnotator::default(), options)
//!     .run(&["build"])
//!     .unwrap();
//! println!("{} records written", summary.records);
//! ```

pub mod annotate;
pub mod data;
pub mod driver;
pub mod error;
pub mod output;
pub mod path;
pub mod source;
pub mod workdir;

pub use annotate::{Annotator, GcovAnnotator, DEFAULT_GCOV_TOOL};
pub use data::{
    match_source, parse_annotated_file, read_metadata, AnnotatedLine, FunctionEntry, LineCount,
    MetadataMapping, SourceFileRecord,
};
pub use driver::{validate_test_name, Driver, ExtractOptions, RunSummary};
pub use error::{CovinfoError, ReconciliationWarning};
pub use output::{OutputTarget, ReportWriter};
pub use source::{discover_data_files, FilterConfig, RawDataFile};
pub use workdir::{install_interrupt_handler, WorkdirGuard, INTERRUPT_EXIT_CODE};

/// Result type for covinfolib operations
pub type Result<T> = std::result::Result<T, CovinfoError>;
