//! Data collection: decode coverage artifacts into per-file records.
//!
//! This module handles the middle stage of the pipeline - turning the
//! compiler's and the annotation tool's artifacts into structured data.
//! It provides:
//!
//! - **Metadata**: Decoder for the binary `.bb` file (`read_metadata`)
//! - **Annotated listings**: Parser for `.gcov` files (`parse_annotated_file`)
//! - **Reconciliation**: Mapping listing names back to source paths (`match_source`)
//! - **Records**: Aggregation into `SourceFileRecord`
//!
//! ## Example
//!
//! ```rust,ignore
//! use covinfolib::data::{match_source, parse_annotated_file, read_metadata, SourceFileRecord};
//!
//! let mapping = read_metadata("obj/main.bb")?;
//! let source = match_source("main.c.gcov".as_ref(), mapping.paths())?;
//! let lines = parse_annotated_file("main.c.gcov")?;
//! let record = SourceFileRecord::aggregate(source, mapping.functions(source).unwrap(), &lines);
//! ```

pub mod annotated;
pub mod metadata;
pub mod reconcile;
pub mod record;

pub use annotated::{parse_annotated, parse_annotated_file, AnnotatedLine};
pub use metadata::{read_metadata, FunctionEntry, MetadataMapping, MetadataReader};
pub use reconcile::{match_source, ANNOTATED_EXTENSION};
pub use record::{LineCount, SourceFileRecord};
