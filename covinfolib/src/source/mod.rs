//! Source discovery: find raw coverage data files to process.
//!
//! This module handles the first stage of the pipeline - discovering what
//! to extract. It provides:
//!
//! - **Data file discovery**: Walk build trees for `.da` files
//! - **File filtering**: Include/exclude data files with glob patterns
//! - **Raw data files**: Path bookkeeping for one data file and its metadata
//!
//! ## Example
//!
//! ```rust,ignore
//! use covinfolib::source::{discover_data_files, FilterConfig, RawDataFile};
//!
//! let filter = FilterConfig::new().exclude("**/third_party/**")?;
//! for path in discover_data_files("build", &filter)? {
//!     let raw = RawDataFile::new(path)?;
//!     println!("{}", raw.metadata_path().display());
//! }
//! ```

pub mod datafile;
pub mod filter;

pub use datafile::{RawDataFile, DATA_EXTENSION, METADATA_EXTENSION};
pub use filter::{discover_data_files, discover_data_files_in_dirs, FilterConfig};
