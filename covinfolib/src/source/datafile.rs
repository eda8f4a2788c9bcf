//! Raw coverage data files produced by instrumented programs.

use std::env;
use std::path::{Path, PathBuf};

use crate::error::CovinfoError;
use crate::path::{normalize, to_absolute};
use crate::Result;

/// Extension of raw coverage data files.
pub const DATA_EXTENSION: &str = "da";
/// Extension of the basic-block metadata file paired with a raw data file.
pub const METADATA_EXTENSION: &str = "bb";

/// One raw data file to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDataFile {
    /// Absolute, normalized path
    pub path: PathBuf,
    /// Directory containing the file
    pub dir: PathBuf,
    /// File name without extension
    pub base_name: String,
}

impl RawDataFile {
    /// Describe the raw data file at `path`, made absolute against the current directory.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let cwd = env::current_dir()?;
        let path = normalize(to_absolute(path.as_ref(), cwd));

        let base_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| {
                CovinfoError::Usage(format!("not a data file: {}", path.display()))
            })?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));

        Ok(Self {
            path,
            dir,
            base_name,
        })
    }

    /// File name including extension, e.g. `main.da`.
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.base_name)
    }

    /// Expected location of the paired metadata file, before link resolution.
    pub fn metadata_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.base_name, METADATA_EXTENSION))
    }
}
