//! Invocation of the external coverage annotation tool.
//!
//! Everything that touches the tool and its filesystem side effects sits
//! behind [`Annotator`], so the rest of the engine can be driven by a fake
//! that hands back canned listings.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::data::ANNOTATED_EXTENSION;
use crate::error::CovinfoError;
use crate::path::{normalize, to_absolute};
use crate::source::RawDataFile;
use crate::Result;

/// Default annotation tool.
pub const DEFAULT_GCOV_TOOL: &str = "gcov";

/// Produces annotated listings for one raw data file.
pub trait Annotator {
    /// Annotate `raw`, whose object files live in `object_dir`.
    ///
    /// Returns the absolute paths of the generated listings. An empty list is
    /// not an error.
    fn annotate(&self, raw: &RawDataFile, object_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Runs `gcov` (or a compatible tool) as a child process.
#[derive(Debug, Clone)]
pub struct GcovAnnotator {
    tool: String,
}

impl Default for GcovAnnotator {
    fn default() -> Self {
        Self::new(DEFAULT_GCOV_TOOL)
    }
}

impl GcovAnnotator {
    /// Use `tool` (a program name looked up in `PATH`, or a path) as annotation tool.
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    /// Anchor a tool given as a relative path at `base`.
    ///
    /// The tool runs from inside each data file's directory, so `./bin/gcov`
    /// must be fixed against the directory it was given from. Bare program
    /// names are left for `PATH` lookup.
    pub fn anchored_at(mut self, base: impl AsRef<Path>) -> Self {
        if self.tool.contains(std::path::is_separator) {
            let tool = normalize(to_absolute(&self.tool, base));
            self.tool = tool.to_string_lossy().into_owned();
        }
        self
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }
}

impl Annotator for GcovAnnotator {
    fn annotate(&self, raw: &RawDataFile, object_dir: &Path) -> Result<Vec<PathBuf>> {
        // The tool expects the raw data file next to the object files.
        let _link = if object_dir != raw.dir {
            TempLink::create(&raw.path, &object_dir.join(raw.file_name()))?
        } else {
            None
        };

        debug!(
            "running {} {} -o {}",
            self.tool,
            raw.file_name(),
            object_dir.display()
        );
        let output = Command::new(&self.tool)
            .arg(raw.file_name())
            .arg("-o")
            .arg(object_dir)
            .current_dir(&raw.dir)
            .output()
            .map_err(|e| {
                CovinfoError::Configuration(format!(
                    "cannot run annotation tool '{}': {e}",
                    self.tool
                ))
            })?;

        if !output.status.success() {
            return Err(CovinfoError::ExternalTool {
                tool: self.tool.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        list_annotated_files(&raw.dir)
    }
}

/// All annotated listings in `dir`, sorted by name.
pub fn list_annotated_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let read_error = |source| CovinfoError::FileRead {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_error)? {
        let path = entry.map_err(read_error)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == ANNOTATED_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Symbolic link that is removed again when dropped.
#[derive(Debug)]
struct TempLink {
    link: PathBuf,
}

impl TempLink {
    /// Link `link` to `target`. Nothing is created (or later removed) if `link` already exists.
    fn create(target: &Path, link: &Path) -> Result<Option<Self>> {
        if fs::symlink_metadata(link).is_ok() {
            debug!("{} already exists, not linking", link.display());
            return Ok(None);
        }
        symlink_file(target, link).map_err(|source| CovinfoError::FileWrite {
            path: link.to_path_buf(),
            source,
        })?;
        debug!("linked {} -> {}", link.display(), target.display());
        Ok(Some(Self {
            link: link.to_path_buf(),
        }))
    }
}

impl Drop for TempLink {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.link) {
            tracing::warn!("cannot remove temporary link {}: {e}", self.link.display());
        }
    }
}

#[cfg(unix)]
fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_file(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
fn symlink_file(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}
