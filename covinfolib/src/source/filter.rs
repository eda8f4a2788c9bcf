//! Raw data file selection and discovery with glob pattern support.
//!
//! This module walks build trees and selects the raw coverage data files to
//! process, with support for include/exclude glob patterns.

use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::warn;
use walkdir::WalkDir;

use super::datafile::DATA_EXTENSION;
use crate::error::CovinfoError;
use crate::Result;

/// Configuration for raw data file selection.
#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    /// Glob patterns to include (if empty, include all data files)
    pub include: Vec<Pattern>,
    /// Glob patterns to exclude
    pub exclude: Vec<Pattern>,
}

impl FilterConfig {
    /// Create a new empty filter config (includes all data files).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an include pattern.
    pub fn include(mut self, pattern: &str) -> Result<Self> {
        self.include.push(compile(pattern)?);
        Ok(self)
    }

    /// Add an exclude pattern.
    pub fn exclude(mut self, pattern: &str) -> Result<Self> {
        self.exclude.push(compile(pattern)?);
        Ok(self)
    }

    /// Check if a path is a raw data file that passes the patterns.
    ///
    /// A path matches if:
    /// 1. It has the `.da` extension
    /// 2. It matches at least one include pattern (or include is empty)
    /// 3. It doesn't match any exclude pattern
    pub fn matches(&self, path: &Path) -> bool {
        if path.extension().is_none_or(|ext| ext != DATA_EXTENSION) {
            return false;
        }

        let path_str = path.to_string_lossy();

        if self.exclude.iter().any(|p| p.matches(&path_str)) {
            return false;
        }

        self.include.is_empty() || self.include.iter().any(|p| p.matches(&path_str))
    }
}

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|e| CovinfoError::InvalidGlob {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Check if a directory should be skipped during traversal.
fn should_skip_dir(name: &str) -> bool {
    name.starts_with('.')
}

/// Discover raw data files below a directory.
///
/// Symbolic links are followed. A `root` that is itself a data file is
/// returned as the only result when it passes the filter.
pub fn discover_data_files(root: impl AsRef<Path>, filter: &FilterConfig) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();

    if !root.exists() {
        return Err(CovinfoError::PathNotFound(root.to_path_buf()));
    }

    let mut files = Vec::new();

    if root.is_file() {
        if filter.matches(root) {
            files.push(root.to_path_buf());
        }
        return Ok(files);
    }

    let walker = WalkDir::new(root).follow_links(true).into_iter();

    for entry in walker.filter_entry(|e| {
        if e.depth() == 0 || !e.file_type().is_dir() {
            return true;
        }
        let name = e.file_name().to_str().unwrap_or("");
        !should_skip_dir(name)
    }) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                walk_error(root, e)?;
                continue;
            }
        };

        let path = entry.path();

        if path.is_file() && filter.matches(path) {
            files.push(path.to_path_buf());
        }
    }

    // Sort for deterministic output
    files.sort();

    Ok(files)
}

/// An unreadable input root aborts discovery; anything below it is only reported.
fn walk_error(root: &Path, err: walkdir::Error) -> Result<()> {
    if err.depth() == 0 || err.path() == Some(root) {
        return Err(CovinfoError::Usage(format!(
            "cannot read input directory '{}': {err}",
            root.display()
        )));
    }
    warn!("skipping unreadable entry: {err}");
    Ok(())
}

/// Discover raw data files in several directories, keeping argument order.
///
/// Files reachable from more than one root are only returned once.
pub fn discover_data_files_in_dirs<P: AsRef<Path>>(
    dirs: &[P],
    filter: &FilterConfig,
) -> Result<Vec<PathBuf>> {
    let mut all_files: Vec<PathBuf> = Vec::new();

    for dir in dirs {
        for file in discover_data_files(dir, filter)? {
            if !all_files.contains(&file) {
                all_files.push(file);
            }
        }
    }

    Ok(all_files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn create_test_files(dir: &Path) {
        fs::create_dir_all(dir.join("obj/sub")).unwrap();
        fs::create_dir_all(dir.join(".hidden")).unwrap();

        fs::write(dir.join("obj/main.da"), b"").unwrap();
        fs::write(dir.join("obj/main.bb"), b"").unwrap();
        fs::write(dir.join("obj/sub/util.da"), b"").unwrap();
        fs::write(dir.join("obj/sub/util.c"), b"").unwrap();
        fs::write(dir.join(".hidden/secret.da"), b"").unwrap();
        fs::write(dir.join("README"), b"").unwrap();
    }

    #[test]
    fn test_filter_matches_data_files() {
        let filter = FilterConfig::new();

        assert!(filter.matches(Path::new("obj/main.da")));
        assert!(filter.matches(Path::new("util.da")));
        assert!(!filter.matches(Path::new("obj/main.bb")));
        assert!(!filter.matches(Path::new("main.da.info")));
        assert!(!filter.matches(Path::new("Makefile")));
    }

    #[test]
    fn test_filter_with_include_pattern() {
        let filter = FilterConfig::new().include("**/sub/*.da").unwrap();

        assert!(filter.matches(Path::new("obj/sub/util.da")));
        assert!(!filter.matches(Path::new("obj/main.da")));
    }

    #[test]
    fn test_filter_with_exclude_pattern() {
        let filter = FilterConfig::new().exclude("**/sub/**").unwrap();

        assert!(filter.matches(Path::new("obj/main.da")));
        assert!(!filter.matches(Path::new("obj/sub/util.da")));
    }

    #[test]
    fn test_discover_data_files() {
        let temp = tempdir().unwrap();
        create_test_files(temp.path());

        let files = discover_data_files(temp.path(), &FilterConfig::new()).unwrap();

        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("obj/main.da"));
        assert!(files[1].ends_with("obj/sub/util.da"));
    }

    #[test]
    fn test_discover_single_file() {
        let temp = tempdir().unwrap();
        let file_path = temp.path().join("test.da");
        fs::write(&file_path, b"").unwrap();

        let files = discover_data_files(&file_path, &FilterConfig::new()).unwrap();

        assert_eq!(files, vec![file_path]);
    }

    #[test]
    fn test_discover_in_overlapping_dirs() {
        let temp = tempdir().unwrap();
        create_test_files(temp.path());

        let sub = temp.path().join("obj/sub");
        let dirs = [sub.clone(), temp.path().to_path_buf()];
        let files = discover_data_files_in_dirs(&dirs, &FilterConfig::new()).unwrap();

        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("obj/sub/util.da"));
        assert!(files[1].ends_with("obj/main.da"));
    }

    #[test]
    fn test_discover_nonexistent() {
        let result = discover_data_files("/nonexistent/path", &FilterConfig::new());

        assert!(matches!(result, Err(CovinfoError::PathNotFound(_))));
    }

    #[test]
    fn test_invalid_glob_pattern() {
        let result = FilterConfig::new().include("[invalid");

        if let Err(CovinfoError::InvalidGlob { pattern, .. }) = result {
            assert_eq!(pattern, "[invalid");
        } else {
            panic!("Expected InvalidGlob error");
        }
    }

    /// Remove all permissions from `dir`. Returns false when they are not enforced (running as root).
    #[cfg(unix)]
    fn lock_dir(dir: &Path) -> bool {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o000)).unwrap();
        fs::read_dir(dir).is_err()
    }

    #[cfg(unix)]
    fn unlock_dir(dir: &Path) {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_root_is_usage_error() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("obj");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("main.da"), b"").unwrap();

        let enforced = lock_dir(&root);
        let result = discover_data_files(&root, &FilterConfig::new());
        unlock_dir(&root);
        if !enforced {
            return;
        }

        let err = result.unwrap_err();
        assert!(err.is_usage());
        assert!(err.to_string().contains("cannot read input directory"));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdirectory_is_skipped() {
        let temp = tempdir().unwrap();
        create_test_files(temp.path());
        let sub = temp.path().join("obj/sub");

        let enforced = lock_dir(&sub);
        let result = discover_data_files(temp.path(), &FilterConfig::new());
        unlock_dir(&sub);
        if !enforced {
            return;
        }

        let files = result.unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("obj/main.da"));
    }
}
