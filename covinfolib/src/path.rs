//! Path canonicalization without touching the filesystem, plus symlink resolution.
//!
//! Source paths recorded in metadata files are often relative to the object
//! directory and full of `.` and `..` segments. [`normalize`] collapses them
//! lexically so that the same source file always ends up under the same key.

use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::CovinfoError;
use crate::Result;

/// Upper bound on link dereferences before a chain is considered cyclic.
const MAX_SYMLINK_HOPS: usize = 40;

/// Lexically normalize a path.
///
/// - empty and `.` segments are removed
/// - `..` removes the preceding real segment when there is one
/// - a leading `..` on an absolute path is dropped
/// - a leading `..` on a relative path is kept
///
/// A relative path that collapses to nothing becomes `.`.
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    let mut root: Option<OsString> = None;
    let mut segments: Vec<OsString> = Vec::new();

    for component in path.as_ref().components() {
        match component {
            Component::Prefix(prefix) => {
                root.get_or_insert_with(OsString::new)
                    .push(prefix.as_os_str());
            }
            Component::RootDir => {
                root.get_or_insert_with(OsString::new)
                    .push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => match segments.last() {
                Some(last) if last != ".." => {
                    segments.pop();
                }
                _ if root.is_some() => {}
                _ => segments.push(OsString::from("..")),
            },
            Component::Normal(name) => segments.push(name.to_os_string()),
        }
    }

    let mut result = match root {
        Some(root) => PathBuf::from(root),
        None if segments.is_empty() => return PathBuf::from("."),
        None => PathBuf::new(),
    };
    result.extend(segments);
    result
}

/// Make `path` absolute by prefixing `base`, unless it already starts at the root.
pub fn to_absolute(path: impl AsRef<Path>, base: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.has_root() {
        path.to_path_buf()
    } else {
        base.as_ref().join(path)
    }
}

/// Follow a chain of symbolic links until a non-link is reached.
///
/// Returns `path` unchanged when it is not a link (or does not exist).
/// Relative link targets are resolved against the link's directory.
/// A chain longer than [`MAX_SYMLINK_HOPS`] is treated as a cycle.
pub fn resolve_symlink_chain(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let mut current = original.to_path_buf();

    for _ in 0..MAX_SYMLINK_HOPS {
        let is_link = fs::symlink_metadata(&current)
            .map(|meta| meta.file_type().is_symlink())
            .unwrap_or(false);
        if !is_link {
            return Ok(current);
        }

        let target = fs::read_link(&current).map_err(|source| CovinfoError::FileRead {
            path: current.clone(),
            source,
        })?;
        let link_dir = current.parent().unwrap_or_else(|| Path::new("/"));
        current = normalize(to_absolute(target, link_dir));
    }

    Err(CovinfoError::Configuration(format!(
        "symbolic link chain starting at '{}' does not terminate",
        original.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(p: &str) -> String {
        normalize(p).to_string_lossy().into_owned()
    }

    #[test]
    fn test_normalize_resolves_parent_segments() {
        assert_eq!(norm("/a/b/../c"), "/a/c");
        assert_eq!(norm("/a/./b//c/"), "/a/b/c");
        assert_eq!(norm("a/b/../../c"), "c");
    }

    #[test]
    fn test_normalize_collapses_to_leading_parent() {
        assert_eq!(norm("a/../../b"), "../b");
        assert_eq!(norm("../../x"), "../../x");
    }

    #[test]
    fn test_normalize_drops_parent_above_root() {
        assert_eq!(norm("/../a"), "/a");
        assert_eq!(norm("/.."), "/");
    }

    #[test]
    fn test_normalize_empty_relative() {
        assert_eq!(norm("a/.."), ".");
        assert_eq!(norm("./"), ".");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for p in [
            "/a/b/../c",
            "a/../../b",
            "/../a",
            "./x/./y/..",
            "../../a/b/../../..",
            "/",
            ".",
            "a//b///c",
        ] {
            let once = normalize(p);
            assert_eq!(normalize(&once), once, "not idempotent for {p}");
        }
    }

    #[test]
    fn test_to_absolute() {
        assert_eq!(to_absolute("/src/a.c", "/obj"), PathBuf::from("/src/a.c"));
        assert_eq!(
            to_absolute("../src/a.c", "/build/obj"),
            PathBuf::from("/build/obj/../src/a.c")
        );
    }

    #[test]
    fn test_resolve_non_link_returns_input() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("a.bb");
        fs::write(&file, b"").unwrap();

        assert_eq!(resolve_symlink_chain(&file).unwrap(), file);

        let missing = temp.path().join("missing.bb");
        assert_eq!(resolve_symlink_chain(&missing).unwrap(), missing);
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_follows_chain() {
        use std::os::unix::fs::symlink;

        let temp = tempfile::tempdir().unwrap();
        let objdir = temp.path().join("obj");
        fs::create_dir(&objdir).unwrap();
        let target = objdir.join("a.bb");
        fs::write(&target, b"").unwrap();

        let first = temp.path().join("first.bb");
        let second = temp.path().join("second.bb");
        symlink("obj/a.bb", &second).unwrap();
        symlink(&second, &first).unwrap();

        assert_eq!(resolve_symlink_chain(&first).unwrap(), target);
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_cycle_is_configuration_error() {
        use std::os::unix::fs::symlink;

        let temp = tempfile::tempdir().unwrap();
        let a = temp.path().join("a.bb");
        let b = temp.path().join("b.bb");
        symlink(&b, &a).unwrap();
        symlink(&a, &b).unwrap();

        let result = resolve_symlink_chain(&a);
        assert!(matches!(result, Err(CovinfoError::Configuration(_))));
    }
}
