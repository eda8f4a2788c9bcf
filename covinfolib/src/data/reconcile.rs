//! Map annotated listing names back to the source paths recorded in metadata.
//!
//! The annotation tool names its output after the source file's basename
//! (`main.c` becomes `main.c.gcov`), dropping the directory. Matching is
//! therefore done on stem and extension only. Two sources with the same
//! basename in different directories cannot be told apart this way; that
//! case is reported instead of guessed.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::error::ReconciliationWarning;

/// Extension appended by the annotation tool to every listing it writes.
pub const ANNOTATED_EXTENSION: &str = "gcov";

/// Find the known source path an annotated listing belongs to.
///
/// When the annotated name has no extension left after removing
/// [`ANNOTATED_EXTENSION`], any source with the same stem matches.
pub fn match_source<'a, I>(
    annotated: &Path,
    known: I,
) -> Result<&'a Path, ReconciliationWarning>
where
    I: IntoIterator<Item = &'a Path>,
{
    let name = strip_annotated_extension(annotated);
    let wanted = Path::new(name);
    let (stem, extension) = (wanted.file_stem(), wanted.extension());

    let candidates: Vec<&Path> = known
        .into_iter()
        .filter(|path| {
            path.file_stem() == stem && (extension.is_none() || path.extension() == extension)
        })
        .collect();

    match candidates.as_slice() {
        [] => Err(ReconciliationWarning::NoMatchingSource(annotated.to_path_buf())),
        [single] => Ok(*single),
        many => Err(ReconciliationWarning::AmbiguousSource {
            annotated: annotated.to_path_buf(),
            candidates: many.iter().map(|p| p.to_path_buf()).collect::<Vec<PathBuf>>(),
        }),
    }
}

fn strip_annotated_extension(annotated: &Path) -> &OsStr {
    let file_name = annotated.file_name().unwrap_or(annotated.as_os_str());
    let as_path = Path::new(file_name);
    if as_path.extension() == Some(OsStr::new(ANNOTATED_EXTENSION)) {
        as_path.file_stem().unwrap_or(file_name)
    } else {
        file_name
    }
}
