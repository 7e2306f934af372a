//! Path helpers shared by the filename parser and the archive rewriter.
//!
//! Conversions here never fail on non-UTF-8 names; they fall back to lossy strings
//! so that a weird filename degrades a parse result instead of aborting it.

use crate::error::{Error, Result};

use std::path::{Path, PathBuf};

/// Gets the file name from a path with fallback to lossy conversion.
///
/// # Arguments
///
/// * `path` - The path to extract the file name from
///
/// # Returns
///
/// * `String` - The file name, or an empty string if the path has none
pub fn get_file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Converts a path to a string with fallback to lossy conversion.
pub fn path_to_string_lossy(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Directory that holds `path`, usable as a place for sibling temporary files.
///
/// A bare file name (`book.epub`) lives in the current directory.
pub fn parent_directory(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Checks that `path` names an existing regular file before it is opened for rewriting.
///
/// # Returns
///
/// * `Result<()>` - Ok if the path points at a file, or a `MalformedArchive` error otherwise
pub fn validate_archive_path(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::MalformedArchive(
            path.to_path_buf(),
            "File does not exist".to_string(),
        ));
    }
    if !path.is_file() {
        return Err(Error::MalformedArchive(
            path.to_path_buf(),
            "Path is not a regular file".to_string(),
        ));
    }
    Ok(())
}
