//! Scene flow frame discovery.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// Default pattern for frame files: `sflow_` followed by five digits.
pub const FRAME_FILE_PATTERN: &str = r"sflow_[0-9]{5}\.xml";

/// Errors that can occur while scanning a dataset directory.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Invalid frame filename pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Failed to list directory {path}: {source}")]
    Listing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Existence and kind of a filesystem path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStatus {
    pub exists: bool,
    pub is_dir: bool,
}

/// Report whether `path` exists and whether it is a directory.
pub fn probe(path: &Path) -> PathStatus {
    match fs::metadata(path) {
        Ok(meta) => PathStatus {
            exists: true,
            is_dir: meta.is_dir(),
        },
        Err(_) => PathStatus {
            exists: false,
            is_dir: false,
        },
    }
}

/// Check that `path` is an existing directory.
pub fn require_directory(path: &Path) -> Result<(), ScanError> {
    let status = probe(path);
    if !status.exists {
        return Err(ScanError::DirectoryNotFound(path.to_path_buf()));
    }
    if !status.is_dir {
        return Err(ScanError::NotADirectory(path.to_path_buf()));
    }
    Ok(())
}

/// Compile a filename pattern into a case-insensitive matcher that must
/// cover the whole name.
pub fn compile_pattern(pattern: &str) -> Result<Regex, ScanError> {
    RegexBuilder::new(&format!("^(?:{})$", pattern))
        .case_insensitive(true)
        .build()
        .map_err(|source| ScanError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

/// List the entry names in `directory` that match `matcher`.
///
/// Names are returned in directory order; callers sort them. Entries whose
/// names are not valid UTF-8 are skipped.
///
/// # Errors
///
/// Returns `ScanError::Listing` if the directory cannot be read.
pub fn list_matching(directory: &Path, matcher: &Regex) -> Result<Vec<String>, ScanError> {
    let entries = fs::read_dir(directory).map_err(|source| ScanError::Listing {
        path: directory.to_path_buf(),
        source,
    })?;

    let names = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| {
            let keep = matcher.is_match(name);
            if !keep {
                debug!("Skipping non-frame entry {}", name);
            }
            keep
        })
        .collect();

    Ok(names)
}

/// Find all frame files in `directory`, sorted by name.
///
/// With zero-padded indices, name order is frame order.
pub fn find_frame_files(directory: &Path, pattern: &str) -> Result<Vec<String>, ScanError> {
    require_directory(directory)?;
    let matcher = compile_pattern(pattern)?;

    let mut names = list_matching(directory, &matcher)?;
    names.sort();
    Ok(names)
}
