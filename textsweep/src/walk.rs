use ignore::WalkBuilder;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::{SweepError, SweepResult};
use crate::filters::{is_skipped_dir, should_include_file};

/// A file handed to the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub path: PathBuf,
    /// Size in bytes at enumeration time
    pub len: u64,
}

impl FileCandidate {
    pub fn new(path: impl Into<PathBuf>, len: u64) -> Self {
        Self {
            path: path.into(),
            len,
        }
    }

    /// Builds a candidate from the file's current metadata
    pub fn from_path(path: impl Into<PathBuf>) -> SweepResult<Self> {
        let path = path.into();
        let metadata = fs::metadata(&path).map_err(|e| SweepError::from_open(&path, e))?;
        Ok(Self {
            len: metadata.len(),
            path,
        })
    }
}

/// Which files a walk yields
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Only files with one of these extensions; `None` allows all
    pub only_extensions: Option<Vec<String>>,
    /// Files with these extensions are never yielded
    pub skip_extensions: Vec<String>,
    /// Glob patterns matched against the path relative to the root
    pub ignore_patterns: Vec<String>,
    /// Directory names never descended into, on top of VCS directories
    pub skip_dirs: Vec<String>,
    /// Walk hidden files and directories too
    pub include_hidden: bool,
}

/// Enumerates candidate files under `root` in a deterministic order.
///
/// Entries are sorted by name within each directory and yielded depth first.
/// `.gitignore` rules are honored. A root that is itself a file yields just
/// that file, without filtering.
pub fn collect_candidates(root: &Path, options: &WalkOptions) -> SweepResult<Vec<FileCandidate>> {
    if root.as_os_str().is_empty() {
        return Err(SweepError::invalid_input("root path cannot be empty"));
    }

    let root = if root.is_relative() {
        env::current_dir()
            .map_err(|e| SweepError::invalid_input(format!("cannot resolve {}: {}", root.display(), e)))?
            .join(root)
            .components()
            .collect()
    } else {
        root.to_path_buf()
    };

    let metadata = fs::metadata(&root).map_err(|e| SweepError::from_open(&root, e))?;
    if metadata.is_file() {
        return Ok(vec![FileCandidate::new(root, metadata.len())]);
    }

    debug!("Walking {}", root.display());

    let skip_dirs = options.skip_dirs.clone();
    let mut walker = WalkBuilder::new(&root);
    walker
        .hidden(!options.include_hidden)
        .ignore(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .require_git(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            if !is_dir || entry.depth() == 0 {
                return true;
            }
            entry
                .file_name()
                .to_str()
                .map_or(true, |name| !is_skipped_dir(name, &skip_dirs))
        });

    let mut candidates = Vec::new();
    for entry in walker.build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
        if !should_include_file(
            relative,
            &options.only_extensions,
            &options.skip_extensions,
            &options.ignore_patterns,
        ) {
            continue;
        }

        match entry.metadata() {
            Ok(metadata) => candidates.push(FileCandidate::new(entry.into_path(), metadata.len())),
            Err(e) => warn!("Skipping {}: {}", entry.path().display(), e),
        }
    }

    debug!("Found {} candidate files", candidates.len());
    Ok(candidates)
}
