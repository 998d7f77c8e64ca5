use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::{IoStage, SweepError, SweepResult};
use crate::results::{FileMatches, SearchSummary};

/// The JSON document written for a search:
///
/// ```json
/// {
///   "rootDirectory": "/src",
///   "searchPhrase": "test",
///   "results": [
///     { "file": "/src/a.txt",
///       "lines": [ { "lineNumber": 3, "lineContent": "", "startIndex": 2, "endIndex": 5 } ] }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchReport {
    pub root_directory: PathBuf,
    pub search_phrase: String,
    pub results: Vec<FileMatches>,
}

impl SearchReport {
    pub fn new(
        root_directory: impl Into<PathBuf>,
        search_phrase: impl Into<String>,
        results: Vec<FileMatches>,
    ) -> Self {
        Self {
            root_directory: root_directory.into(),
            search_phrase: search_phrase.into(),
            results,
        }
    }

    pub fn from_summary(
        root_directory: impl Into<PathBuf>,
        search_phrase: impl Into<String>,
        summary: SearchSummary,
    ) -> Self {
        Self::new(root_directory, search_phrase, summary.results)
    }

    pub fn to_json_pretty(&self) -> SweepResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the report to a new file at `path`, creating missing parent
    /// directories. Refuses to overwrite an existing file or to write a
    /// report without results.
    pub fn save_to(&self, path: &Path) -> SweepResult<()> {
        if self.results.is_empty() {
            return Err(SweepError::invalid_input("no search results to save"));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| SweepError::io(parent, IoStage::Write, e))?;
        }

        let json = self.to_json_pretty()?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => SweepError::invalid_input(format!(
                    "destination already exists: {}",
                    path.display()
                )),
                _ => SweepError::io(path, IoStage::Open, e),
            })?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| SweepError::io(path, IoStage::Write, e))?;

        info!(
            "Saved {} result file(s) to {}",
            self.results.len(),
            path.display()
        );
        Ok(())
    }

    pub fn load_from(path: &Path) -> SweepResult<Self> {
        let data = fs::read_to_string(path).map_err(|e| SweepError::from_open(path, e))?;
        Ok(serde_json::from_str(&data)?)
    }
}
